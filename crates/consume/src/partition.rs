//! Direct per-partition consumption.
//!
//! One task per partition forwards messages into the shared pipeline
//! channel. Windows are resolved and every cursor is opened before the first
//! task spawns, so an acquisition failure on any partition aborts the whole
//! operation with nothing half-started.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kaftail_broker::{BrokerClient, Message, OffsetAnchor, PartitionCursor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::offsets::{resolve, OffsetSpec, PartitionMeta, Resolution, UNBOUNDED};
use crate::pipeline::Consumer;

/// How long a partition may sit idle before a bounded mode treats it as
/// caught up. Brokers do not reliably signal end-of-partition, so this
/// heuristic is the termination fallback; outside bounded modes an idle poll
/// is a no-op.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Fan-out consumer reading partitions directly, without group coordination.
pub struct PartitionConsumer {
    tasks: Vec<(i32, JoinHandle<Result<()>>)>,
}

impl PartitionConsumer {
    /// Resolve windows, open all cursors, then spawn the per-partition
    /// forwarding tasks.
    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        broker: Arc<dyn BrokerClient>,
        topic: &str,
        spec: &OffsetSpec,
        partitions: &[i32],
        from_ts: Option<DateTime<Utc>>,
        to_ts: Option<DateTime<Utc>>,
        tx: mpsc::Sender<Message>,
        shutdown: CancellationToken,
        stop: CancellationToken,
    ) -> Result<Self> {
        let mut plans = Vec::new();
        for &partition in partitions {
            let meta = fetch_meta(broker.as_ref(), topic, partition, from_ts, to_ts).await?;
            match resolve(spec, &meta)? {
                Resolution::Skip => {
                    debug!("skipping partition {partition}: empty window");
                }
                Resolution::Consume(window) => plans.push((partition, window)),
            }
        }

        // Open every cursor before spawning anything; a single failure
        // aborts the operation.
        let mut cursors = Vec::with_capacity(plans.len());
        for &(partition, window) in &plans {
            match broker.open_cursor(topic, partition, window.start).await {
                Ok(cursor) => cursors.push((partition, window, cursor)),
                Err(e) => {
                    for (_, _, mut cursor) in cursors {
                        if let Err(close_err) = cursor.close().await {
                            warn!("failed to close cursor during abort: {close_err}");
                        }
                    }
                    return Err(e.into());
                }
            }
        }

        let bounded = spec.bounded();
        let tasks = cursors
            .into_iter()
            .map(|(partition, window, cursor)| {
                let handle = tokio::spawn(run_partition(
                    cursor,
                    partition,
                    window.end,
                    bounded,
                    tx.clone(),
                    shutdown.clone(),
                    stop.clone(),
                ));
                (partition, handle)
            })
            .collect();
        Ok(Self { tasks })
    }
}

#[async_trait::async_trait]
impl Consumer for PartitionConsumer {
    async fn wait(&mut self) -> Result<()> {
        let mut first_error = None;
        for (partition, handle) in self.tasks.drain(..) {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(Error::Task(format!(
                    "partition {partition}: {join_error}"
                ))),
            };
            if let Err(e) = outcome {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    warn!("partition {partition} also failed: {e}");
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        // Cursors are owned and closed by their tasks; nothing held here.
        Ok(())
    }
}

async fn fetch_meta(
    broker: &dyn BrokerClient,
    topic: &str,
    partition: i32,
    from_ts: Option<DateTime<Utc>>,
    to_ts: Option<DateTime<Utc>>,
) -> Result<PartitionMeta> {
    let oldest = broker.offset(topic, partition, OffsetAnchor::Oldest).await?;
    let newest = broker.offset(topic, partition, OffsetAnchor::Newest).await?;
    let at_from_timestamp = match from_ts {
        Some(instant) => Some(
            broker
                .offset(topic, partition, OffsetAnchor::At(instant))
                .await?,
        ),
        None => None,
    };
    let at_to_timestamp = match to_ts {
        Some(instant) => Some(
            broker
                .offset(topic, partition, OffsetAnchor::At(instant))
                .await?,
        ),
        None => None,
    };
    Ok(PartitionMeta {
        partition,
        oldest,
        newest,
        at_from_timestamp,
        at_to_timestamp,
    })
}

/// Forwarding loop for one partition.
///
/// Selects over: message arrival (forward, then stop at the window end),
/// the idle timeout (termination in bounded modes, no-op poll otherwise),
/// the stop signal, and root cancellation. The cursor is closed on every
/// exit path.
async fn run_partition(
    mut cursor: Box<dyn PartitionCursor>,
    partition: i32,
    window_end: i64,
    bounded: bool,
    tx: mpsc::Sender<Message>,
    shutdown: CancellationToken,
    stop: CancellationToken,
) -> Result<()> {
    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("partition {partition}: cancelled");
                break Ok(());
            }
            _ = stop.cancelled() => {
                debug!("partition {partition}: stop signalled");
                break Ok(());
            }
            polled = tokio::time::timeout(IDLE_TIMEOUT, cursor.recv()) => match polled {
                Err(_) => {
                    if bounded {
                        debug!("partition {partition}: idle, treating as caught up");
                        break Ok(());
                    }
                    // Interactive mode: idle polls terminate nothing
                }
                Ok(Err(e)) => break Err(Error::Broker(e)),
                Ok(Ok(message)) => {
                    let offset = message.offset;
                    if tx.send(message).await.is_err() {
                        // Receiver gone; the pipeline is shutting down
                        break Ok(());
                    }
                    if window_end != UNBOUNDED && offset >= window_end {
                        debug!("partition {partition}: reached window end {window_end}");
                        break Ok(());
                    }
                }
            }
        }
    };
    if let Err(e) = cursor.close().await {
        warn!("partition {partition}: cursor close failed: {e}");
    }
    result
}
