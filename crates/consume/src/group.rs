//! Consumer-group-coordinated consumption.
//!
//! The broker owns partition assignment and committed offsets; this side
//! only forwards messages and marks them consumed. Group mode always streams
//! indefinitely; the orchestrator rejects bounded-mode flags before this
//! module is reached.

use std::sync::Arc;

use kaftail_broker::{BrokerClient, GroupSession, Message};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::pipeline::Consumer;

/// Consumer driven by broker-side group coordination.
pub struct GroupConsumer {
    group: String,
    task: Option<JoinHandle<Result<()>>>,
}

impl GroupConsumer {
    /// Join the group and spawn the forwarding task. Returning `Ok` means the
    /// first session is set up; a join failure aborts the operation.
    pub async fn start(
        broker: Arc<dyn BrokerClient>,
        topic: &str,
        group: &str,
        from_beginning: bool,
        tx: mpsc::Sender<Message>,
        shutdown: CancellationToken,
        stop: CancellationToken,
    ) -> Result<Self> {
        let session = broker.join_group(topic, group, from_beginning).await?;
        debug!("group {group}: first session ready");
        let task = tokio::spawn(run_group(session, tx, shutdown, stop));
        Ok(Self {
            group: group.to_string(),
            task: Some(task),
        })
    }
}

#[async_trait::async_trait]
impl Consumer for GroupConsumer {
    async fn wait(&mut self) -> Result<()> {
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| Error::Task(format!("group {}: {e}", self.group)))?,
            None => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        // The session is owned and closed by the forwarding task.
        Ok(())
    }
}

/// Forward every message on the session's claims, marking each consumed
/// immediately after hand-off. Committing before the pipeline has decoded
/// (or rendered) the message makes delivery at-most-once: a message that
/// later fails downstream has already advanced the group's offset.
async fn run_group(
    mut session: Box<dyn GroupSession>,
    tx: mpsc::Sender<Message>,
    shutdown: CancellationToken,
    stop: CancellationToken,
) -> Result<()> {
    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("group session: cancelled");
                break Ok(());
            }
            _ = stop.cancelled() => {
                debug!("group session: stop signalled");
                break Ok(());
            }
            received = session.recv() => match received {
                Ok(message) => {
                    let (partition, offset) = (message.partition, message.offset);
                    if tx.send(message).await.is_err() {
                        break Ok(());
                    }
                    if let Err(e) = session.commit(partition, offset) {
                        break Err(Error::Broker(e));
                    }
                }
                Err(e) => {
                    // Sessions return transiently during rebalances;
                    // re-enter the loop until cancelled.
                    warn!("group session interrupted: {e}, re-entering");
                }
            }
        }
    };
    if let Err(e) = session.close().await {
        warn!("group session close failed: {e}");
    }
    result
}
