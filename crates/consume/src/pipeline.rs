//! The pipeline orchestrator.
//!
//! Validates the flag combination, constructs the right consumer, and wires
//! channel → deserializer chains → filter → sink, with tail buffering and
//! max-messages termination.
//!
//! Two cancellation signals are in play:
//! - `shutdown` (owned by the caller): abort everything now, e.g. Ctrl-C
//! - `stop` (owned here): stop accepting new messages, but let in-flight
//!   producer tasks notice on their next select and exit on their own
//!
//! After signalling stop, the orchestrator drains and discards whatever is
//! still in the channel so producer tasks blocked on a full channel can
//! finish. The shutdown sequence always runs in full (stop producers, close
//! the channel, wait for the consumption tasks, close the consumer) and a
//! failing step is reported without skipping the later ones.

use std::sync::Arc;

use async_trait::async_trait;
use kaftail_broker::{BrokerClient, Message};
use kaftail_codec::DeserializerChain;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::filter::MessageFilter;
use crate::flags::ConsumeFlags;
use crate::group::GroupConsumer;
use crate::offsets::OffsetSpec;
use crate::partition::PartitionConsumer;
use crate::sink::{RenderedMessage, Sink};
use crate::tail::TailBuffer;

/// Channel capacity between producer tasks and the drain loop.
const CHANNEL_CAPACITY: usize = 256;

/// Common lifecycle of the partition and group consumers.
#[async_trait]
pub trait Consumer: Send {
    /// Block until every consumption task has returned.
    async fn wait(&mut self) -> Result<()>;

    /// Release the underlying broker resources.
    async fn close(&mut self) -> Result<()>;
}

/// Run one consume invocation to completion.
///
/// Returns when the stream ends (bounded modes), the message budget is
/// reached, a fatal error occurs, or `shutdown` is cancelled. Output already
/// flushed to the sink before a fatal error stays flushed.
pub async fn run(
    broker: Arc<dyn BrokerClient>,
    flags: &ConsumeFlags,
    key_chain: DeserializerChain,
    value_chain: DeserializerChain,
    sink: &mut dyn Sink,
    shutdown: CancellationToken,
) -> Result<()> {
    flags.validate()?;
    let filter = MessageFilter::compile(
        flags.filter_key.as_deref(),
        flags.filter_value.as_deref(),
        &flags.filter_headers,
    )?;
    let spec = OffsetSpec {
        exit: flags.exit,
        from_beginning: flags.from_beginning,
        tail: flags.tail,
        explicit: flags.parsed_offsets()?,
        use_timestamps: flags.has_timestamps(),
    };

    let stop = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<Message>(CHANNEL_CAPACITY);

    let mut consumer: Box<dyn Consumer> = match &flags.group {
        Some(group) => Box::new(
            GroupConsumer::start(
                Arc::clone(&broker),
                &flags.topic,
                group,
                flags.from_beginning,
                tx,
                shutdown.clone(),
                stop.clone(),
            )
            .await?,
        ),
        None => {
            let partitions = if flags.partitions.is_empty() {
                broker.partitions(&flags.topic).await?
            } else {
                flags.partitions.clone()
            };
            info!(
                "consuming topic {} across {} partition(s)",
                flags.topic,
                partitions.len()
            );
            Box::new(
                PartitionConsumer::start(
                    Arc::clone(&broker),
                    &flags.topic,
                    &spec,
                    &partitions,
                    flags.from_ts()?,
                    flags.to_ts()?,
                    tx,
                    shutdown.clone(),
                    stop.clone(),
                )
                .await?,
            )
        }
    };

    let mut failure = if flags.tail > 0 {
        drain_tail(&mut rx, flags, &key_chain, &value_chain, &filter, sink).await
    } else {
        drain_streaming(
            &mut rx,
            flags,
            &key_chain,
            &value_chain,
            &filter,
            sink,
            &stop,
        )
        .await
    }
    .err();

    // Shutdown sequence: every step runs, errors accumulate instead of
    // short-circuiting.
    stop.cancel();
    drop(rx);
    if let Err(e) = consumer.wait().await {
        if failure.is_none() {
            failure = Some(e);
        } else {
            warn!("consumer wait also failed: {e}");
        }
    }
    if let Err(e) = consumer.close().await {
        if failure.is_none() {
            failure = Some(e);
        } else {
            warn!("consumer close also failed: {e}");
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Streaming drain: decode and emit in arrival order, stopping early at the
/// message budget or on the first fatal error.
async fn drain_streaming(
    rx: &mut mpsc::Receiver<Message>,
    flags: &ConsumeFlags,
    key_chain: &DeserializerChain,
    value_chain: &DeserializerChain,
    filter: &MessageFilter,
    sink: &mut dyn Sink,
    stop: &CancellationToken,
) -> Result<()> {
    let budget = flags.max_messages.unwrap_or(0);
    let mut emitted: u64 = 0;
    let mut failure = None;

    while let Some(message) = rx.recv().await {
        match deliver(&message, key_chain, value_chain, filter, sink).await {
            Ok(true) => {
                emitted += 1;
                if budget > 0 && emitted >= budget {
                    debug!("reached --max-messages {budget}");
                    stop.cancel();
                    break;
                }
            }
            Ok(false) => {}
            Err(e) => {
                stop.cancel();
                failure = Some(e);
                break;
            }
        }
    }

    // Discard in-flight messages so producers blocked on the channel can
    // observe stop and exit.
    while rx.recv().await.is_some() {}

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Tail drain: buffer the entire bounded stream, then emit the retained
/// messages in chronological order.
async fn drain_tail(
    rx: &mut mpsc::Receiver<Message>,
    flags: &ConsumeFlags,
    key_chain: &DeserializerChain,
    value_chain: &DeserializerChain,
    filter: &MessageFilter,
    sink: &mut dyn Sink,
) -> Result<()> {
    let mut buffer = TailBuffer::new(flags.tail as usize);
    while let Some(message) = rx.recv().await {
        buffer.insert(message);
    }
    debug!("stream ended, emitting {} tail message(s)", buffer.len());
    for message in buffer.into_chronological() {
        deliver(&message, key_chain, value_chain, filter, sink).await?;
    }
    Ok(())
}

/// Decode, filter, and emit one message. Returns whether it was emitted.
async fn deliver(
    message: &Message,
    key_chain: &DeserializerChain,
    value_chain: &DeserializerChain,
    filter: &MessageFilter,
    sink: &mut dyn Sink,
) -> Result<bool> {
    let key = key_chain
        .deserialize(message.key.as_deref())
        .await
        .map_err(|source| Error::Deserialize {
            partition: message.partition,
            offset: message.offset,
            source,
        })?;
    let value = value_chain
        .deserialize(message.value.as_deref())
        .await
        .map_err(|source| Error::Deserialize {
            partition: message.partition,
            offset: message.offset,
            source,
        })?;

    if !filter.matches(message) {
        return Ok(false);
    }

    sink.emit(&RenderedMessage {
        partition: message.partition,
        offset: message.offset,
        key,
        value,
        headers: message.headers.clone(),
        timestamp: message.timestamp,
    })
    .await
    .map_err(Error::Sink)?;
    Ok(true)
}
