use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{BrokerError, MessageBroker};
use crate::message::MessageEnvelope;

/// Writer side of the in-process message channel.
#[derive(Clone)]
pub struct AsyncMessageDispatcher {
    sender: mpsc::Sender<MessageEnvelope>,
}

/// Create the bounded channel between publishers and the [`DispatcherJob`].
pub fn message_channel(
    capacity: usize,
) -> (AsyncMessageDispatcher, mpsc::Receiver<MessageEnvelope>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (AsyncMessageDispatcher { sender }, receiver)
}

impl AsyncMessageDispatcher {
    /// Queue the envelope. Waits only while the channel is full.
    pub async fn enqueue(
        &self,
        envelope: MessageEnvelope,
        cancel: &CancellationToken,
    ) -> Result<(), BrokerError> {
        let message = envelope.name();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BrokerError::Cancelled { message }),
            sent = self.sender.send(envelope) => sent.map_err(|_| BrokerError::ChannelClosed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }
}

/// Statistics from the dispatcher job.
#[derive(Debug, Default, Clone)]
pub struct DispatcherStats {
    pub messages_dispatched: usize,
    pub messages_failed: usize,
}

/// Background job that drains the message channel into the broker's handlers.
///
/// Handler failures, panics included, are logged and the job moves on to the
/// next envelope.
/// On stop, the envelope being dispatched is finished; queued ones are dropped.
pub struct DispatcherJob {
    cancel: CancellationToken,
    handle: JoinHandle<DispatcherStats>,
}

impl DispatcherJob {
    pub fn spawn(
        broker: MessageBroker,
        mut receiver: mpsc::Receiver<MessageEnvelope>,
        cancel: CancellationToken,
    ) -> Self {
        let stop = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut stats = DispatcherStats::default();
            tracing::info!("message dispatcher started");

            loop {
                let envelope = tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    next = receiver.recv() => match next {
                        Some(envelope) => envelope,
                        None => break,
                    },
                };

                let name = envelope.name();
                let message_id = envelope.message_id;
                // In-flight dispatches run to completion even while stopping.
                let dispatched = AssertUnwindSafe(broker.dispatch(envelope, &CancellationToken::new()))
                    .catch_unwind()
                    .await;
                match dispatched {
                    Ok(Ok(())) => stats.messages_dispatched += 1,
                    Ok(Err(err)) => {
                        stats.messages_failed += 1;
                        tracing::error!(message = name, %message_id, error = %err, "deferred message handling failed");
                    }
                    Err(_) => {
                        stats.messages_failed += 1;
                        tracing::error!(message = name, %message_id, "deferred message handler panicked");
                    }
                }
            }

            tracing::info!(
                dispatched = stats.messages_dispatched,
                failed = stats.messages_failed,
                "message dispatcher stopped"
            );
            stats
        });

        Self { cancel, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the job to stop and wait for it.
    pub async fn stop(self) -> DispatcherStats {
        self.cancel.cancel();
        match self.handle.await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::error!(error = %err, "message dispatcher task failed");
                DispatcherStats::default()
            }
        }
    }
}
