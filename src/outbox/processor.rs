use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{DrainResult, Outbox};
use crate::messaging::MessageSink;

/// Statistics from the outbox processor.
#[derive(Debug, Default, Clone)]
pub struct ProcessorStats {
    pub passes: usize,
    pub messages_published: usize,
    pub messages_failed: usize,
    pub store_errors: usize,
}

impl ProcessorStats {
    fn absorb(&mut self, result: DrainResult) {
        self.messages_published += result.published;
        self.messages_failed += result.failed;
    }
}

/// Background job that relays the outbox on a fixed interval.
///
/// ## Example
///
/// ```ignore
/// let processor = OutboxProcessor::spawn(
///     outbox.clone(),
///     broker.clone(),
///     Duration::from_millis(1000),
///     CancellationToken::new(),
/// );
///
/// // ... serve traffic ...
///
/// let stats = processor.stop().await;
/// println!("relayed {} messages", stats.messages_published);
/// ```
pub struct OutboxProcessor {
    cancel: CancellationToken,
    handle: JoinHandle<ProcessorStats>,
}

impl OutboxProcessor {
    /// Spawn the relay loop. A pass that is running when `cancel` fires is
    /// finished; no new pass starts afterwards.
    pub fn spawn<S>(outbox: Outbox, sink: S, interval: Duration, cancel: CancellationToken) -> Self
    where
        S: MessageSink + 'static,
    {
        let stop = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut stats = ProcessorStats::default();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(?interval, "outbox processor started");

            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                stats.passes += 1;
                match outbox.publish_unsent(&sink, &CancellationToken::new()).await {
                    Ok(result) => stats.absorb(result),
                    Err(err) => {
                        stats.store_errors += 1;
                        tracing::error!(error = %err, "outbox relay pass failed");
                    }
                }
            }

            tracing::info!(
                passes = stats.passes,
                published = stats.messages_published,
                failed = stats.messages_failed,
                "outbox processor stopped"
            );
            stats
        });

        Self { cancel, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the processor to stop and wait for the current pass.
    pub async fn stop(self) -> ProcessorStats {
        self.cancel.cancel();
        match self.handle.await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::error!(error = %err, "outbox processor task failed");
                ProcessorStats::default()
            }
        }
    }
}
