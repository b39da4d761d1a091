use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::{OutboxError, OutboxRecord, OutboxStore};
use crate::clock::{Clock, UtcClock};
use crate::message::{Message, MessageContext, MessageEnvelope, MessageTypes};
use crate::messaging::MessageSink;

/// Result of one relay pass over the unsent records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainResult {
    /// Unsent records picked up by the pass.
    pub unsent: usize,
    /// Delivered and marked sent.
    pub published: usize,
    /// Left unsent for the next pass.
    pub failed: usize,
}

/// Transactional outbox.
///
/// Publications are saved here instead of being delivered; a relay pass
/// ([`Outbox::publish_unsent`]) later hands them to the broker and marks them
/// sent. A record whose delivery fails stays unsent and is retried on the next
/// pass, so subscribers must tolerate duplicates.
#[derive(Clone)]
pub struct Outbox {
    store: Arc<dyn OutboxStore>,
    types: MessageTypes,
    clock: Arc<dyn Clock>,
    batch_size: usize,
}

impl Outbox {
    pub fn new(store: Arc<dyn OutboxStore>, types: MessageTypes) -> Self {
        Self {
            store,
            types,
            clock: Arc::new(UtcClock),
            batch_size: 100,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set how many unsent records are read from the store at a time.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn OutboxStore> {
        &self.store
    }

    pub fn types(&self) -> &MessageTypes {
        &self.types
    }

    /// Build the record for `message` without storing it, for callers that
    /// insert it inside their own transaction.
    pub fn record<M: Message>(
        &self,
        message: M,
        context: MessageContext,
    ) -> Result<OutboxRecord, OutboxError> {
        self.types.register::<M>();
        OutboxRecord::from_envelope(&MessageEnvelope::wrap(message, context, self.clock.now()))
    }

    /// Store the envelope as an unsent record. Nothing is delivered.
    pub async fn save(&self, envelope: &MessageEnvelope) -> Result<OutboxRecord, OutboxError> {
        let record = OutboxRecord::from_envelope(envelope)?;
        self.store.insert(&record).await?;
        tracing::debug!(
            message = %record.name,
            message_id = %record.id,
            correlation_id = %record.correlation_id,
            "message saved to outbox"
        );
        Ok(record)
    }

    /// Relay every unsent record, oldest first, reading the store page by page.
    ///
    /// Only a failure to read the store aborts the pass; a record that cannot be
    /// rebuilt, delivered or marked (including a panicking handler) is logged
    /// and left for the next pass.
    pub async fn publish_unsent<S>(
        &self,
        sink: &S,
        cancel: &CancellationToken,
    ) -> Result<DrainResult, OutboxError>
    where
        S: MessageSink + ?Sized,
    {
        let mut result = DrainResult::default();

        loop {
            // Records that failed earlier in this pass are still unsent and
            // still first in order, so the next page starts after them.
            let page = self.store.unsent_from(result.failed, self.batch_size).await?;
            let full = page.len() == self.batch_size;
            result.unsent += page.len();

            for record in page {
                let relayed = AssertUnwindSafe(self.relay(&record, sink, cancel))
                    .catch_unwind()
                    .await
                    .unwrap_or(Err(OutboxError::Panicked(record.id)));
                match relayed {
                    Ok(()) => result.published += 1,
                    Err(err) => {
                        result.failed += 1;
                        tracing::warn!(
                            message = %record.name,
                            message_id = %record.id,
                            error = %err,
                            "outbox message left unsent"
                        );
                    }
                }
            }

            if !full || cancel.is_cancelled() {
                break;
            }
        }

        if result.unsent > 0 {
            tracing::debug!(
                unsent = result.unsent,
                published = result.published,
                failed = result.failed,
                "outbox relay pass finished"
            );
        }
        Ok(result)
    }

    async fn relay<S>(
        &self,
        record: &OutboxRecord,
        sink: &S,
        cancel: &CancellationToken,
    ) -> Result<(), OutboxError>
    where
        S: MessageSink + ?Sized,
    {
        let envelope = record.to_envelope(&self.types)?;
        sink.deliver(envelope, cancel)
            .await
            .map_err(|source| OutboxError::Delivery {
                id: record.id,
                source: Box::new(source),
            })?;

        // sent_at never precedes created_at, even with a skewed clock.
        let sent_at = self.clock.now().max(record.created_at);
        self.store.mark_sent(record.id, sent_at).await?;
        Ok(())
    }
}
