use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{OutboxError, OutboxRecord};

/// Durable storage behind the outbox.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn insert(&self, record: &OutboxRecord) -> Result<(), OutboxError>;

    /// Unsent records, oldest first (ties in insertion order), skipping the
    /// first `offset` and returning at most `limit`.
    async fn unsent_from(&self, offset: usize, limit: usize) -> Result<Vec<OutboxRecord>, OutboxError>;

    /// The oldest unsent records, at most `limit`.
    async fn unsent(&self, limit: usize) -> Result<Vec<OutboxRecord>, OutboxError> {
        self.unsent_from(0, limit).await
    }

    /// Set `sent_at` if the record is still unsent. Returns whether it changed.
    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, OutboxError>;

    async fn get(&self, id: Uuid) -> Result<Option<OutboxRecord>, OutboxError>;

    /// Every record, oldest first.
    async fn all(&self) -> Result<Vec<OutboxRecord>, OutboxError>;
}
