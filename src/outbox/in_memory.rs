use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{OutboxError, OutboxRecord, OutboxStore};

/// Outbox storage kept in process memory.
///
/// Cloning creates another handle to the same storage, so an outbox rebuilt
/// over a clone sees everything saved before.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    records: Arc<RwLock<Vec<OutboxRecord>>>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn insert(&self, record: &OutboxRecord) -> Result<(), OutboxError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| OutboxError::LockPoisoned("insert"))?;
        if records.iter().any(|existing| existing.id == record.id) {
            return Err(OutboxError::Duplicate(record.id));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn unsent_from(&self, offset: usize, limit: usize) -> Result<Vec<OutboxRecord>, OutboxError> {
        let records = self
            .records
            .read()
            .map_err(|_| OutboxError::LockPoisoned("unsent"))?;
        let mut unsent: Vec<OutboxRecord> = records
            .iter()
            .filter(|record| !record.is_sent())
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        unsent.sort_by_key(|record| record.created_at);
        Ok(unsent.into_iter().skip(offset).take(limit).collect())
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, OutboxError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| OutboxError::LockPoisoned("mark_sent"))?;
        match records.iter_mut().find(|record| record.id == id) {
            Some(record) if record.sent_at.is_none() => {
                record.sent_at = Some(sent_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<OutboxRecord>, OutboxError> {
        let records = self
            .records
            .read()
            .map_err(|_| OutboxError::LockPoisoned("get"))?;
        Ok(records.iter().find(|record| record.id == id).cloned())
    }

    async fn all(&self) -> Result<Vec<OutboxRecord>, OutboxError> {
        let records = self
            .records
            .read()
            .map_err(|_| OutboxError::LockPoisoned("all"))?;
        let mut all = records.clone();
        all.sort_by_key(|record| record.created_at);
        Ok(all)
    }
}
