use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::{InboxError, InboxRecord, InboxStore};

/// Inbox storage kept in process memory. Cloning shares the storage.
#[derive(Clone, Default)]
pub struct InMemoryInboxStore {
    records: Arc<RwLock<HashMap<(String, Uuid), InboxRecord>>>,
}

impl InMemoryInboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<InboxRecord> {
        self.records
            .read()
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InboxStore for InMemoryInboxStore {
    async fn contains(&self, module: &str, id: Uuid) -> Result<bool, InboxError> {
        let records = self
            .records
            .read()
            .map_err(|_| InboxError::LockPoisoned("contains"))?;
        Ok(records.contains_key(&(module.to_string(), id)))
    }

    async fn insert(&self, record: &InboxRecord) -> Result<(), InboxError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| InboxError::LockPoisoned("insert"))?;
        records
            .entry((record.module.clone(), record.id))
            .or_insert_with(|| record.clone());
        Ok(())
    }
}
