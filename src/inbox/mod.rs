//! Inbox: receiving-side deduplication.
//!
//! Each module records the ids of the messages it has handled. A redelivered
//! envelope (same `message_id`, e.g. an outbox record relayed twice) is skipped
//! for that module.

mod in_memory;
#[cfg(feature = "sqlite")]
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::{Clock, UtcClock};
use crate::error::HandlerError;
use crate::message::MessageEnvelope;
use crate::messaging::{DynHandler, HandlerContext, HandlerFuture};

pub use in_memory::InMemoryInboxStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteInboxStore;

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("inbox store lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A message a module has already handled.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct InboxRecord {
    pub id: Uuid,
    pub module: String,
    pub name: String,
    pub received_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
}

#[async_trait]
pub trait InboxStore: Send + Sync {
    async fn contains(&self, module: &str, id: Uuid) -> Result<bool, InboxError>;

    /// Record a handled message. Recording the same `(module, id)` twice is a no-op.
    async fn insert(&self, record: &InboxRecord) -> Result<(), InboxError>;
}

/// Inbox of one module.
#[derive(Clone)]
pub struct Inbox {
    module: String,
    store: Arc<dyn InboxStore>,
    clock: Arc<dyn Clock>,
}

impl Inbox {
    pub fn new(module: impl Into<String>, store: Arc<dyn InboxStore>) -> Self {
        Self {
            module: module.into(),
            store,
            clock: Arc::new(UtcClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Inbox for the module's `ordinal`-th handler of one message. Later
    /// handlers keep their own records (`module#1`, `module#2`, ...) so one
    /// handler's success never hides the message from the next.
    pub fn consumer(&self, ordinal: usize) -> Inbox {
        if ordinal == 0 {
            return self.clone();
        }
        Inbox {
            module: format!("{}#{}", self.module, ordinal),
            ..self.clone()
        }
    }

    /// Wrap a handler so each message id reaches it once per module.
    pub(crate) fn guard(&self, handler: DynHandler) -> DynHandler {
        let inbox = self.clone();
        Arc::new(move |envelope: MessageEnvelope, ctx: HandlerContext| -> HandlerFuture {
            let inbox = inbox.clone();
            let handler = Arc::clone(&handler);
            Box::pin(async move { inbox.handle(envelope, ctx, handler).await })
        })
    }

    async fn handle(
        &self,
        envelope: MessageEnvelope,
        ctx: HandlerContext,
        handler: DynHandler,
    ) -> Result<(), HandlerError> {
        let id = envelope.message_id;
        let name = envelope.name();
        if self.store.contains(&self.module, id).await.map_err(HandlerError::other)? {
            tracing::debug!(module = %self.module, message = name, message_id = %id, "message already handled, skipping");
            return Ok(());
        }

        let received_at = self.clock.now();
        handler(envelope, ctx).await?;

        let record = InboxRecord {
            id,
            module: self.module.clone(),
            name: name.to_string(),
            received_at,
            processed_at: self.clock.now(),
        };
        self.store.insert(&record).await.map_err(HandlerError::other)
    }
}
