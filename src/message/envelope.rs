use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AnyMessage, Message};
use crate::contract;

/// Snapshot of the publisher's context that travels with a message.
///
/// Deferred handlers run outside the publishing request, so this is all they
/// know about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    pub correlation_id: Uuid,
    pub trace_id: String,
    pub user_id: Option<String>,
}

impl MessageContext {
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            trace_id: Uuid::new_v4().simple().to_string(),
            user_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

impl Default for MessageContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A message in flight, with its identity and context.
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    pub message_id: Uuid,
    pub context: MessageContext,
    pub enqueued_at: DateTime<Utc>,
    message: Arc<dyn AnyMessage>,
}

impl MessageEnvelope {
    pub fn new(
        message_id: Uuid,
        message: Arc<dyn AnyMessage>,
        context: MessageContext,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id,
            context,
            enqueued_at,
            message,
        }
    }

    pub fn wrap<M: Message>(message: M, context: MessageContext, enqueued_at: DateTime<Utc>) -> Self {
        Self::new(Uuid::new_v4(), Arc::new(message), context, enqueued_at)
    }

    pub fn message(&self) -> &dyn AnyMessage {
        self.message.as_ref()
    }

    pub fn name(&self) -> &'static str {
        self.message.name()
    }

    /// The payload as `M`. The same Rust type is cloned; any other declaration
    /// of the shape is decoded structurally.
    pub fn decode<M: Message>(&self) -> Result<M, serde_json::Error> {
        if let Some(message) = self.message.downcast_ref::<M>() {
            return Ok(message.clone());
        }
        contract::decode(self.message.to_value()?)
    }
}
