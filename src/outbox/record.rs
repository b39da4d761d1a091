use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OutboxError;
use crate::message::{MessageContext, MessageEnvelope, MessageTypes};

/// A stored publication waiting to be relayed.
///
/// `sent_at` is set once, when the relay has handed the message over, and is
/// never cleared.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct OutboxRecord {
    pub id: Uuid,
    /// Lowercase snake_case shape name.
    pub name: String,
    /// Module-qualified type reference used to rebuild the message.
    #[serde(rename = "type")]
    pub message_type: String,
    /// JSON payload.
    pub data: String,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub correlation_id: Uuid,
    pub trace_id: String,
    pub user_id: Option<String>,
}

impl OutboxRecord {
    pub fn from_envelope(envelope: &MessageEnvelope) -> Result<Self, OutboxError> {
        let message = envelope.message();
        Ok(Self {
            id: envelope.message_id,
            name: message.name().to_string(),
            message_type: message.message_type().to_string(),
            data: serde_json::to_string(&message.to_value()?)?,
            created_at: envelope.enqueued_at,
            sent_at: None,
            correlation_id: envelope.context.correlation_id,
            trace_id: envelope.context.trace_id.clone(),
            user_id: envelope.context.user_id.clone(),
        })
    }

    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    /// Rebuild the envelope, keeping the stored id so receivers can deduplicate.
    pub fn to_envelope(&self, types: &MessageTypes) -> Result<MessageEnvelope, OutboxError> {
        let decode = types
            .lookup(&self.message_type)
            .ok_or_else(|| OutboxError::UnknownType(self.message_type.clone()))?;
        let message = decode(serde_json::from_str(&self.data)?)?;

        Ok(MessageEnvelope::new(
            self.id,
            message,
            MessageContext {
                correlation_id: self.correlation_id,
                trace_id: self.trace_id.clone(),
                user_id: self.user_id.clone(),
            },
            self.created_at,
        ))
    }
}
