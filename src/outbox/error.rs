use thiserror::Error;
use uuid::Uuid;

use crate::messaging::BrokerError;

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("outbox message {0} already exists")]
    Duplicate(Uuid),
    /// The stored type is not registered in this process.
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("message serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to deliver outbox message {id}: {source}")]
    Delivery {
        id: Uuid,
        #[source]
        source: Box<BrokerError>,
    },
    #[error("handler panicked while relaying outbox message {0}")]
    Panicked(Uuid),
    #[error("outbox store lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error("invalid value in column `{column}`: {reason}")]
    Corrupt { column: &'static str, reason: String },
    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
