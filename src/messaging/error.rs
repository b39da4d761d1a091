use thiserror::Error;

use crate::error::HandlerError;
use crate::outbox::OutboxError;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("handler in module `{module}` failed on `{message}`: {source}")]
    Handler {
        message: &'static str,
        module: String,
        #[source]
        source: HandlerError,
    },
    /// The message could not be decoded into the subscriber's declaration.
    #[error("`{message}` does not match the contract of module `{module}`: {reason}")]
    ContractMismatch {
        message: &'static str,
        module: String,
        reason: String,
    },
    #[error("failed to store `{message}` in the outbox: {source}")]
    Outbox {
        message: &'static str,
        #[source]
        source: OutboxError,
    },
    #[error("message channel is closed")]
    ChannelClosed,
    #[error("publication of `{message}` was cancelled")]
    Cancelled { message: &'static str },
    #[error("message handlers are not activated yet")]
    NotActivated,
}

impl BrokerError {
    pub(crate) fn from_handler(message: &'static str, module: &str, err: HandlerError) -> Self {
        match err {
            HandlerError::DecodeFailed(reason) => BrokerError::ContractMismatch {
                message,
                module: module.to_string(),
                reason,
            },
            source => BrokerError::Handler {
                message,
                module: module.to_string(),
                source,
            },
        }
    }
}
