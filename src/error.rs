use std::error::Error;

use thiserror::Error;

use crate::messaging::BrokerError;
use crate::requests::RequestError;

/// Error returned by request handlers and message handlers.
///
/// Handlers only ever see this type; the router and broker wrap it with the
/// path or message name it was raised for.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Payload could not be decoded into the handler's contract.
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    /// Business logic rejected the request (validation, invariant violation).
    #[error("rejected: {0}")]
    Rejected(String),
    /// Something the handler needed does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A service the handler resolves from its scope was never registered.
    #[error("service `{0}` is not registered")]
    MissingService(&'static str),
    /// A follow-up publication failed.
    #[error("publish failed: {0}")]
    Publish(#[source] Box<BrokerError>),
    /// A follow-up local request failed.
    #[error("request failed: {0}")]
    Request(#[source] Box<RequestError>),
    #[error("handler error: {0}")]
    Other(#[source] Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        HandlerError::Rejected(reason.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        HandlerError::NotFound(what.into())
    }

    pub fn other(err: impl Error + Send + Sync + 'static) -> Self {
        HandlerError::Other(Box::new(err))
    }

    /// HTTP status for endpoints that surface handler failures.
    pub fn status_code(&self) -> u16 {
        match self {
            HandlerError::DecodeFailed(_) => 400,
            HandlerError::Rejected(_) => 422,
            HandlerError::NotFound(_) => 404,
            HandlerError::Request(err) => err.status_code(),
            HandlerError::MissingService(_)
            | HandlerError::Publish(_)
            | HandlerError::Other(_) => 500,
        }
    }
}

impl From<BrokerError> for HandlerError {
    fn from(err: BrokerError) -> Self {
        HandlerError::Publish(Box::new(err))
    }
}

impl From<RequestError> for HandlerError {
    fn from(err: RequestError) -> Self {
        HandlerError::Request(Box::new(err))
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}
