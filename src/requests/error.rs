use thiserror::Error;

use crate::error::HandlerError;

#[derive(Debug, Error)]
pub enum RequestError {
    /// No module subscribed to the path.
    #[error("no handler is subscribed to `{path}`")]
    RouteNotFound { path: String },
    /// Two subscriptions for the same path. Fatal at startup.
    #[error("`{path}` is already subscribed by module `{module}`")]
    DuplicateRoute { path: String, module: String },
    /// The payload or response does not fit the receiving contract.
    #[error("contract mismatch on `{path}`: {source}")]
    ContractMismatch {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("handler for `{path}` failed: {source}")]
    Handler {
        path: String,
        #[source]
        source: HandlerError,
    },
    #[error("handler for `{path}` panicked")]
    HandlerPanicked { path: String },
    #[error("request to `{path}` was cancelled")]
    Cancelled { path: String },
    #[error("local routes are not activated yet")]
    NotActivated,
}

impl RequestError {
    pub fn status_code(&self) -> u16 {
        match self {
            RequestError::RouteNotFound { .. } => 404,
            RequestError::ContractMismatch { .. } => 400,
            RequestError::Handler { source, .. } => source.status_code(),
            RequestError::Cancelled { .. } => 499,
            RequestError::DuplicateRoute { .. }
            | RequestError::HandlerPanicked { .. }
            | RequestError::NotActivated => 500,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            RequestError::RouteNotFound { path }
            | RequestError::DuplicateRoute { path, .. }
            | RequestError::ContractMismatch { path, .. }
            | RequestError::Handler { path, .. }
            | RequestError::HandlerPanicked { path }
            | RequestError::Cancelled { path } => Some(path),
            RequestError::NotActivated => None,
        }
    }
}
