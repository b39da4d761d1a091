use std::error::Error;
use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::requests::RequestError;

/// Lifecycle stage a module failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Register,
    Activate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Register => f.write_str("register"),
            Stage::Activate => f.write_str("activate"),
        }
    }
}

/// Startup failure. Any of these aborts host construction.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module `{0}` is declared more than once")]
    Duplicate(String),
    #[error("module `{module}` failed to {stage}: {source}")]
    Lifecycle {
        module: String,
        stage: Stage,
        #[source]
        source: Box<ModuleError>,
    },
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Route(#[from] RequestError),
    #[error(transparent)]
    Other(Box<dyn Error + Send + Sync>),
}

impl ModuleError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ModuleError::Invalid(reason.into())
    }

    pub(crate) fn during(self, module: &str, stage: Stage) -> Self {
        ModuleError::Lifecycle {
            module: module.to_string(),
            stage,
            source: Box::new(self),
        }
    }
}
