//! Host configuration.
//!
//! Loaded from JSON with camelCase keys; every section falls back to its
//! defaults when absent.
//!
//! ```json
//! {
//!   "modules":   { "availability": { "enabled": true } },
//!   "messaging": { "useAsyncDispatcher": false, "channelCapacity": 1000 },
//!   "outbox":    { "enabled": true, "intervalMilliseconds": 1000 },
//!   "inbox":     { "enabled": false }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for module option `{key}`: {source}")]
    Option {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonolithConfig {
    pub modules: HashMap<String, ModuleSettings>,
    pub messaging: MessagingOptions,
    pub outbox: OutboxOptions,
    pub inbox: InboxOptions,
}

impl MonolithConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Settings for a module; a module without a section gets the defaults.
    pub fn module(&self, name: &str) -> ModuleSettings {
        self.modules.get(name).cloned().unwrap_or_default()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.modules.get(name).map_or(true, |settings| settings.enabled)
    }

    pub fn with_module(mut self, name: impl Into<String>, settings: ModuleSettings) -> Self {
        self.modules.insert(name.into(), settings);
        self
    }

    pub fn with_async_dispatcher(mut self, enabled: bool) -> Self {
        self.messaging.use_async_dispatcher = enabled;
        self
    }

    pub fn with_outbox(mut self, enabled: bool) -> Self {
        self.outbox.enabled = enabled;
        self
    }

    pub fn with_inbox(mut self, enabled: bool) -> Self {
        self.inbox.enabled = enabled;
        self
    }
}

/// Per-module section. `enabled` is the only key the host reads; everything
/// else is kept for the module itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleSettings {
    pub enabled: bool,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            options: Map::new(),
        }
    }
}

impl ModuleSettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Typed lookup of a module option. `Ok(None)` when the key is absent.
    pub fn option<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.options
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|source| ConfigError::Option {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagingOptions {
    /// Deliver publications through the background dispatcher instead of inline.
    pub use_async_dispatcher: bool,
    /// Bound of the in-process channel used by the dispatcher.
    pub channel_capacity: usize,
}

impl Default for MessagingOptions {
    fn default() -> Self {
        Self {
            use_async_dispatcher: false,
            channel_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutboxOptions {
    pub enabled: bool,
    pub interval_milliseconds: u64,
}

impl Default for OutboxOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_milliseconds: 1000,
        }
    }
}

impl OutboxOptions {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_milliseconds.max(1))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboxOptions {
    pub enabled: bool,
}
