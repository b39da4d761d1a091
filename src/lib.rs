//! Messaging substrate for a modular monolith.
//!
//! Business modules run in one process and talk through indirection layers
//! instead of references to each other:
//!
//! - local contracts: path-addressed request/response ([`ModuleClient`])
//! - messages: commands and events fanned out by the [`MessageBroker`], inline
//!   or through a background dispatcher
//! - the [`Outbox`] for at-least-once delivery and the [`Inbox`] to drop
//!   duplicates on the receiving side
//! - sagas with compensation ([`saga`])
//!
//! The [`Host`] wires everything from a [`MonolithConfig`] and a static list of
//! module factories.

extern crate self as modular_rust;

pub mod clock;
pub mod config;
pub mod contract;
mod error;
pub mod host;
pub mod http;
pub mod inbox;
pub mod message;
pub mod messaging;
pub mod module;
pub mod outbox;
pub mod requests;
pub mod saga;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use clock::{Clock, UtcClock};
pub use config::{ConfigError, ModuleSettings, MonolithConfig};
pub use error::HandlerError;
pub use host::{Host, HostBuilder, HostStats};
pub use inbox::{Inbox, InboxError, InboxStore, InMemoryInboxStore};
pub use message::{
    AnyMessage, Command, Event, Message, MessageContext, MessageEnvelope, MessageKind,
    MessageTypes,
};
pub use messaging::{
    BrokerError, DeliveryMode, HandlerContext, MessageBroker, MessageSink,
};
pub use module::{Module, ModuleCatalog, ModuleError, ModuleLoader, Pipeline, Scope, Services};
pub use outbox::{InMemoryOutboxStore, Outbox, OutboxError, OutboxRecord, OutboxStore};
pub use requests::{ModuleClient, RequestError};

// Derive macros share their traits' names.
pub use modular_rust_macros::{Command, Event};
