//! Message broker.
//!
//! ```text
//!   publish(message)
//!         │
//!         ▼
//! ┌───────────────────┐  outbox enabled   ┌──────────────┐  relay  ┌──────────────┐
//! │   MessageBroker   │ ────────────────▶ │    Outbox    │ ──────▶ │ deliver_now  │
//! └───────────────────┘                   └──────────────┘         └──────────────┘
//!         │                                                                │
//!         ├── inline ──────────▶ handlers, in subscription order ◀─────────┤
//!         │                                                                │
//!         └── deferred ─▶ bounded channel ─▶ DispatcherJob ─▶ handlers ◀───┘
//! ```
//!
//! Inline delivery propagates the first handler error to the publisher.
//! Deferred delivery returns as soon as the envelope is queued; handler errors
//! are only logged.

mod broker;
mod context;
mod dispatcher;
mod error;
mod handlers;

pub use broker::{DeliveryMode, MessageBroker, MessageBrokerBuilder, MessageSink};
pub use context::HandlerContext;
pub use dispatcher::{message_channel, AsyncMessageDispatcher, DispatcherJob, DispatcherStats};
pub use error::BrokerError;
pub use handlers::{HandlerTable, HandlerTableBuilder};

pub(crate) use handlers::{erase, DynHandler, HandlerFuture};
