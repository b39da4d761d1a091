//! Message contracts.
//!
//! Commands and events are plain serde structs owned by a module. They are
//! routed by their declared shape name ([`Message::NAME`]); the Rust type on
//! the receiving side may be a different declaration of the same shape.
//!
//! ```ignore
//! #[derive(Clone, Debug, Serialize, Deserialize, Event)]
//! #[message(module = "availability")]
//! pub struct ResourceReserved {
//!     pub resource_id: Uuid,
//!     pub date: NaiveDate,
//! }
//!
//! assert_eq!(ResourceReserved::NAME, "resource_reserved");
//! assert_eq!(ResourceReserved::TYPE, "availability::ResourceReserved");
//! ```

mod envelope;
mod types;

use std::any::Any;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use envelope::{MessageContext, MessageEnvelope};
pub use types::{MessageDecoder, MessageTypes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Command,
    Event,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Command => f.write_str("command"),
            MessageKind::Event => f.write_str("event"),
        }
    }
}

/// A command or event contract. Usually derived with `#[derive(Command)]` or
/// `#[derive(Event)]`.
pub trait Message: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Module that owns this declaration.
    const MODULE: &'static str;
    /// Lowercase snake_case shape name used for routing.
    const NAME: &'static str;
    /// Module-qualified type reference used to rebuild stored messages.
    const TYPE: &'static str;
    const KIND: MessageKind;
}

/// Something a module asks another module to do.
pub trait Command: Message {}

/// Something that already happened inside a module.
pub trait Event: Message {}

/// Object-safe view of a [`Message`], used once the concrete type is erased.
pub trait AnyMessage: fmt::Debug + Send + Sync + 'static {
    fn module(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn message_type(&self) -> &'static str;
    fn kind(&self) -> MessageKind;
    fn to_value(&self) -> Result<Value, serde_json::Error>;
    fn as_any(&self) -> &dyn Any;
}

impl<M: Message> AnyMessage for M {
    fn module(&self) -> &'static str {
        M::MODULE
    }

    fn name(&self) -> &'static str {
        M::NAME
    }

    fn message_type(&self) -> &'static str {
        M::TYPE
    }

    fn kind(&self) -> MessageKind {
        M::KIND
    }

    fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn AnyMessage {
    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }
}
