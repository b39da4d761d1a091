use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::{AnyMessage, Message};
use crate::contract;

pub type MessageDecoder = fn(Value) -> Result<Arc<dyn AnyMessage>, serde_json::Error>;

fn decode_as<M: Message>(value: Value) -> Result<Arc<dyn AnyMessage>, serde_json::Error> {
    Ok(Arc::new(contract::decode::<M>(value)?))
}

/// Registry of message types that can be rebuilt from storage, keyed by
/// [`Message::TYPE`].
///
/// Subscribing to or publishing a message registers its type. Cloning creates
/// another handle to the same registry.
#[derive(Clone, Default)]
pub struct MessageTypes {
    decoders: Arc<RwLock<HashMap<&'static str, MessageDecoder>>>,
}

impl MessageTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: Message>(&self) {
        if let Ok(decoders) = self.decoders.read() {
            if decoders.contains_key(M::TYPE) {
                return;
            }
        }
        match self.decoders.write() {
            Ok(mut decoders) => {
                decoders.entry(M::TYPE).or_insert(decode_as::<M>);
            }
            Err(_) => tracing::error!(message_type = M::TYPE, "message type registry lock poisoned"),
        }
    }

    pub fn lookup(&self, message_type: &str) -> Option<MessageDecoder> {
        self.decoders
            .read()
            .ok()
            .and_then(|decoders| decoders.get(message_type).copied())
    }

    pub fn contains(&self, message_type: &str) -> bool {
        self.lookup(message_type).is_some()
    }
}
