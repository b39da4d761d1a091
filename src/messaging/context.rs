use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::message::{MessageContext, MessageEnvelope};
use crate::module::Scope;

/// Everything a message handler gets besides the message itself.
#[derive(Clone)]
pub struct HandlerContext {
    message_id: Uuid,
    context: MessageContext,
    scope: Scope,
    cancel: CancellationToken,
}

impl HandlerContext {
    pub(crate) fn new(envelope: &MessageEnvelope, scope: Scope, cancel: CancellationToken) -> Self {
        Self {
            message_id: envelope.message_id,
            context: envelope.context.clone(),
            scope,
            cancel,
        }
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn correlation_id(&self) -> Uuid {
        self.context.correlation_id
    }

    /// Context to publish follow-up messages with, keeping the correlation.
    pub fn context(&self) -> &MessageContext {
        &self.context
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }
}
