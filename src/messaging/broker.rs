use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::{AsyncMessageDispatcher, BrokerError, HandlerContext, HandlerTable};
use crate::clock::{Clock, UtcClock};
use crate::message::{Message, MessageContext, MessageEnvelope, MessageTypes};
use crate::module::{Scope, Services};
use crate::outbox::Outbox;

/// Anything that can take a message envelope off the broker's hands.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(
        &self,
        envelope: MessageEnvelope,
        cancel: &CancellationToken,
    ) -> Result<(), BrokerError>;
}

/// How a publication leaves the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Handlers run before `publish` returns.
    Inline,
    /// The envelope goes to the background dispatcher.
    Deferred,
    /// The envelope is stored in the outbox and relayed later.
    Outbox,
}

struct BrokerInner {
    handlers: OnceLock<HandlerTable>,
    services: Arc<Services>,
    types: MessageTypes,
    clock: Arc<dyn Clock>,
    dispatcher: Option<AsyncMessageDispatcher>,
    outbox: Option<Outbox>,
}

/// Publishes commands and events to the handlers subscribed to them.
///
/// Cloning creates another handle to the same broker.
#[derive(Clone)]
pub struct MessageBroker {
    inner: Arc<BrokerInner>,
}

pub struct MessageBrokerBuilder {
    services: Arc<Services>,
    types: MessageTypes,
    clock: Arc<dyn Clock>,
    dispatcher: Option<AsyncMessageDispatcher>,
    outbox: Option<Outbox>,
}

impl MessageBrokerBuilder {
    pub fn with_types(mut self, types: MessageTypes) -> Self {
        self.types = types;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Defer delivery to the background dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: AsyncMessageDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Store publications in `outbox` instead of delivering them.
    pub fn with_outbox(mut self, outbox: Outbox) -> Self {
        self.outbox = Some(outbox);
        self
    }

    pub fn build(self) -> MessageBroker {
        MessageBroker {
            inner: Arc::new(BrokerInner {
                handlers: OnceLock::new(),
                services: self.services,
                types: self.types,
                clock: self.clock,
                dispatcher: self.dispatcher,
                outbox: self.outbox,
            }),
        }
    }
}

impl MessageBroker {
    pub fn builder(services: Arc<Services>) -> MessageBrokerBuilder {
        MessageBrokerBuilder {
            services,
            types: MessageTypes::new(),
            clock: Arc::new(UtcClock),
            dispatcher: None,
            outbox: None,
        }
    }

    /// Install the handler table. Only the first call has any effect.
    pub(crate) fn activate(&self, handlers: HandlerTable) -> bool {
        self.inner.handlers.set(handlers).is_ok()
    }

    pub fn is_activated(&self) -> bool {
        self.inner.handlers.get().is_some()
    }

    pub fn handlers(&self) -> Option<&HandlerTable> {
        self.inner.handlers.get()
    }

    pub fn types(&self) -> &MessageTypes {
        &self.inner.types
    }

    pub fn mode(&self) -> DeliveryMode {
        if self.inner.outbox.is_some() {
            DeliveryMode::Outbox
        } else if self.inner.dispatcher.is_some() {
            DeliveryMode::Deferred
        } else {
            DeliveryMode::Inline
        }
    }

    /// Publish with a fresh context (new correlation id).
    pub async fn publish<M: Message>(
        &self,
        message: M,
        cancel: &CancellationToken,
    ) -> Result<(), BrokerError> {
        self.publish_with(message, MessageContext::new(), cancel).await
    }

    /// Publish carrying `context`, typically the one a handler was given.
    pub async fn publish_with<M: Message>(
        &self,
        message: M,
        context: MessageContext,
        cancel: &CancellationToken,
    ) -> Result<(), BrokerError> {
        self.inner.types.register::<M>();
        let envelope = MessageEnvelope::new(
            Uuid::new_v4(),
            Arc::new(message),
            context,
            self.inner.clock.now(),
        );

        match &self.inner.outbox {
            Some(outbox) => {
                outbox
                    .save(&envelope)
                    .await
                    .map_err(|source| BrokerError::Outbox {
                        message: M::NAME,
                        source,
                    })?;
                Ok(())
            }
            None => self.deliver_now(envelope, cancel).await,
        }
    }

    /// Publish a batch, one after another. Stops at the first failure.
    pub async fn publish_many<M, I>(
        &self,
        messages: I,
        context: &MessageContext,
        cancel: &CancellationToken,
    ) -> Result<(), BrokerError>
    where
        M: Message,
        I: IntoIterator<Item = M>,
    {
        for message in messages {
            self.publish_with(message, context.clone(), cancel).await?;
        }
        Ok(())
    }

    /// Deliver inline or through the dispatcher. Never touches the outbox.
    async fn deliver_now(
        &self,
        envelope: MessageEnvelope,
        cancel: &CancellationToken,
    ) -> Result<(), BrokerError> {
        match &self.inner.dispatcher {
            Some(dispatcher) => dispatcher.enqueue(envelope, cancel).await,
            None => self.dispatch(envelope, cancel).await,
        }
    }

    /// Run every handler subscribed to the envelope's shape, in order.
    ///
    /// The first failing handler ends the dispatch and its error is returned.
    pub(crate) async fn dispatch(
        &self,
        envelope: MessageEnvelope,
        cancel: &CancellationToken,
    ) -> Result<(), BrokerError> {
        let handlers = self
            .inner
            .handlers
            .get()
            .ok_or(BrokerError::NotActivated)?;

        let name = envelope.name();
        let subscriptions = handlers.get(name);
        if subscriptions.is_empty() {
            tracing::debug!(message = name, message_id = %envelope.message_id, "no handlers subscribed");
            return Ok(());
        }

        for subscription in subscriptions {
            let scope = Scope::new(Arc::clone(&self.inner.services));
            let ctx = HandlerContext::new(&envelope, scope, cancel.clone());
            let span = tracing::debug_span!(
                "handle_message",
                message = name,
                module = %subscription.module,
                message_id = %envelope.message_id,
                correlation_id = %envelope.context.correlation_id,
            );
            let handled = (subscription.handler)(envelope.clone(), ctx).instrument(span);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(BrokerError::Cancelled { message: name });
                }
                result = handled => {
                    result.map_err(|err| BrokerError::from_handler(name, &subscription.module, err))?;
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl MessageSink for MessageBroker {
    async fn deliver(
        &self,
        envelope: MessageEnvelope,
        cancel: &CancellationToken,
    ) -> Result<(), BrokerError> {
        self.deliver_now(envelope, cancel).await
    }
}
