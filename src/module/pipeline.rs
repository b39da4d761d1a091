use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{ModuleError, Scope};
use crate::clock::{Clock, UtcClock};
use crate::error::HandlerError;
use crate::inbox::{Inbox, InboxStore};
use crate::message::Message;
use crate::messaging::{erase, HandlerContext, HandlerTableBuilder, MessageBroker};
use crate::requests::{ModuleClient, RouteTableBuilder};

/// Wiring collected while modules activate.
///
/// Once every module has activated, [`Activation::complete`] freezes the
/// route and handler tables into the client and broker.
pub struct Activation {
    routes: RouteTableBuilder,
    handlers: HandlerTableBuilder,
    client: ModuleClient,
    broker: MessageBroker,
    inbox: Option<Arc<dyn InboxStore>>,
    clock: Arc<dyn Clock>,
}

impl Activation {
    pub fn new(client: ModuleClient, broker: MessageBroker) -> Self {
        Self {
            routes: RouteTableBuilder::new(),
            handlers: HandlerTableBuilder::new(),
            client,
            broker,
            inbox: None,
            clock: Arc::new(UtcClock),
        }
    }

    /// Deduplicate every message handler through `store`.
    pub fn with_inbox(mut self, store: Arc<dyn InboxStore>) -> Self {
        self.inbox = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The view one module activates against.
    pub fn pipeline(&mut self, module: &str) -> Pipeline<'_> {
        let inbox = self
            .inbox
            .as_ref()
            .map(|store| Inbox::new(module, Arc::clone(store)).with_clock(Arc::clone(&self.clock)));
        Pipeline {
            module: module.to_string(),
            inbox,
            activation: self,
        }
    }

    pub fn complete(self) -> Result<(), ModuleError> {
        if !self.client.activate(self.routes.build()) {
            return Err(ModuleError::invalid("local routes were already activated"));
        }
        if !self.broker.activate(self.handlers.build()) {
            return Err(ModuleError::invalid("message handlers were already activated"));
        }
        Ok(())
    }
}

/// Per-module activation surface: local routes, message subscriptions and
/// handles to the client and broker for handlers to capture.
pub struct Pipeline<'a> {
    module: String,
    inbox: Option<Inbox>,
    activation: &'a mut Activation,
}

impl Pipeline<'_> {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn client(&self) -> ModuleClient {
        self.activation.client.clone()
    }

    pub fn broker(&self) -> MessageBroker {
        self.activation.broker.clone()
    }

    /// Subscribe a local contract handler to `path`.
    pub fn route<T, R, F, Fut>(
        &mut self,
        path: impl Into<String>,
        handler: F,
    ) -> Result<&mut Self, ModuleError>
    where
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(T, Scope, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        self.activation
            .routes
            .subscribe(&self.module, path, handler)?;
        Ok(self)
    }

    /// Subscribe a message handler for `M`'s shape name.
    pub fn subscribe<M, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        M: Message,
        F: Fn(M, HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.activation.broker.types().register::<M>();
        let handler = erase(handler);
        let handler = match &self.inbox {
            Some(inbox) => {
                let ordinal = self.activation.handlers.count_for(M::NAME, &self.module);
                inbox.consumer(ordinal).guard(handler)
            }
            None => handler,
        };
        self.activation.handlers.add(M::NAME, &self.module, handler);
        self
    }

    /// Make `M` rebuildable from the outbox without subscribing to it.
    pub fn register_message<M: Message>(&mut self) -> &mut Self {
        self.activation.broker.types().register::<M>();
        self
    }
}
