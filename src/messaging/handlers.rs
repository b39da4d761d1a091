use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::HandlerContext;
use crate::error::HandlerError;
use crate::message::{Message, MessageEnvelope};

pub(crate) type HandlerFuture = BoxFuture<'static, Result<(), HandlerError>>;
pub(crate) type DynHandler =
    Arc<dyn Fn(MessageEnvelope, HandlerContext) -> HandlerFuture + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Subscription {
    pub module: String,
    pub handler: DynHandler,
}

/// Erase a typed handler. The envelope is decoded into `M` on every call.
pub(crate) fn erase<M, F, Fut>(handler: F) -> DynHandler
where
    M: Message,
    F: Fn(M, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |envelope: MessageEnvelope, ctx: HandlerContext| -> HandlerFuture {
        let handler = Arc::clone(&handler);
        Box::pin(async move {
            let message = envelope
                .decode::<M>()
                .map_err(|err| HandlerError::DecodeFailed(err.to_string()))?;
            handler(message, ctx).await
        })
    })
}

/// Collects message subscriptions while modules activate.
#[derive(Default)]
pub struct HandlerTableBuilder {
    handlers: HashMap<&'static str, Vec<Subscription>>,
}

impl HandlerTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to every message whose shape name is `M::NAME`,
    /// on behalf of `module`. Handlers run in subscription order.
    pub fn subscribe<M, F, Fut>(&mut self, module: &str, handler: F) -> &mut Self
    where
        M: Message,
        F: Fn(M, HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.add(M::NAME, module, erase(handler))
    }

    pub(crate) fn add(&mut self, name: &'static str, module: &str, handler: DynHandler) -> &mut Self {
        tracing::debug!(module, message = name, "message handler subscribed");
        self.handlers.entry(name).or_default().push(Subscription {
            module: module.to_string(),
            handler,
        });
        self
    }

    /// Handlers `module` has already subscribed to `name`.
    pub(crate) fn count_for(&self, name: &str, module: &str) -> usize {
        self.handlers
            .get(name)
            .map(|subs| subs.iter().filter(|sub| sub.module == module).count())
            .unwrap_or(0)
    }

    pub fn build(self) -> HandlerTable {
        HandlerTable {
            handlers: self.handlers,
        }
    }
}

/// Frozen handler table, read without locking once activation is over.
pub struct HandlerTable {
    handlers: HashMap<&'static str, Vec<Subscription>>,
}

impl HandlerTable {
    pub(crate) fn get(&self, name: &str) -> &[Subscription] {
        self.handlers.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn count(&self, name: &str) -> usize {
        self.get(name).len()
    }

    /// Modules subscribed to `name`, in invocation order.
    pub fn subscribers(&self, name: &str) -> Vec<&str> {
        self.get(name)
            .iter()
            .map(|subscription| subscription.module.as_str())
            .collect()
    }
}
