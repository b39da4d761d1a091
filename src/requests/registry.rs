use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::RequestError;
use crate::contract;
use crate::error::HandlerError;
use crate::module::Scope;

pub(crate) type RequestFuture = BoxFuture<'static, Result<Value, HandlerError>>;

/// Decodes the payload into the handler's contract, then hands back the
/// handler future. Decoding happens before anything is spawned.
pub(crate) type DynRequestHandler = Arc<
    dyn Fn(Value, Scope, CancellationToken) -> Result<RequestFuture, serde_json::Error>
        + Send
        + Sync,
>;

#[derive(Clone)]
pub(crate) struct Route {
    pub module: String,
    pub handler: DynRequestHandler,
}

/// Collects path subscriptions while modules activate.
#[derive(Default)]
pub struct RouteTableBuilder {
    routes: HashMap<String, Route>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `path` on behalf of `module`.
    ///
    /// Paths are exact, case-sensitive keys. A path can only be taken once.
    pub fn subscribe<T, R, F, Fut>(
        &mut self,
        module: &str,
        path: impl Into<String>,
        handler: F,
    ) -> Result<&mut Self, RequestError>
    where
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(T, Scope, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        let path = path.into();
        if let Some(existing) = self.routes.get(&path) {
            return Err(RequestError::DuplicateRoute {
                path,
                module: existing.module.clone(),
            });
        }

        let handler = Arc::new(handler);
        let erased: DynRequestHandler = Arc::new(
            move |payload: Value,
                  scope: Scope,
                  cancel: CancellationToken|
                  -> Result<RequestFuture, serde_json::Error> {
                let request = contract::decode::<T>(payload)?;
                let handler = Arc::clone(&handler);
                let future: RequestFuture = Box::pin(async move {
                    let response = handler(request, scope, cancel).await?;
                    contract::encode(&response).map_err(HandlerError::from)
                });
                Ok(future)
            },
        );

        tracing::debug!(module, path = %path, "local route subscribed");
        self.routes.insert(
            path,
            Route {
                module: module.to_string(),
                handler: erased,
            },
        );
        Ok(self)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    pub fn build(self) -> RouteTable {
        RouteTable {
            routes: self.routes,
        }
    }
}

/// Frozen path table, read without locking once activation is over.
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    pub(crate) fn get(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    /// Subscribed paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn owner(&self, path: &str) -> Option<&str> {
        self.routes.get(path).map(|route| route.module.as_str())
    }
}
