use std::sync::{Arc, OnceLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{RequestError, RouteTable};
use crate::contract;
use crate::module::{Scope, Services};

/// Caller side of the local router.
///
/// Cloning creates another handle to the same route table. Routes become
/// visible once the host finishes activating modules.
#[derive(Clone)]
pub struct ModuleClient {
    routes: Arc<OnceLock<RouteTable>>,
    services: Arc<Services>,
}

impl ModuleClient {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            routes: Arc::new(OnceLock::new()),
            services,
        }
    }

    /// Install the route table. Only the first call has any effect.
    pub(crate) fn activate(&self, routes: RouteTable) -> bool {
        self.routes.set(routes).is_ok()
    }

    pub fn is_activated(&self) -> bool {
        self.routes.get().is_some()
    }

    pub fn routes(&self) -> Option<&RouteTable> {
        self.routes.get()
    }

    /// Send `request` to the handler subscribed to `path` and wait for it.
    pub async fn send<T>(
        &self,
        path: &str,
        request: &T,
        cancel: &CancellationToken,
    ) -> Result<(), RequestError>
    where
        T: Serialize + ?Sized,
    {
        self.invoke(path, request, cancel).await.map(|_| ())
    }

    /// Like [`ModuleClient::send`], decoding the handler's response into `R`.
    pub async fn request<T, R>(
        &self,
        path: &str,
        request: &T,
        cancel: &CancellationToken,
    ) -> Result<R, RequestError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.invoke(path, request, cancel).await?;
        contract::decode(response).map_err(|source| RequestError::ContractMismatch {
            path: path.to_string(),
            source,
        })
    }

    async fn invoke<T>(
        &self,
        path: &str,
        request: &T,
        cancel: &CancellationToken,
    ) -> Result<Value, RequestError>
    where
        T: Serialize + ?Sized,
    {
        let routes = self.routes.get().ok_or(RequestError::NotActivated)?;
        let route = routes
            .get(path)
            .ok_or_else(|| RequestError::RouteNotFound {
                path: path.to_string(),
            })?;

        let mismatch = |source: serde_json::Error| RequestError::ContractMismatch {
            path: path.to_string(),
            source,
        };
        let payload = contract::encode(request).map_err(mismatch)?;

        if cancel.is_cancelled() {
            return Err(RequestError::Cancelled {
                path: path.to_string(),
            });
        }

        let scope = Scope::new(Arc::clone(&self.services));
        let future = (route.handler)(payload, scope, cancel.clone()).map_err(mismatch)?;
        let task = tokio::spawn(future);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(path, module = %route.module, "local request cancelled by caller");
                Err(RequestError::Cancelled { path: path.to_string() })
            }
            joined = task => match joined {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(source)) => Err(RequestError::Handler {
                    path: path.to_string(),
                    source,
                }),
                Err(err) => {
                    tracing::error!(path, module = %route.module, error = %err, "local request handler panicked");
                    Err(RequestError::HandlerPanicked { path: path.to_string() })
                }
            },
        }
    }
}
