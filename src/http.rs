//! HTTP surface of the host.
//!
//! ## Routes
//!
//! - `GET /health` returns `{ "ok": true, "modules": [...] }`.
//! - Everything else is mounted by the modules' `expose` hooks.
//!
//! ```ignore
//! let host = Host::builder(config).module(AvailabilityModule::default).build()?;
//! modular_rust::http::serve(host.router(), "0.0.0.0:3000").await?;
//! ```

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use crate::message::MessageContext;
use crate::module::{expose_all, Module, ModuleCatalog};

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const TRACE_ID_HEADER: &str = "x-trace-id";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Health route plus every module's endpoints.
pub fn router(modules: &[Box<dyn Module>], catalog: ModuleCatalog) -> Router {
    let health = Router::new()
        .route("/health", get(health_handler))
        .with_state(catalog);
    expose_all(modules, health)
}

/// Serve `router` at the given address (e.g. `"0.0.0.0:3000"`).
pub async fn serve(router: Router, addr: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

async fn health_handler(State(catalog): State<ModuleCatalog>) -> impl IntoResponse {
    Json(json!({ "ok": true, "modules": catalog.names() }))
}

/// Message context for a request: correlation and trace ids from the headers
/// when present and well formed, fresh ones otherwise.
pub fn context_from_headers(headers: &HeaderMap) -> MessageContext {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    let mut context = MessageContext::new();
    if let Some(correlation_id) = header(CORRELATION_ID_HEADER).and_then(|v| Uuid::parse_str(v).ok()) {
        context.correlation_id = correlation_id;
    }
    if let Some(trace_id) = header(TRACE_ID_HEADER) {
        context.trace_id = trace_id.to_string();
    }
    if let Some(user_id) = header(USER_ID_HEADER) {
        context.user_id = Some(user_id.to_string());
    }
    context
}

/// `{ "error": ... }` with the given status code.
pub fn error_response(status: u16, error: impl std::fmt::Display) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}
