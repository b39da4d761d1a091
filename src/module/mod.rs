//! Module registry and loader.
//!
//! ```text
//! ModuleLoader::discover   enabled modules, sorted by name
//!        │
//!        ▼
//! register_all             each module fills the shared Services
//!        │
//!        ▼
//! activate_all             local routes + message subscriptions, then frozen
//!        │
//!        ▼
//! expose_all               HTTP endpoints on an axum Router
//! ```
//!
//! A failure at any step aborts startup; no module is left half active.

mod catalog;
mod error;
mod loader;
#[allow(clippy::module_inception)]
mod module;
mod pipeline;
mod services;

pub use catalog::{ModuleCatalog, ModuleInfo};
pub use error::{ModuleError, Stage};
pub use loader::{activate_all, expose_all, register_all, ModuleFactory, ModuleLoader};
pub use module::Module;
pub use pipeline::{Activation, Pipeline};
pub use services::{Scope, Services};
