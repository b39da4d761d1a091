use axum::Router;

use super::{ModuleError, Pipeline, Services};
use crate::config::ModuleSettings;

/// A business module hosted by the monolith.
///
/// Hooks run once each, in this order: `register` for every enabled module,
/// then `activate` for every module, then `expose`.
pub trait Module: Send + Sync {
    /// Unique, stable module name (`"availability"`, `"parking_spots"`).
    fn name(&self) -> &str;

    /// Authorization policy names the module declares.
    fn policies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Add the module's collaborators to the composition root.
    fn register(&self, _services: &mut Services, _settings: &ModuleSettings) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Subscribe local routes and message handlers.
    fn activate(&self, _pipeline: &mut Pipeline<'_>) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Mount HTTP endpoints.
    fn expose(&self, router: Router) -> Router {
        router
    }
}
