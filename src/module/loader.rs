use std::collections::HashSet;

use axum::Router;

use super::{Activation, Module, ModuleError, Services, Stage};
use crate::config::MonolithConfig;

pub type ModuleFactory = Box<dyn Fn() -> Box<dyn Module> + Send + Sync>;

/// Static registry of the modules compiled into the host.
///
/// ```ignore
/// let loader = ModuleLoader::new()
///     .module(AvailabilityModule::default)
///     .module(ParkingSpotsModule::default);
/// ```
#[derive(Default)]
pub struct ModuleLoader {
    factories: Vec<ModuleFactory>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module<M, F>(mut self, factory: F) -> Self
    where
        M: Module + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.factories
            .push(Box::new(move || Box::new(factory()) as Box<dyn Module>));
        self
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiate the enabled modules, ordered by name.
    ///
    /// Disabled modules are dropped before any hook runs. Two modules with the
    /// same name are a startup error.
    pub fn discover(&self, config: &MonolithConfig) -> Result<Vec<Box<dyn Module>>, ModuleError> {
        let mut seen = HashSet::new();
        let mut modules = Vec::with_capacity(self.factories.len());

        for factory in &self.factories {
            let module = factory();
            let name = module.name().to_string();
            if !seen.insert(name.clone()) {
                return Err(ModuleError::Duplicate(name));
            }
            if !config.is_enabled(&name) {
                tracing::info!(module = %name, "module disabled, skipping");
                continue;
            }
            modules.push(module);
        }

        modules.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(modules)
    }
}

pub fn register_all(
    modules: &[Box<dyn Module>],
    services: &mut Services,
    config: &MonolithConfig,
) -> Result<(), ModuleError> {
    for module in modules {
        let settings = config.module(module.name());
        module
            .register(services, &settings)
            .map_err(|err| err.during(module.name(), Stage::Register))?;
        tracing::info!(module = module.name(), "module registered");
    }
    Ok(())
}

pub fn activate_all(
    modules: &[Box<dyn Module>],
    activation: &mut Activation,
) -> Result<(), ModuleError> {
    for module in modules {
        let mut pipeline = activation.pipeline(module.name());
        module
            .activate(&mut pipeline)
            .map_err(|err| err.during(module.name(), Stage::Activate))?;
        tracing::info!(module = module.name(), "module activated");
    }
    Ok(())
}

pub fn expose_all(modules: &[Box<dyn Module>], router: Router) -> Router {
    modules
        .iter()
        .fold(router, |router, module| module.expose(router))
}
