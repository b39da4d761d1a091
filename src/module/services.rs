use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::HandlerError;

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Services) -> Instance + Send + Sync>;

/// Composition root shared by all modules.
///
/// Modules add their collaborators during `register`; handlers resolve them
/// from a [`Scope`]. Values are stored by type and handed out as clones, so
/// register cheap handles (`Arc<dyn Trait>`, repository handles and the like).
#[derive(Default)]
pub struct Services {
    singletons: HashMap<TypeId, Instance>,
    scoped: HashMap<TypeId, Factory>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// One instance for the lifetime of the host.
    pub fn add_singleton<T>(&mut self, value: T) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
    {
        if self.singletons.insert(TypeId::of::<T>(), Arc::new(value)).is_some() {
            tracing::debug!(service = type_name::<T>(), "singleton replaced");
        }
        self
    }

    /// A fresh instance per scope, built by `factory` on first use.
    pub fn add_scoped<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Services) -> T + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |services| Arc::new(factory(services)));
        if self.scoped.insert(TypeId::of::<T>(), factory).is_some() {
            tracing::debug!(service = type_name::<T>(), "scoped factory replaced");
        }
        self
    }

    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.singletons
            .get(&TypeId::of::<T>())
            .and_then(|instance| instance.downcast_ref::<T>())
            .cloned()
    }

    pub fn contains<T: 'static>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.singletons.contains_key(&id) || self.scoped.contains_key(&id)
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("singletons", &self.singletons.len())
            .field("scoped", &self.scoped.len())
            .finish()
    }
}

/// Per-call resolution scope. Scoped services are built at most once per scope.
#[derive(Clone)]
pub struct Scope {
    services: Arc<Services>,
    instances: Arc<Mutex<HashMap<TypeId, Instance>>>,
}

impl Scope {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            instances: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        if let Some(value) = self.services.get::<T>() {
            return Some(value);
        }

        let id = TypeId::of::<T>();
        let factory = self.services.scoped.get(&id)?;
        let mut instances = self.instances.lock().ok()?;
        let instance = instances
            .entry(id)
            .or_insert_with(|| factory(self.services.as_ref()));
        instance.downcast_ref::<T>().cloned()
    }

    /// Like [`Scope::get`], for handlers that cannot run without the service.
    pub fn require<T: Clone + 'static>(&self) -> Result<T, HandlerError> {
        self.get::<T>()
            .ok_or(HandlerError::MissingService(type_name::<T>()))
    }

    pub fn services(&self) -> &Services {
        &self.services
    }
}
