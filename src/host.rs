//! Composition root.
//!
//! The host discovers modules, runs their lifecycle hooks, builds the client,
//! broker and outbox, and owns the background jobs.
//!
//! ```ignore
//! let mut host = Host::builder(MonolithConfig::from_json_file("monolith.json")?)
//!     .module(AvailabilityModule::default)
//!     .module(ParkingSpotsModule::default)
//!     .with_outbox_store(SqliteOutboxStore::open(pool).await?)
//!     .build()?;
//!
//! host.start();
//! modular_rust::http::serve(host.router(), "0.0.0.0:3000").await?;
//! host.shutdown().await;
//! ```

use std::sync::Arc;

use axum::Router;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, UtcClock};
use crate::config::MonolithConfig;
use crate::inbox::{InMemoryInboxStore, InboxStore};
use crate::message::{MessageEnvelope, MessageTypes};
use crate::messaging::{
    message_channel, DispatcherJob, DispatcherStats, MessageBroker,
};
use crate::module::{
    activate_all, register_all, Activation, Module, ModuleCatalog, ModuleError, ModuleLoader,
    Services,
};
use crate::outbox::{InMemoryOutboxStore, Outbox, OutboxProcessor, OutboxStore, ProcessorStats};
use crate::requests::ModuleClient;

pub struct HostBuilder {
    config: MonolithConfig,
    loader: ModuleLoader,
    outbox_store: Option<Arc<dyn OutboxStore>>,
    inbox_store: Option<Arc<dyn InboxStore>>,
    clock: Arc<dyn Clock>,
}

impl HostBuilder {
    pub fn module<M, F>(mut self, factory: F) -> Self
    where
        M: Module + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.loader = self.loader.module(factory);
        self
    }

    pub fn with_loader(mut self, loader: ModuleLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Storage for the outbox when it is enabled. Defaults to memory.
    pub fn with_outbox_store(mut self, store: impl OutboxStore + 'static) -> Self {
        self.outbox_store = Some(Arc::new(store));
        self
    }

    /// Storage for the inbox when it is enabled. Defaults to memory.
    pub fn with_inbox_store(mut self, store: impl InboxStore + 'static) -> Self {
        self.inbox_store = Some(Arc::new(store));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Discover, register and activate every enabled module.
    pub fn build(self) -> Result<Host, ModuleError> {
        let HostBuilder {
            config,
            loader,
            outbox_store,
            inbox_store,
            clock,
        } = self;

        let modules = loader.discover(&config)?;
        let mut services = Services::new();
        register_all(&modules, &mut services, &config)?;
        let services = Arc::new(services);

        let types = MessageTypes::new();
        let client = ModuleClient::new(Arc::clone(&services));

        let outbox = config.outbox.enabled.then(|| {
            let store =
                outbox_store.unwrap_or_else(|| Arc::new(InMemoryOutboxStore::new()) as Arc<dyn OutboxStore>);
            Outbox::new(store, types.clone()).with_clock(Arc::clone(&clock))
        });

        let mut broker = MessageBroker::builder(Arc::clone(&services))
            .with_types(types)
            .with_clock(Arc::clone(&clock));
        let mut receiver = None;
        if config.messaging.use_async_dispatcher {
            let (dispatcher, rx) = message_channel(config.messaging.channel_capacity);
            broker = broker.with_dispatcher(dispatcher);
            receiver = Some(rx);
        }
        if let Some(outbox) = &outbox {
            broker = broker.with_outbox(outbox.clone());
        }
        let broker = broker.build();

        let mut activation =
            Activation::new(client.clone(), broker.clone()).with_clock(Arc::clone(&clock));
        if config.inbox.enabled {
            let store =
                inbox_store.unwrap_or_else(|| Arc::new(InMemoryInboxStore::new()) as Arc<dyn InboxStore>);
            activation = activation.with_inbox(store);
        }
        activate_all(&modules, &mut activation)?;
        activation.complete()?;

        let catalog = ModuleCatalog::from_modules(&modules);
        tracing::info!(
            modules = ?catalog.names(),
            mode = ?broker.mode(),
            "modular host built"
        );

        Ok(Host {
            config,
            modules,
            catalog,
            services,
            client,
            broker,
            outbox,
            receiver,
            cancel: CancellationToken::new(),
            dispatcher_job: None,
            outbox_processor: None,
        })
    }
}

/// Statistics from the host's background jobs, returned on shutdown.
#[derive(Debug, Default, Clone)]
pub struct HostStats {
    pub dispatcher: Option<DispatcherStats>,
    pub outbox: Option<ProcessorStats>,
}

pub struct Host {
    config: MonolithConfig,
    modules: Vec<Box<dyn Module>>,
    catalog: ModuleCatalog,
    services: Arc<Services>,
    client: ModuleClient,
    broker: MessageBroker,
    outbox: Option<Outbox>,
    receiver: Option<mpsc::Receiver<MessageEnvelope>>,
    cancel: CancellationToken,
    dispatcher_job: Option<DispatcherJob>,
    outbox_processor: Option<OutboxProcessor>,
}

impl Host {
    pub fn builder(config: MonolithConfig) -> HostBuilder {
        HostBuilder {
            config,
            loader: ModuleLoader::new(),
            outbox_store: None,
            inbox_store: None,
            clock: Arc::new(UtcClock),
        }
    }

    pub fn config(&self) -> &MonolithConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn client(&self) -> &ModuleClient {
        &self.client
    }

    pub fn broker(&self) -> &MessageBroker {
        &self.broker
    }

    pub fn outbox(&self) -> Option<&Outbox> {
        self.outbox.as_ref()
    }

    /// Health route plus the endpoints every module exposes.
    pub fn router(&self) -> Router {
        crate::http::router(&self.modules, self.catalog.clone())
    }

    /// Spawn the dispatcher (deferred mode) and the outbox processor (outbox
    /// enabled). Must run inside a Tokio runtime. Calling it again is a no-op.
    pub fn start(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            self.dispatcher_job = Some(DispatcherJob::spawn(
                self.broker.clone(),
                receiver,
                self.cancel.child_token(),
            ));
        }

        if self.outbox_processor.is_none() {
            if let Some(outbox) = &self.outbox {
                self.outbox_processor = Some(OutboxProcessor::spawn(
                    outbox.clone(),
                    self.broker.clone(),
                    self.config.outbox.interval(),
                    self.cancel.child_token(),
                ));
            }
        }
    }

    /// Token that stops every background job when cancelled.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop the background jobs, letting in-flight work finish.
    pub async fn shutdown(self) -> HostStats {
        self.cancel.cancel();

        let mut stats = HostStats::default();
        if let Some(processor) = self.outbox_processor {
            stats.outbox = Some(processor.stop().await);
        }
        if let Some(job) = self.dispatcher_job {
            stats.dispatcher = Some(job.stop().await);
        }
        tracing::info!("modular host stopped");
        stats
    }
}
