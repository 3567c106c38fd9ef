use crate::error::{PlatformError, PlatformErrorExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tally_cqrs::pipeline::{Anonymous, Authenticator};
use tally_cqrs::{
    Aggregate, DatabaseUnitOfWork, EventOutbox, OutboxRelay, Pipeline, RelayHandle, RelayReport,
    UnitOfWork,
};
use tally_database::Database;
use tally_domain::config::AppConfig;
use tally_event_bus::EventBus;
use tally_example::{Example, ExampleModel, InMemoryDirectory, UserDirectory};
use tally_kernel::security::OwnershipGuard;
use tally_logger::Logger;
use tracing::info;

/// A fluent builder for configuring and initializing the [`Platform`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Default)]
pub struct PlatformBuilder {
    cfg: AppConfig,
    logging: bool,
    authenticator: Option<Arc<dyn Authenticator>>,
    directory: Option<Arc<dyn UserDirectory>>,
}

impl std::fmt::Debug for PlatformBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformBuilder")
            .field("cfg", &self.cfg)
            .field("logging", &self.logging)
            .finish_non_exhaustive()
    }
}

impl PlatformBuilder {
    pub fn config(mut self, cfg: AppConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Installs the global subscriber from the `[logging]` section during [`Self::build`].
    pub const fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Identity verification for inbound requests. Defaults to [`Anonymous`].
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Display names for the example read model. Defaults to an empty in-memory directory.
    pub fn directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Consumes the builder and wires the platform.
    ///
    /// # Process
    /// 1. Installs the logger, when enabled
    /// 2. Opens the database
    /// 3. Creates the event bus and registers the feature slices on it
    /// 4. Builds the ownership guard and the request pipeline
    /// 5. Prepares the outbox relay; [`Platform::start`] runs it
    ///
    /// # Errors
    /// Returns an error if the logger is already installed, the database or relay configuration
    /// is rejected, or a slice fails to initialize.
    pub fn build(self) -> Result<Platform, PlatformError> {
        let logger = if self.logging {
            Some(Logger::from_config(&self.cfg.logging).context("logging")?)
        } else {
            None
        };

        let db = Database::builder().outbox_capacity(self.cfg.database.outbox_capacity).init()?;
        let bus = EventBus::new();

        let directory = self.directory.unwrap_or_else(|| Arc::new(InMemoryDirectory::new()));
        let example = tally_example::init(&db, &bus, directory)?;

        let guard = OwnershipGuard::builder().policy(ExampleModel::TABLE, example.ownership_policy()).build();
        let unit_of_work: Arc<dyn UnitOfWork> =
            Arc::new(DatabaseUnitOfWork::new(db.clone(), &self.cfg.transaction));
        let pipeline = Pipeline::builder()
            .unit_of_work(unit_of_work)
            .authenticator(self.authenticator.unwrap_or_else(|| Arc::new(Anonymous)))
            .guard(guard)
            .errors(&self.cfg.errors)
            .max_duration(self.cfg.transaction.max_duration())
            .build();

        let relay = OutboxRelay::new(db.clone(), Arc::new(bus.clone()), self.cfg.relay.clone())
            .context("relay configuration")?;

        info!(workers = self.cfg.relay.workers, "Platform assembled");

        Ok(Platform {
            cfg: self.cfg,
            outbox: EventOutbox::new(db.clone()),
            db,
            bus,
            pipeline,
            relay,
            example,
            running: Mutex::new(None),
            _logger: logger,
        })
    }
}

/// The assembled coordination core with its registered slices.
#[derive(Debug)]
pub struct Platform {
    cfg: AppConfig,
    db: Database,
    bus: EventBus,
    outbox: EventOutbox,
    pipeline: Pipeline,
    relay: OutboxRelay,
    example: Example,
    running: Mutex<Option<RelayHandle>>,
    _logger: Option<Logger>,
}

impl Platform {
    pub fn builder() -> PlatformBuilder {
        PlatformBuilder::default()
    }

    /// Spawns the relay workers. Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// [`PlatformError::State`] if the relay is already running.
    pub fn start(&self) -> Result<(), PlatformError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(PlatformError::State { message: "relay already running".into(), context: None });
        }
        *running = Some(self.relay.spawn());
        Ok(())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Stops the relay workers, then delivers whatever is still due.
    pub async fn shutdown(&self) -> RelayReport {
        let handle = self.running.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
        let report = self.relay.drain().await;
        info!(dispatched = report.dispatched, failed = report.failed, "Platform stopped");
        report
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.cfg
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub const fn outbox(&self) -> &EventOutbox {
        &self.outbox
    }

    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[must_use]
    pub const fn relay(&self) -> &OutboxRelay {
        &self.relay
    }

    #[must_use]
    pub const fn example(&self) -> &Example {
        &self.example
    }
}
