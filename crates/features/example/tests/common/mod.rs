#![allow(dead_code, unreachable_pub)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tally_cqrs::pipeline::HeaderAuthenticator;
use tally_cqrs::{Aggregate, DatabaseUnitOfWork, Inbound, OutboxRelay, Pipeline, UnitOfWork};
use tally_database::Database;
use tally_domain::config::{RelayConfig, TransactionConfig};
use tally_domain::context::{CallerId, CorrelationId, RequestContext, RequestId};
use tally_event_bus::EventBus;
use tally_example::dto::{CreateExampleRequest, ExampleResponse};
use tally_example::{Example, ExampleModel, InMemoryDirectory, UserDirectory};
use tally_kernel::errors::ServiceError;
use tally_kernel::security::OwnershipGuard;

pub fn fast_relay() -> RelayConfig {
    RelayConfig { base_backoff_ms: 0, max_backoff_ms: 0, poll_interval_ms: 5, ..RelayConfig::default() }
}

/// The example slice wired the way the platform wires it, around an in-process database.
pub struct Harness {
    pub db: Database,
    pub bus: EventBus,
    pub uow: Arc<DatabaseUnitOfWork>,
    pub example: Example,
    pub pipeline: Pipeline,
    pub relay: OutboxRelay,
}

impl Harness {
    pub fn new() -> Self {
        let directory = InMemoryDirectory::new();
        directory.insert("u1", "Ada");
        directory.insert("u2", "Grace");
        Self::with(Arc::new(directory), fast_relay())
    }

    pub fn with(directory: Arc<dyn UserDirectory>, relay: RelayConfig) -> Self {
        let db = Database::builder().init().unwrap();
        let bus = EventBus::new();
        let example = tally_example::init(&db, &bus, directory).unwrap();

        let uow = Arc::new(DatabaseUnitOfWork::new(db.clone(), &TransactionConfig::default()));
        let guard = OwnershipGuard::builder().policy(ExampleModel::TABLE, example.ownership_policy()).build();
        let pipeline = Pipeline::builder()
            .unit_of_work(uow.clone() as Arc<dyn UnitOfWork>)
            .authenticator(Arc::new(HeaderAuthenticator::default()))
            .guard(guard)
            .max_duration(Duration::from_secs(5))
            .build();
        let relay = OutboxRelay::new(db.clone(), Arc::new(bus.clone()), relay).unwrap();

        Self { db, bus, uow, example, pipeline, relay }
    }

    pub fn as_caller(caller: &str) -> Inbound {
        Inbound::new("/examples").header("X-Caller-ID", caller)
    }

    /// Creates an example through the pipeline and returns the response.
    pub async fn create(&self, owner: &str, name: &str, is_public: bool) -> ExampleResponse {
        let request = CreateExampleRequest { name: name.into(), description: String::new(), is_public };
        let response = self.pipeline.mutate(&Self::as_caller(owner), &self.example.create(request)).await;
        assert_eq!(response.status, 201, "create failed: {:?}", response.body);
        response.into_result().unwrap()
    }

    /// A request context for driving the service directly, outside the pipeline.
    pub fn context(caller: &str) -> RequestContext {
        RequestContext::new(
            RequestId::new(tally_kernel::record_id("req")),
            CorrelationId::new("direct"),
            "/examples",
            true,
        )
        .with_caller(CallerId::new(caller))
    }
}

/// Fails the first `failures` lookups, then answers with a fixed name.
#[derive(Debug, Default)]
pub struct FlakyDirectory {
    pub failures: usize,
    pub calls: AtomicUsize,
}

impl FlakyDirectory {
    pub fn answered(&self) -> usize {
        self.calls.load(Ordering::SeqCst).saturating_sub(self.failures)
    }
}

#[async_trait]
impl UserDirectory for FlakyDirectory {
    async fn display_name(&self, _user_id: &str) -> Result<Option<String>, ServiceError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(ServiceError::internal("directory unavailable"));
        }
        Ok(Some("Ada".into()))
    }
}
