//! Example feature slice: an owned, versioned aggregate with a denormalized read model.
//!
//! Writes go through [`ExampleService`] inside the request transaction and stage
//! `example.{created,updated,deleted,activated,deactivated}` events in the outbox. The
//! [`ExampleProjector`] consumes those events after commit and maintains the
//! [`records::EXAMPLE_VIEW`] projection that reads are served from.

mod directory;
pub mod dto;
mod error;
pub mod events;
mod mapper;
mod model;
pub mod operations;
mod policy;
mod projector;
pub mod records;
mod service;

pub use directory::{InMemoryDirectory, UserDirectory};
pub use error::{ExampleError, ExampleErrorCode, ExampleErrorExt};
pub use mapper::{ExampleMapper, NewExample, display_name, status_text};
pub use model::{ExampleModel, MAX_DESCRIPTION_LEN, MAX_NAME_LEN};
pub use policy::ExampleOwnershipPolicy;
pub use projector::ExampleProjector;
pub use service::ExampleService;

use crate::dto::{CreateExampleRequest, ListExamplesRequest, UpdateExampleRequest};
use crate::events::ExampleTopic;
use crate::operations::{
    CreateExample, DeleteExample, GetExample, ListExamples, SetExampleActive, UpdateExample,
};
use std::sync::Arc;
use tally_database::Database;
use tally_event_bus::{EventBus, EventHandler, Idempotent};
use tally_kernel::security::OwnershipPolicy;

/// Example feature state
#[tally_derive::tally_slice]
pub struct Example {
    pub service: ExampleService,
    pub policy: Arc<ExampleOwnershipPolicy>,
}

/// Initialize the example feature and subscribe its projector to every example topic.
///
/// # Errors
///
/// Returns an error if a topic name is rejected.
pub fn init(
    db: &Database,
    bus: &EventBus,
    directory: Arc<dyn UserDirectory>,
) -> Result<Example, ExampleError> {
    let projector: Arc<dyn EventHandler> =
        Arc::new(Idempotent::new(ExampleProjector::new(db.clone(), directory)));
    for topic in ExampleTopic::ALL {
        bus.subscribe(topic.topic()?, projector.clone());
    }

    tracing::info!("Example slice initialized");

    Ok(Example::new(ExampleInner {
        service: ExampleService::new(db.clone()),
        policy: Arc::new(ExampleOwnershipPolicy::new(db.clone())),
    }))
}

impl Example {
    /// Policy to register with the ownership guard under [`ExampleModel`]'s table.
    #[must_use]
    pub fn ownership_policy(&self) -> Arc<dyn OwnershipPolicy> {
        self.policy.clone()
    }

    #[must_use]
    pub fn create(&self, request: CreateExampleRequest) -> CreateExample {
        CreateExample { service: self.service.clone(), request }
    }

    #[must_use]
    pub fn update(&self, id: impl Into<String>, request: UpdateExampleRequest) -> UpdateExample {
        UpdateExample { service: self.service.clone(), id: id.into(), request }
    }

    #[must_use]
    pub fn delete(&self, id: impl Into<String>) -> DeleteExample {
        DeleteExample { service: self.service.clone(), id: id.into() }
    }

    #[must_use]
    pub fn activate(&self, id: impl Into<String>) -> SetExampleActive {
        SetExampleActive { service: self.service.clone(), id: id.into(), active: true }
    }

    #[must_use]
    pub fn deactivate(&self, id: impl Into<String>) -> SetExampleActive {
        SetExampleActive { service: self.service.clone(), id: id.into(), active: false }
    }

    #[must_use]
    pub fn get(&self, id: impl Into<String>) -> GetExample {
        GetExample { service: self.service.clone(), id: id.into() }
    }

    #[must_use]
    pub fn list(&self, request: ListExamplesRequest) -> ListExamples {
        ListExamples { service: self.service.clone(), request }
    }
}
