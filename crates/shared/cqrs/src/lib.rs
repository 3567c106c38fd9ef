//! # CQRS coordination core
//!
//! Request-scoped transactions, CQRS repositories and outbox-based event dispatch, composed into
//! one ordered pipeline.
//!
//! ## Overview
//!
//! * [`UnitOfWork`] opens one [`TransactionContext`] per mutating request. The context is passed
//!   explicitly to every repository and outbox call; there is no ambient transaction.
//! * [`CommandRepository`] stores business models as versioned rows through a [`Mapper`];
//!   updates are conditional on the version that was read.
//! * [`QueryRepository`] reads projections directly, without a transaction.
//! * [`EventOutbox::enqueue`] stages events in the same transaction as the data change. After
//!   commit the [`OutboxRelay`] delivers them at least once.
//! * [`Pipeline`] chains correlation, authentication, ownership, the unit of work and error
//!   translation.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tally_cqrs::{DatabaseUnitOfWork, Inbound, Pipeline};
//! use tally_database::Database;
//! use tally_domain::config::TransactionConfig;
//!
//! # fn main() -> Result<(), tally_database::DatabaseError> {
//! let db = Database::builder().init()?;
//! let uow = DatabaseUnitOfWork::new(db, &TransactionConfig::default());
//! let pipeline = Pipeline::builder().unit_of_work(Arc::new(uow)).build();
//!
//! let inbound = Inbound::new("/examples").header("X-Correlation-ID", "corr-1");
//! assert_eq!(tally_cqrs::pipeline::correlate(&inbound).as_str(), "corr-1");
//! # drop(pipeline);
//! # Ok(())
//! # }
//! ```

mod context;
mod error;
mod mapper;
mod outbox;
pub mod pipeline;
mod relay;
pub mod repository;
mod unit_of_work;

pub use context::{TransactionContext, TransactionState};
pub use error::{CqrsError, CqrsErrorExt};
pub use mapper::{Aggregate, Mapper, ModelMeta};
pub use outbox::EventOutbox;
pub use pipeline::{
    Authenticator, Inbound, MutatingOperation, Pipeline, PipelineResponse, QueryOperation, Stage,
};
pub use relay::{OutboxRelay, RelayHandle, RelayReport};
pub use repository::{CommandRepository, Filter, QueryRepository, TableCommandRepository, ViewQueryRepository};
pub use unit_of_work::{DatabaseUnitOfWork, UnitOfWork};
