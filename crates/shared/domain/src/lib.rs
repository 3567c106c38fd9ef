//! # Domain Types
//!
//! Pure types shared by every layer of the coordination core: request context, the closed
//! error taxonomy, domain events and their outbox envelope, versioned write records and
//! configuration. Keep it lean: no I/O, no id generation, no async.

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod event;
pub mod outbox;
pub mod record;

pub use context::{CallerId, CorrelationId, RequestContext, RequestId};
pub use error::{Classify, ErrorKind};
pub use event::{DomainEvent, Topic, TopicError};
pub use outbox::{DispatchState, OutboxEntry, TransitionError};
pub use record::WriteRecord;
