//! # Event Bus
//!
//! A topic-keyed, asynchronous, in-process broker for committed domain events.
//!
//! ## Overview
//!
//! Handlers subscribe to a [`Topic`](tally_domain::event::Topic) (`{subdomain}.{action}`).
//! The outbox relay calls [`EventPublisher::publish`] for each committed entry; the bus runs
//! every handler of the topic and reports failure if any of them failed, so the relay can retry.
//!
//! ## Features
//!
//! * **At-least-once friendly**: [`Idempotent`] dedupes redeliveries by `event_id`.
//! * **High Performance**: `FxHashMap` + `parking_lot::RwLock`.
//! * **Observable**: a broadcast tap sees every successfully handled event.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tally_domain::{CorrelationId, DomainEvent, Topic};
//! use tally_event_bus::{EventBus, EventBusError, EventPublisher, FnHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EventBusError> {
//!     let bus = EventBus::new();
//!     let topic = Topic::new("example.created").expect("valid topic");
//!     bus.subscribe(topic.clone(), Arc::new(FnHandler::new("audit", |_event| async { Ok(()) })));
//!
//!     let event = DomainEvent::new(
//!         "evt-1".into(),
//!         chrono::Utc::now(),
//!         CorrelationId::new("corr-1"),
//!         topic,
//!         serde_json::json!({ "id": "example:1" }),
//!     );
//!     assert_eq!(bus.publish(&event).await?, 1);
//!     Ok(())
//! }
//! ```

mod bus;
mod error;
mod handler;
mod receiver;

pub use bus::{EventBus, EventPublisher, SubscriptionId};
pub use error::{EventBusError, EventBusErrorExt};
pub use handler::{EventHandler, FnHandler, Idempotent};
pub use receiver::EventReceiverExt;
