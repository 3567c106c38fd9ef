use crate::context::TransactionContext;
use crate::{CqrsError, CqrsErrorExt};
use chrono::{Duration, Utc};
use serde::Serialize;
use tally_database::{Database, OutboxStats};
use tally_domain::event::{DomainEvent, Topic};
use tally_domain::outbox::{DispatchState, OutboxEntry};
use tracing::{debug, info};

/// Transactional event outbox.
///
/// Business code only ever calls [`EventOutbox::enqueue`]; delivery is the relay's job and happens
/// strictly after commit.
#[derive(Debug, Clone)]
pub struct EventOutbox {
    db: Database,
}

impl EventOutbox {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Stages an event in `tx`, stamped with the transaction's correlation id. Returns the event id.
    pub fn enqueue(
        &self,
        tx: &mut TransactionContext,
        topic: Topic,
        payload: impl Serialize,
    ) -> Result<String, CqrsError> {
        let payload = serde_json::to_value(payload).context(topic.to_string())?;
        let event_id = tally_kernel::record_id("event");
        let event =
            DomainEvent::new(event_id.clone(), Utc::now(), tx.correlation_id().clone(), topic, payload);

        debug!(event_id, topic = %event.topic(), tx = tx.id(), "Event staged");
        tx.session_mut()?.enqueue(event).context("enqueue")?;
        Ok(event_id)
    }

    #[must_use]
    pub fn entry(&self, sequence: u64) -> Option<OutboxEntry> {
        self.db.outbox_entry(sequence)
    }

    /// Committed entries, optionally narrowed to one state, in sequence order.
    #[must_use]
    pub fn entries(&self, state: Option<DispatchState>) -> Vec<OutboxEntry> {
        self.db.outbox_entries(state)
    }

    /// Entries that exhausted their attempts, for operational inspection.
    #[must_use]
    pub fn failed(&self) -> Vec<OutboxEntry> {
        self.entries(Some(DispatchState::Failed))
    }

    /// Gives a failed entry a fresh attempt budget.
    pub fn retry_failed(&self, sequence: u64) -> Result<(), CqrsError> {
        self.db.retry_failed(sequence).context("retry_failed")?;
        info!(sequence, "Failed outbox entry re-armed");
        Ok(())
    }

    /// Downstream confirmation for a dispatched entry.
    pub fn acknowledge(&self, sequence: u64) -> Result<(), CqrsError> {
        self.db.acknowledge(sequence).context("acknowledge")?;
        Ok(())
    }

    /// Drops acknowledged entries older than `retention`. Returns how many were removed.
    pub fn collect_garbage(&self, retention: Duration) -> usize {
        let removed = self.db.collect_garbage(Utc::now() - retention);
        if removed > 0 {
            info!(removed, "Outbox garbage collected");
        }
        removed
    }

    #[must_use]
    pub fn stats(&self) -> OutboxStats {
        self.db.outbox_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DatabaseUnitOfWork, UnitOfWork};
    use serde_json::json;
    use tally_domain::config::TransactionConfig;
    use tally_domain::context::{CorrelationId, RequestContext, RequestId};

    #[tokio::test]
    async fn enqueued_events_appear_only_after_commit() {
        let db = Database::builder().init().unwrap();
        let uow = DatabaseUnitOfWork::new(db.clone(), &TransactionConfig::default());
        let outbox = EventOutbox::new(db);
        let ctx = RequestContext::new(RequestId::new("r1"), CorrelationId::new("corr-1"), "/x", true);

        let mut tx = uow.begin(&ctx).await.unwrap();
        let event_id =
            outbox.enqueue(&mut tx, Topic::new("example.created").unwrap(), json!({ "id": 1 })).unwrap();
        assert!(outbox.entries(None).is_empty());
        assert_eq!(tx.session().staged_outbox().len(), 1);

        uow.commit(&mut tx).await.unwrap();
        let entries = outbox.entries(Some(DispatchState::Dispatchable));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event().event_id(), event_id);
        assert_eq!(entries[0].event().correlation_id().as_str(), "corr-1");
    }

    #[tokio::test]
    async fn enqueue_on_a_finished_transaction_fails() {
        let db = Database::builder().init().unwrap();
        let uow = DatabaseUnitOfWork::new(db.clone(), &TransactionConfig::default());
        let ctx = RequestContext::new(RequestId::new("r1"), CorrelationId::new("c"), "/x", true);
        let mut tx = uow.begin(&ctx).await.unwrap();
        uow.rollback(&mut tx).await.unwrap();

        let result = EventOutbox::new(db).enqueue(&mut tx, Topic::new("example.deleted").unwrap(), ());
        assert!(matches!(result, Err(CqrsError::Closed { .. })));
    }
}
