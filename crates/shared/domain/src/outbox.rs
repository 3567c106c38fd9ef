use crate::event::DomainEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter};

/// Lifecycle of an outbox entry.
///
/// `Pending` entries live only inside an open transaction. Commit turns them into
/// `Dispatchable`; only the relay moves them further.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DispatchState {
    Pending,
    Dispatchable,
    Dispatched,
    Acknowledged,
    Failed,
}

impl DispatchState {
    /// Terminal for the relay: nothing more will be delivered.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Dispatched | Self::Acknowledged | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid outbox transition from `{from}` to `{to}`")]
pub struct TransitionError {
    pub from: DispatchState,
    pub to: DispatchState,
}

/// A domain event wrapped with its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    sequence: u64,
    event: DomainEvent,
    state: DispatchState,
    attempts: u32,
    last_error: Option<String>,
    next_attempt_at: Option<DateTime<Utc>>,
    leased_until: Option<DateTime<Utc>>,
    transaction_id: String,
    dispatched_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    /// A freshly enqueued entry, owned by the transaction that created it.
    #[must_use]
    pub const fn pending(event: DomainEvent, transaction_id: String) -> Self {
        Self {
            sequence: 0,
            event,
            state: DispatchState::Pending,
            attempts: 0,
            last_error: None,
            next_attempt_at: None,
            leased_until: None,
            transaction_id,
            dispatched_at: None,
        }
    }

    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub const fn event(&self) -> &DomainEvent {
        &self.event
    }

    #[must_use]
    pub const fn state(&self) -> DispatchState {
        self.state
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub const fn next_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.next_attempt_at
    }

    #[must_use]
    pub const fn leased_until(&self) -> Option<DateTime<Utc>> {
        self.leased_until
    }

    #[must_use]
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    #[must_use]
    pub const fn dispatched_at(&self) -> Option<DateTime<Utc>> {
        self.dispatched_at
    }

    /// Whether the relay may pick this entry up at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == DispatchState::Dispatchable
            && self.next_attempt_at.is_none_or(|at| at <= now)
            && self.leased_until.is_none_or(|until| until <= now)
    }

    /// Assigned by the store at commit time; fixes the tie-break order within a topic.
    pub const fn assign_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    pub fn mark_dispatchable(&mut self) -> Result<(), TransitionError> {
        self.transition(DispatchState::Pending, DispatchState::Dispatchable)
    }

    pub fn lease(&mut self, until: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.state != DispatchState::Dispatchable {
            return Err(TransitionError { from: self.state, to: DispatchState::Dispatchable });
        }
        self.leased_until = Some(until);
        Ok(())
    }

    /// Successful delivery to every subscriber.
    pub fn mark_dispatched(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(DispatchState::Dispatchable, DispatchState::Dispatched)?;
        self.attempts += 1;
        self.dispatched_at = Some(now);
        self.leased_until = None;
        self.next_attempt_at = None;
        self.last_error = None;
        Ok(())
    }

    /// Failed delivery. The entry either waits until `retry_at` or, once `max_attempts`
    /// is exhausted, becomes `Failed`.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        retry_at: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<DispatchState, TransitionError> {
        if self.state != DispatchState::Dispatchable {
            return Err(TransitionError { from: self.state, to: DispatchState::Failed });
        }
        self.attempts += 1;
        self.last_error = Some(error.into());
        self.leased_until = None;
        if self.attempts >= max_attempts {
            self.state = DispatchState::Failed;
            self.next_attempt_at = None;
        } else {
            self.next_attempt_at = Some(retry_at);
        }
        Ok(self.state)
    }

    pub fn acknowledge(&mut self) -> Result<(), TransitionError> {
        self.transition(DispatchState::Dispatched, DispatchState::Acknowledged)
    }

    /// Re-arms a failed entry with a fresh attempt budget.
    pub fn rearm(&mut self) -> Result<(), TransitionError> {
        self.transition(DispatchState::Failed, DispatchState::Dispatchable)?;
        self.attempts = 0;
        self.next_attempt_at = None;
        Ok(())
    }

    fn transition(&mut self, from: DispatchState, to: DispatchState) -> Result<(), TransitionError> {
        if self.state != from {
            return Err(TransitionError { from: self.state, to });
        }
        self.state = to;
        Ok(())
    }
}
