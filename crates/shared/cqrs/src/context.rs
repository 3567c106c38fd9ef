use crate::CqrsError;
use fxhash::FxHashSet;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tally_database::Transaction;
use tally_domain::context::{CorrelationId, RequestContext, RequestId};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

/// Requests that currently hold an open transaction.
pub(crate) type ActiveSet = Arc<Mutex<FxHashSet<RequestId>>>;

/// Marks a request as holding a transaction until dropped.
#[derive(Debug)]
pub(crate) struct ActiveSlot {
    active: ActiveSet,
    request_id: RequestId,
}

impl ActiveSlot {
    pub(crate) fn acquire(active: &ActiveSet, request_id: &RequestId) -> Result<Self, CqrsError> {
        if !active.lock().insert(request_id.clone()) {
            return Err(CqrsError::AlreadyActive {
                message: format!("request {request_id} already holds a transaction").into(),
                context: None,
            });
        }
        Ok(Self { active: active.clone(), request_id: request_id.clone() })
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.active.lock().remove(&self.request_id);
    }
}

/// One mutating request's transaction, passed explicitly to every repository and outbox call.
///
/// Dropping an open context discards everything staged under it.
#[derive(Debug)]
pub struct TransactionContext {
    id: String,
    request_id: RequestId,
    correlation_id: CorrelationId,
    state: TransactionState,
    deadline: Instant,
    session: Transaction,
    slot: Option<ActiveSlot>,
}

impl TransactionContext {
    pub(crate) fn open(
        ctx: &RequestContext,
        session: Transaction,
        max_duration: Duration,
        slot: ActiveSlot,
    ) -> Self {
        Self {
            id: session.id().to_owned(),
            request_id: ctx.request_id().clone(),
            correlation_id: ctx.correlation_id().clone(),
            state: TransactionState::Open,
            deadline: Instant::now() + max_duration,
            session,
            slot: Some(slot),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Stamped on every event enqueued under this transaction.
    #[must_use]
    pub const fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Open
    }

    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Read access to the storage session; reads see this transaction's staged writes.
    #[must_use]
    pub const fn session(&self) -> &Transaction {
        &self.session
    }

    /// Write access to the storage session. Fails once the transaction is finished or expired.
    pub fn session_mut(&mut self) -> Result<&mut Transaction, CqrsError> {
        if !self.is_open() {
            return Err(CqrsError::Closed {
                message: format!("transaction {} is {}", self.id, self.state).into(),
                context: None,
            });
        }
        if self.is_expired() {
            return Err(CqrsError::Timeout {
                message: format!("transaction {} passed its deadline", self.id).into(),
                context: None,
            });
        }
        Ok(&mut self.session)
    }

    pub(crate) fn raw_session(&mut self) -> &mut Transaction {
        &mut self.session
    }

    /// Moves to a final state and frees the request's slot.
    pub(crate) fn finish(&mut self, state: TransactionState) {
        self.state = state;
        self.slot = None;
    }
}
