use crate::context::{ActiveSet, ActiveSlot, TransactionContext, TransactionState};
use crate::{CqrsError, CqrsErrorExt};
use async_trait::async_trait;
use std::time::Duration;
use tally_database::Database;
use tally_domain::config::TransactionConfig;
use tally_domain::context::RequestContext;
use tracing::{debug, instrument, trace, warn};

/// Owns the transaction lifecycle of one mutating request.
///
/// The unit of work never inspects the business outcome; the pipeline tells it whether to
/// commit or roll back.
#[async_trait]
pub trait UnitOfWork: Send + Sync + 'static {
    /// Opens a transaction for `ctx`. Fails with [`CqrsError::AlreadyActive`] while the same
    /// request still holds one; nested work must reuse the parent context.
    async fn begin(&self, ctx: &RequestContext) -> Result<TransactionContext, CqrsError>;

    /// Flushes staged writes and marks staged outbox entries dispatchable in one atomic step.
    /// On failure nothing is applied and the context ends rolled back.
    async fn commit(&self, tx: &mut TransactionContext) -> Result<(), CqrsError>;

    /// Discards staged writes and outbox entries. Calling it on a finished context is a no-op.
    async fn rollback(&self, tx: &mut TransactionContext) -> Result<(), CqrsError>;
}

/// [`UnitOfWork`] over the in-process [`Database`].
#[derive(Debug, Clone)]
pub struct DatabaseUnitOfWork {
    db: Database,
    active: ActiveSet,
    max_duration: Duration,
}

impl DatabaseUnitOfWork {
    #[must_use]
    pub fn new(db: Database, config: &TransactionConfig) -> Self {
        Self { db, active: ActiveSet::default(), max_duration: config.max_duration() }
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    /// Number of requests currently holding an open transaction.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.lock().len()
    }
}

#[async_trait]
impl UnitOfWork for DatabaseUnitOfWork {
    #[instrument(skip_all, fields(request_id = %ctx.request_id()))]
    async fn begin(&self, ctx: &RequestContext) -> Result<TransactionContext, CqrsError> {
        let slot = ActiveSlot::acquire(&self.active, ctx.request_id())?;
        let session = self.db.begin(tally_kernel::record_id("tx"));
        debug!(tx = session.id(), "Transaction opened");
        Ok(TransactionContext::open(ctx, session, self.max_duration, slot))
    }

    #[instrument(skip_all, fields(tx = tx.id()))]
    async fn commit(&self, tx: &mut TransactionContext) -> Result<(), CqrsError> {
        if !tx.is_open() {
            return Err(CqrsError::Closed {
                message: format!("cannot commit a {} transaction", tx.state()).into(),
                context: None,
            });
        }

        if tx.is_expired() {
            tx.raw_session().rollback();
            tx.finish(TransactionState::RolledBack);
            warn!("Transaction expired before commit, rolled back");
            return Err(CqrsError::Timeout {
                message: format!("transaction exceeded {}ms", self.max_duration.as_millis()).into(),
                context: None,
            });
        }

        let result = tx.raw_session().commit();
        match result {
            Ok(()) => {
                tx.finish(TransactionState::Committed);
                Ok(())
            },
            Err(err) => {
                tx.finish(TransactionState::RolledBack);
                Err(err).context("commit")
            },
        }
    }

    #[instrument(skip_all, fields(tx = tx.id()))]
    async fn rollback(&self, tx: &mut TransactionContext) -> Result<(), CqrsError> {
        if !tx.is_open() {
            trace!(state = %tx.state(), "Rollback on finished transaction ignored");
            return Ok(());
        }
        tx.raw_session().rollback();
        tx.finish(TransactionState::RolledBack);
        Ok(())
    }
}
