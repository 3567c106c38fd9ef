use super::operation::{Anonymous, Authenticator};
use super::{Pipeline, PipelineInner};
use crate::UnitOfWork;
use private::Sealed;
use std::sync::Arc;
use std::time::Duration;
use tally_domain::config::{ErrorConfig, TransactionConfig};
use tally_kernel::errors::ErrorTranslator;
use tally_kernel::security::OwnershipGuard;

#[derive(Debug)]
pub struct NoUnitOfWork;
pub struct WithUnitOfWork(Arc<dyn UnitOfWork>);

impl std::fmt::Debug for WithUnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WithUnitOfWork")
    }
}

mod private {
    pub trait Sealed {}
}
impl Sealed for NoUnitOfWork {}
impl Sealed for WithUnitOfWork {}

/// Typed builder for [`Pipeline`]; [`PipelineBuilder::build`] exists once a unit of work is set.
pub struct PipelineBuilder<U: Sealed = NoUnitOfWork> {
    unit_of_work: U,
    authenticator: Arc<dyn Authenticator>,
    guard: OwnershipGuard,
    translator: ErrorTranslator,
    max_duration: Duration,
}

impl<U: Sealed> std::fmt::Debug for PipelineBuilder<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("guard", &self.guard)
            .field("translator", &self.translator)
            .field("max_duration", &self.max_duration)
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    pub(crate) fn new() -> Self {
        Self {
            unit_of_work: NoUnitOfWork,
            authenticator: Arc::new(Anonymous),
            guard: OwnershipGuard::default(),
            translator: ErrorTranslator::default(),
            max_duration: TransactionConfig::default().max_duration(),
        }
    }

    pub fn unit_of_work(self, unit_of_work: Arc<dyn UnitOfWork>) -> PipelineBuilder<WithUnitOfWork> {
        PipelineBuilder {
            unit_of_work: WithUnitOfWork(unit_of_work),
            authenticator: self.authenticator,
            guard: self.guard,
            translator: self.translator,
            max_duration: self.max_duration,
        }
    }
}

impl<U: Sealed> PipelineBuilder<U> {
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    #[must_use]
    pub fn guard(mut self, guard: OwnershipGuard) -> Self {
        self.guard = guard;
        self
    }

    #[must_use]
    pub fn errors(mut self, config: &ErrorConfig) -> Self {
        self.translator = ErrorTranslator::new(config.expose_internal);
        self
    }

    /// Upper bound for one operation, including the time spent inside its transaction.
    #[must_use]
    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }
}

impl PipelineBuilder<WithUnitOfWork> {
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            inner: Arc::new(PipelineInner {
                unit_of_work: self.unit_of_work.0,
                authenticator: self.authenticator,
                guard: self.guard,
                translator: self.translator,
                max_duration: self.max_duration,
            }),
        }
    }
}
