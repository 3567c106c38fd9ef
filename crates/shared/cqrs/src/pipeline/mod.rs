//! The ordered, short-circuiting request chain.
//!
//! Mutations run `Correlate → Authenticate → Authorize → Begin → Execute → Commit`, falling
//! back to `Rollback` on any error after `Begin`. Queries skip the transaction stages. Every
//! failure ends in `Translate`, which produces the stable error body.
//!
//! A denied request stops at `Authorize`, so no transaction is ever opened for it.

mod builder;
mod operation;
mod stage;

pub use builder::{NoUnitOfWork, PipelineBuilder, WithUnitOfWork};
pub use operation::{Anonymous, Authenticator, HeaderAuthenticator, Inbound, MutatingOperation, QueryOperation};
pub use stage::{PipelineResponse, Stage};

use crate::context::TransactionContext;
use crate::UnitOfWork;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tally_domain::constants::CORRELATION_HEADER;
use tally_domain::context::{CorrelationId, RequestContext, RequestId};
use tally_kernel::errors::{ErrorTranslator, ServiceError};
use tally_kernel::security::{Decision, OwnershipGuard};
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info_span};

pub(crate) struct PipelineInner {
    unit_of_work: Arc<dyn UnitOfWork>,
    authenticator: Arc<dyn Authenticator>,
    guard: OwnershipGuard,
    translator: ErrorTranslator,
    max_duration: Duration,
}

/// Composes correlation, authentication, ownership, the unit of work and error translation
/// around business operations.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("guard", &self.inner.guard)
            .field("translator", &self.inner.translator)
            .field("max_duration", &self.inner.max_duration)
            .finish_non_exhaustive()
    }
}

/// Uses the inbound correlation header when present and non-blank, otherwise generates one.
#[must_use]
pub fn correlate(inbound: &Inbound) -> CorrelationId {
    inbound
        .header_value(CORRELATION_HEADER)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| CorrelationId::new(tally_kernel::safe_nanoid!(21)), CorrelationId::new)
}

impl Pipeline {
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs a state-changing operation inside one transaction.
    pub async fn mutate<O: MutatingOperation>(
        &self,
        inbound: &Inbound,
        operation: &O,
    ) -> PipelineResponse<O::Output> {
        let mut stages = vec![Stage::Correlate];
        let ctx = self.context(inbound, true);
        let span = request_span(&ctx);

        async {
            let result = self.run_mutation(ctx.clone(), inbound, operation, &mut stages).await;
            self.respond(&ctx, result, operation.success_status(), stages)
        }
        .instrument(span)
        .await
    }

    /// Runs a read-only operation. No transaction is opened.
    pub async fn query<O: QueryOperation>(
        &self,
        inbound: &Inbound,
        operation: &O,
    ) -> PipelineResponse<O::Output> {
        let mut stages = vec![Stage::Correlate];
        let ctx = self.context(inbound, false);
        let span = request_span(&ctx);

        async {
            let result = self.run_query(ctx.clone(), inbound, operation, &mut stages).await;
            self.respond(&ctx, result, 200, stages)
        }
        .instrument(span)
        .await
    }

    fn context(&self, inbound: &Inbound, mutating: bool) -> RequestContext {
        let request_id = RequestId::new(tally_kernel::safe_nanoid!());
        RequestContext::new(request_id, correlate(inbound), inbound.path(), mutating)
    }

    async fn run_mutation<O: MutatingOperation>(
        &self,
        ctx: RequestContext,
        inbound: &Inbound,
        operation: &O,
        stages: &mut Vec<Stage>,
    ) -> Result<O::Output, ServiceError> {
        stages.push(Stage::Authenticate);
        let ctx = self.authenticate(ctx, inbound).await?;
        if ctx.caller().is_none() {
            return Err(ServiceError::unauthorized("Authentication required"));
        }

        stages.push(Stage::Authorize);
        self.authorize(&ctx, operation.resource_type(), operation.resource_id()).await?;

        stages.push(Stage::Begin);
        let mut tx = self.inner.unit_of_work.begin(&ctx).await?;

        stages.push(Stage::Execute);
        let deadline = tx.deadline().min(Instant::now() + self.inner.max_duration);
        let outcome = match tokio::time::timeout_at(deadline, operation.execute(&ctx, &mut tx)).await {
            Ok(result) => result,
            Err(_) => Err(self.timed_out()),
        };

        match outcome {
            Ok(output) => {
                stages.push(Stage::Commit);
                match self.inner.unit_of_work.commit(&mut tx).await {
                    Ok(()) => Ok(output),
                    Err(err) => {
                        stages.push(Stage::Rollback);
                        self.rollback(&mut tx).await?;
                        Err(err.into())
                    },
                }
            },
            Err(err) => {
                debug!(error = %err, "Operation failed, rolling back");
                stages.push(Stage::Rollback);
                self.rollback(&mut tx).await?;
                Err(err)
            },
        }
    }

    async fn run_query<O: QueryOperation>(
        &self,
        ctx: RequestContext,
        inbound: &Inbound,
        operation: &O,
        stages: &mut Vec<Stage>,
    ) -> Result<O::Output, ServiceError> {
        stages.push(Stage::Authenticate);
        let ctx = self.authenticate(ctx, inbound).await?;

        stages.push(Stage::Authorize);
        self.authorize(&ctx, operation.resource_type(), operation.resource_id()).await?;

        stages.push(Stage::Execute);
        tokio::time::timeout(self.inner.max_duration, operation.execute(&ctx))
            .await
            .unwrap_or_else(|_| Err(self.timed_out()))
    }

    async fn authenticate(
        &self,
        ctx: RequestContext,
        inbound: &Inbound,
    ) -> Result<RequestContext, ServiceError> {
        Ok(match self.inner.authenticator.authenticate(inbound).await? {
            Some(caller) => ctx.with_caller(caller),
            None => ctx,
        })
    }

    async fn authorize(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        resource_id: Option<&str>,
    ) -> Result<(), ServiceError> {
        match self.inner.guard.authorize(ctx.caller(), resource_id, resource_type).await? {
            Decision::Allow => Ok(()),
            Decision::Deny { reason } => {
                let mut err = ServiceError::forbidden(format!("Access to {resource_type} denied"))
                    .with_detail("reason", reason);
                if let Some(id) = resource_id {
                    err = err.with_detail("id", id);
                }
                Err(err)
            },
        }
    }

    /// A rollback that fails leaves the transaction guarantee broken; the request ends with a
    /// 500 and an alert.
    async fn rollback(&self, tx: &mut TransactionContext) -> Result<(), ServiceError> {
        self.inner.unit_of_work.rollback(tx).await.map_err(|err| {
            error!(alert = true, tx = tx.id(), error = %err, "Rollback failed, transaction guarantee violated");
            ServiceError::internal("Rollback failed").with_source(err)
        })
    }

    fn timed_out(&self) -> ServiceError {
        ServiceError::internal(format!(
            "Operation exceeded the maximum duration of {}ms",
            self.inner.max_duration.as_millis()
        ))
    }

    fn respond<T>(
        &self,
        ctx: &RequestContext,
        result: Result<T, ServiceError>,
        success_status: u16,
        mut stages: Vec<Stage>,
    ) -> PipelineResponse<T> {
        let (status, body) = match result {
            Ok(output) => (success_status, Ok(output)),
            Err(err) => {
                stages.push(Stage::Translate);
                let response = self.inner.translator.translate(&err, ctx.path(), ctx.request_id().as_str());
                (response.status, Err(response))
            },
        };
        debug!(status, "Request finished");

        PipelineResponse {
            status,
            request_id: ctx.request_id().clone(),
            correlation_id: ctx.correlation_id().clone(),
            body,
            stages,
        }
    }
}

fn request_span(ctx: &RequestContext) -> tracing::Span {
    info_span!(
        "request",
        request_id = %ctx.request_id(),
        correlation_id = %ctx.correlation_id(),
        path = ctx.path(),
        mutating = ctx.is_mutating(),
    )
}
