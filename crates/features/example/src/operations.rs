//! Pipeline operations of the example slice, one per endpoint.

use crate::dto::{
    CreateExampleRequest, ExamplePage, ExampleResponse, ListExamplesRequest, UpdateExampleRequest,
};
use crate::model::ExampleModel;
use crate::service::ExampleService;
use async_trait::async_trait;
use tally_cqrs::{Aggregate, MutatingOperation, QueryOperation, TransactionContext};
use tally_domain::context::{CallerId, RequestContext};
use tally_kernel::errors::ServiceError;

fn caller(ctx: &RequestContext) -> Result<&CallerId, ServiceError> {
    ctx.caller().ok_or_else(|| ServiceError::unauthorized("Authentication required"))
}

#[derive(Debug, Clone)]
pub struct CreateExample {
    pub(crate) service: ExampleService,
    pub request: CreateExampleRequest,
}

#[async_trait]
impl MutatingOperation for CreateExample {
    type Output = ExampleResponse;

    fn resource_type(&self) -> &'static str {
        ExampleModel::TABLE
    }

    fn resource_id(&self) -> Option<&str> {
        None
    }

    fn success_status(&self) -> u16 {
        201
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        tx: &mut TransactionContext,
    ) -> Result<ExampleResponse, ServiceError> {
        self.service.create(tx, caller(ctx)?, self.request.clone()).await
    }
}

#[derive(Debug, Clone)]
pub struct UpdateExample {
    pub(crate) service: ExampleService,
    pub id: String,
    pub request: UpdateExampleRequest,
}

#[async_trait]
impl MutatingOperation for UpdateExample {
    type Output = ExampleResponse;

    fn resource_type(&self) -> &'static str {
        ExampleModel::TABLE
    }

    fn resource_id(&self) -> Option<&str> {
        Some(&self.id)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        tx: &mut TransactionContext,
    ) -> Result<ExampleResponse, ServiceError> {
        self.service.update(tx, caller(ctx)?, &self.id, self.request.clone()).await
    }
}

#[derive(Debug, Clone)]
pub struct DeleteExample {
    pub(crate) service: ExampleService,
    pub id: String,
}

#[async_trait]
impl MutatingOperation for DeleteExample {
    type Output = ();

    fn resource_type(&self) -> &'static str {
        ExampleModel::TABLE
    }

    fn resource_id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn success_status(&self) -> u16 {
        204
    }

    async fn execute(&self, ctx: &RequestContext, tx: &mut TransactionContext) -> Result<(), ServiceError> {
        self.service.delete(tx, caller(ctx)?, &self.id).await
    }
}

/// Activates or deactivates one example.
#[derive(Debug, Clone)]
pub struct SetExampleActive {
    pub(crate) service: ExampleService,
    pub id: String,
    pub active: bool,
}

#[async_trait]
impl MutatingOperation for SetExampleActive {
    type Output = ExampleResponse;

    fn resource_type(&self) -> &'static str {
        ExampleModel::TABLE
    }

    fn resource_id(&self) -> Option<&str> {
        Some(&self.id)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        tx: &mut TransactionContext,
    ) -> Result<ExampleResponse, ServiceError> {
        let caller = caller(ctx)?;
        if self.active {
            self.service.activate(tx, caller, &self.id).await
        } else {
            self.service.deactivate(tx, caller, &self.id).await
        }
    }
}

#[derive(Debug, Clone)]
pub struct GetExample {
    pub(crate) service: ExampleService,
    pub id: String,
}

#[async_trait]
impl QueryOperation for GetExample {
    type Output = ExampleResponse;

    fn resource_type(&self) -> &'static str {
        ExampleModel::TABLE
    }

    fn resource_id(&self) -> Option<&str> {
        Some(&self.id)
    }

    async fn execute(&self, _ctx: &RequestContext) -> Result<ExampleResponse, ServiceError> {
        self.service.get(&self.id).await
    }
}

#[derive(Debug, Clone)]
pub struct ListExamples {
    pub(crate) service: ExampleService,
    pub request: ListExamplesRequest,
}

#[async_trait]
impl QueryOperation for ListExamples {
    type Output = ExamplePage;

    fn resource_type(&self) -> &'static str {
        ExampleModel::TABLE
    }

    async fn execute(&self, ctx: &RequestContext) -> Result<ExamplePage, ServiceError> {
        self.service.list(ctx.caller(), &self.request).await
    }
}
