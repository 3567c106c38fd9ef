use crate::dto::{
    CreateExampleRequest, ExamplePage, ExampleResponse, ListExamplesRequest, UpdateExampleRequest,
};
use crate::error::ExampleErrorCode;
use crate::events::{ExampleCreated, ExampleDeleted, ExampleStatusChanged, ExampleTopic, ExampleUpdated};
use crate::mapper::{ExampleMapper, NewExample};
use crate::model::ExampleModel;
use crate::records::{EXAMPLE_VIEW, ExampleProjection, NAME_TABLE, name_key};
use chrono::Utc;
use serde_json::json;
use tally_cqrs::repository::check_page;
use tally_cqrs::{
    Aggregate, CommandRepository, CqrsError, CqrsErrorExt, EventOutbox, Mapper, QueryRepository,
    TableCommandRepository, TransactionContext, ViewQueryRepository,
};
use tally_database::{Database, DatabaseError};
use tally_domain::context::CallerId;
use tally_domain::error::{Classify, ErrorKind};
use tally_kernel::errors::ServiceError;
use tally_kernel::security::ResourceGuard;
use tracing::{info, instrument};

/// Business operations of the example slice.
///
/// Mutations take the caller's [`TransactionContext`] and stage their writes and events in it;
/// nothing is visible until the pipeline commits. Reads go to the projection view.
#[derive(Debug, Clone)]
pub struct ExampleService {
    commands: TableCommandRepository<ExampleMapper>,
    queries: ViewQueryRepository<ExampleProjection>,
    outbox: EventOutbox,
    mapper: ExampleMapper,
}

fn normalize(id: &str) -> Result<String, ServiceError> {
    ResourceGuard::verify(id, ExampleModel::TABLE).map_err(ServiceError::from_classified)
}

/// Maps storage outcomes on one example to the slice's own codes.
fn storage(err: CqrsError, id: &str) -> ServiceError {
    match err.kind() {
        ErrorKind::Conflict => ServiceError::from_code(ExampleErrorCode::Conflict, json!({ "id": id }))
            .with_source(err),
        ErrorKind::NotFound => ServiceError::from_code(ExampleErrorCode::NotFound, json!({ "id": id })),
        _ => err.into(),
    }
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::from_code(ExampleErrorCode::NotFound, json!({ "id": id }))
}

impl ExampleService {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            commands: TableCommandRepository::new(ExampleMapper),
            queries: ViewQueryRepository::new(db.clone(), EXAMPLE_VIEW),
            outbox: EventOutbox::new(db),
            mapper: ExampleMapper,
        }
    }

    #[instrument(skip_all, fields(owner = %caller))]
    pub async fn create(
        &self,
        tx: &mut TransactionContext,
        caller: &CallerId,
        request: CreateExampleRequest,
    ) -> Result<ExampleResponse, ServiceError> {
        let mut model =
            self.mapper.to_model_from_request(NewExample { owner_id: caller.as_str().to_owned(), request });
        model.validate()?;

        self.claim_name(tx, model.owner_id(), model.name(), model.id())?;
        let id = self.commands.save(tx, &mut model).await.map_err(|err| storage(err, model.id()))?;

        let event = ExampleCreated {
            example_id: id.clone(),
            owner_id: model.owner_id().to_owned(),
            name: model.name().to_owned(),
        };
        self.outbox.enqueue(tx, ExampleTopic::Created.topic()?, event)?;

        info!(id, "Example created");
        Ok(self.mapper.to_response_from_model(&model))
    }

    #[instrument(skip(self, tx, request), fields(caller = %caller))]
    pub async fn update(
        &self,
        tx: &mut TransactionContext,
        caller: &CallerId,
        id: &str,
        request: UpdateExampleRequest,
    ) -> Result<ExampleResponse, ServiceError> {
        let mut model = self.load(tx, id).await?;
        model.validate_ownership(caller.as_str())?;

        let previous = name_key(model.owner_id(), model.name());
        self.mapper.update_model_from_request(&mut model, request)?;
        if name_key(model.owner_id(), model.name()) != previous {
            self.release_name(tx, &previous)?;
            self.claim_name(tx, model.owner_id(), model.name(), model.id())?;
        }

        self.commands.update(tx, &mut model).await.map_err(|err| storage(err, model.id()))?;

        let event = ExampleUpdated {
            example_id: model.id().to_owned(),
            version: model.meta().version,
            name: model.name().to_owned(),
        };
        self.outbox.enqueue(tx, ExampleTopic::Updated.topic()?, event)?;
        Ok(self.mapper.to_response_from_model(&model))
    }

    #[instrument(skip(self, tx), fields(caller = %caller))]
    pub async fn delete(
        &self,
        tx: &mut TransactionContext,
        caller: &CallerId,
        id: &str,
    ) -> Result<(), ServiceError> {
        let model = self.load(tx, id).await?;
        model.validate_ownership(caller.as_str())?;

        self.commands.delete(tx, model.id()).await.map_err(|err| storage(err, model.id()))?;
        self.release_name(tx, &name_key(model.owner_id(), model.name()))?;

        let event = ExampleDeleted { example_id: model.id().to_owned(), owner_id: model.owner_id().to_owned() };
        self.outbox.enqueue(tx, ExampleTopic::Deleted.topic()?, event)?;
        info!(id = model.id(), "Example deleted");
        Ok(())
    }

    pub async fn activate(
        &self,
        tx: &mut TransactionContext,
        caller: &CallerId,
        id: &str,
    ) -> Result<ExampleResponse, ServiceError> {
        self.set_active(tx, caller, id, true).await
    }

    pub async fn deactivate(
        &self,
        tx: &mut TransactionContext,
        caller: &CallerId,
        id: &str,
    ) -> Result<ExampleResponse, ServiceError> {
        self.set_active(tx, caller, id, false).await
    }

    /// Switching to the current state is a no-op: no write and no event.
    #[instrument(skip(self, tx), fields(caller = %caller))]
    pub async fn set_active(
        &self,
        tx: &mut TransactionContext,
        caller: &CallerId,
        id: &str,
        active: bool,
    ) -> Result<ExampleResponse, ServiceError> {
        let mut model = self.load(tx, id).await?;
        model.validate_ownership(caller.as_str())?;
        if model.is_active() == active {
            return Ok(self.mapper.to_response_from_model(&model));
        }

        let topic = if active {
            model.activate(Utc::now());
            ExampleTopic::Activated
        } else {
            model.deactivate(Utc::now());
            ExampleTopic::Deactivated
        };
        self.commands.update(tx, &mut model).await.map_err(|err| storage(err, model.id()))?;

        let event = ExampleStatusChanged {
            example_id: model.id().to_owned(),
            version: model.meta().version,
            is_active: active,
        };
        self.outbox.enqueue(tx, topic.topic()?, event)?;
        Ok(self.mapper.to_response_from_model(&model))
    }

    /// Reads the projection; it trails committed writes until the relay has caught up.
    pub async fn get(&self, id: &str) -> Result<ExampleResponse, ServiceError> {
        let id = normalize(id)?;
        let projection = self.queries.find_by_id(&id).await?.ok_or_else(|| not_found(&id))?;
        Ok(self.mapper.to_response_from_projection(projection))
    }

    /// Public examples plus the caller's own, in id order.
    #[instrument(skip(self, request), fields(page = request.page, page_size = request.page_size))]
    pub async fn list(
        &self,
        caller: Option<&CallerId>,
        request: &ListExamplesRequest,
    ) -> Result<ExamplePage, ServiceError> {
        check_page(request.page, request.page_size)?;

        let caller = caller.map(CallerId::as_str);
        let visible = |p: &ExampleProjection| {
            (p.is_public || caller == Some(p.owner_id.as_str()))
                && (!request.active_only || p.is_active)
                && request.owner_id.as_deref().is_none_or(|owner| owner == p.owner_id)
        };

        let total = self.queries.count_by_filter(&visible).await?;
        let items = self
            .queries
            .list_by_filter(&visible, request.page, request.page_size)
            .await?
            .into_iter()
            .map(|projection| self.mapper.to_response_from_projection(projection))
            .collect();

        Ok(ExamplePage { items, page: request.page, page_size: request.page_size, total })
    }

    async fn load(&self, tx: &TransactionContext, id: &str) -> Result<ExampleModel, ServiceError> {
        let id = normalize(id)?;
        self.commands
            .find_by_id(tx, &id)
            .await
            .map_err(|err| storage(err, &id))?
            .ok_or_else(|| not_found(&id))
    }

    /// Reserves `name` for `owner_id` inside `tx`, so the reservation commits or rolls back with
    /// the example itself.
    fn claim_name(
        &self,
        tx: &mut TransactionContext,
        owner_id: &str,
        name: &str,
        example_id: &str,
    ) -> Result<(), ServiceError> {
        let key = name_key(owner_id, name);
        let taken = || ServiceError::from_code(ExampleErrorCode::AlreadyExists, json!({ "name": name }));
        if tx.session().exists(NAME_TABLE, &key) {
            return Err(taken());
        }

        match tx.session_mut()?.insert(NAME_TABLE, &key, json!({ "exampleId": example_id })) {
            Ok(_) => Ok(()),
            Err(DatabaseError::AlreadyExists { .. }) => Err(taken()),
            Err(err) => Err(storage(CqrsError::from(err), example_id)),
        }
    }

    fn release_name(&self, tx: &mut TransactionContext, key: &str) -> Result<(), ServiceError> {
        if !tx.session().exists(NAME_TABLE, key) {
            return Ok(());
        }
        tx.session_mut()?.delete(NAME_TABLE, key).context("release name").map_err(|err| storage(err, key))
    }
}
