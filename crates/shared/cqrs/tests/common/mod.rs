#![allow(dead_code, unreachable_pub)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tally_cqrs::*;
use tally_database::Database;
use tally_domain::config::TransactionConfig;
use tally_domain::context::{CallerId, RequestContext};
use tally_domain::event::Topic;
use tally_domain::record::WriteRecord;
use tally_kernel::errors::ServiceError;
use tally_kernel::security::{OwnershipGuard, OwnershipPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub meta: ModelMeta,
    pub owner: String,
    pub text: String,
}

impl Aggregate for Note {
    const TABLE: &'static str = "note";
    const NAME: &'static str = "Note";

    fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ModelMeta {
        &mut self.meta
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteFields {
    pub owner: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteView {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoteMapper;

impl Mapper for NoteMapper {
    type Request = (String, String);
    type Model = Note;
    type Fields = NoteFields;
    type Projection = NoteView;
    type Response = String;

    fn to_model_from_request(&self, (owner, text): Self::Request) -> Note {
        Note { meta: ModelMeta::new(Note::TABLE, chrono::Utc::now()), owner, text }
    }

    fn to_write_record(&self, model: &Note) -> WriteRecord<NoteFields> {
        model.meta.record(NoteFields { owner: model.owner.clone(), text: model.text.clone() })
    }

    fn to_model_from_write_record(&self, record: WriteRecord<NoteFields>) -> Note {
        let meta = ModelMeta::from_record(&record);
        Note { meta, owner: record.fields.owner, text: record.fields.text }
    }

    fn to_response_from_projection(&self, projection: NoteView) -> String {
        projection.text
    }

    fn to_response_from_model(&self, model: &Note) -> String {
        model.text.clone()
    }
}

/// Owner lookups straight from the committed write table.
#[derive(Debug, Clone)]
pub struct NotePolicy(pub Database);

#[async_trait]
impl OwnershipPolicy for NotePolicy {
    async fn is_public(&self, _resource_id: &str) -> Result<bool, ServiceError> {
        Ok(false)
    }

    async fn owns(&self, caller: &CallerId, resource_id: &str) -> Result<bool, ServiceError> {
        Ok(self
            .0
            .get(Note::TABLE, resource_id)
            .is_some_and(|row| row.fields["owner"] == caller.as_str()))
    }
}

pub struct Harness {
    pub db: Database,
    pub uow: Arc<DatabaseUnitOfWork>,
    pub repo: TableCommandRepository<NoteMapper>,
    pub outbox: EventOutbox,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_unit_of_work(|uow| uow as Arc<dyn UnitOfWork>)
    }

    pub fn with_unit_of_work(wrap: impl FnOnce(Arc<DatabaseUnitOfWork>) -> Arc<dyn UnitOfWork>) -> Self {
        let db = Database::builder().init().unwrap();
        let uow = Arc::new(DatabaseUnitOfWork::new(db.clone(), &TransactionConfig::default()));
        let guard = OwnershipGuard::builder().policy(Note::TABLE, Arc::new(NotePolicy(db.clone()))).build();
        let pipeline = Pipeline::builder()
            .unit_of_work(wrap(uow.clone()))
            .authenticator(Arc::new(pipeline::HeaderAuthenticator::default()))
            .guard(guard)
            .max_duration(Duration::from_secs(5))
            .build();

        Self {
            outbox: EventOutbox::new(db.clone()),
            repo: TableCommandRepository::new(NoteMapper),
            db,
            uow,
            pipeline,
        }
    }

    pub fn as_caller(path: &str, caller: &str) -> Inbound {
        Inbound::new(path).header("X-Caller-ID", caller)
    }

    /// Commits a note owned by `owner` outside the pipeline.
    pub async fn seed(&self, owner: &str, text: &str) -> Note {
        let ctx = RequestContext::new(
            tally_domain::RequestId::new(tally_kernel::record_id("seed")),
            tally_domain::CorrelationId::new("seed"),
            "/seed",
            true,
        );
        let mut tx = self.uow.begin(&ctx).await.unwrap();
        let mut note = NoteMapper.to_model_from_request((owner.to_owned(), text.to_owned()));
        self.repo.save(&mut tx, &mut note).await.unwrap();
        self.uow.commit(&mut tx).await.unwrap();
        note
    }
}

pub fn topic(raw: &str) -> Topic {
    Topic::new(raw).unwrap()
}

/// Creates a note for the caller and emits `note.created`, optionally failing afterwards.
pub struct CreateNote {
    pub repo: TableCommandRepository<NoteMapper>,
    pub outbox: EventOutbox,
    pub text: String,
    pub fail_with: Option<fn() -> ServiceError>,
    pub delay: Option<Duration>,
}

impl CreateNote {
    pub fn new(h: &Harness, text: &str) -> Self {
        Self { repo: h.repo.clone(), outbox: h.outbox.clone(), text: text.to_owned(), fail_with: None, delay: None }
    }
}

#[async_trait]
impl MutatingOperation for CreateNote {
    type Output = String;

    fn resource_type(&self) -> &'static str {
        Note::TABLE
    }

    fn resource_id(&self) -> Option<&str> {
        None
    }

    fn success_status(&self) -> u16 {
        201
    }

    async fn execute(&self, ctx: &RequestContext, tx: &mut TransactionContext) -> Result<String, ServiceError> {
        let owner = ctx.caller().map(|c| c.as_str().to_owned()).unwrap_or_default();
        let mut note = NoteMapper.to_model_from_request((owner, self.text.clone()));
        let id = self.repo.save(tx, &mut note).await?;
        self.outbox.enqueue(tx, topic("note.created"), json!({ "id": id }))?;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        Ok(id)
    }
}

/// Rewrites a note's text at the version it was loaded at.
pub struct EditNote {
    pub repo: TableCommandRepository<NoteMapper>,
    pub outbox: EventOutbox,
    pub id: String,
    pub text: String,
}

#[async_trait]
impl MutatingOperation for EditNote {
    type Output = u64;

    fn resource_type(&self) -> &'static str {
        Note::TABLE
    }

    fn resource_id(&self) -> Option<&str> {
        Some(&self.id)
    }

    async fn execute(&self, _ctx: &RequestContext, tx: &mut TransactionContext) -> Result<u64, ServiceError> {
        let mut note = self
            .repo
            .find_by_id(tx, &self.id)
            .await?
            .ok_or_else(|| ServiceError::not_found(Note::NAME, &self.id))?;
        note.text.clone_from(&self.text);
        self.repo.update(tx, &mut note).await?;
        self.outbox.enqueue(tx, topic("note.updated"), json!({ "id": self.id }))?;
        Ok(note.meta.version)
    }
}
