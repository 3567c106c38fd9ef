use crate::context::TransactionContext;
use crate::mapper::{Aggregate, Mapper, ModelMeta};
use crate::{CqrsError, CqrsErrorExt};
use async_trait::async_trait;
use tally_domain::record::WriteRecord;
use tracing::{debug, instrument};

/// Write-side persistence for one aggregate, always inside a caller-owned transaction.
#[async_trait]
pub trait CommandRepository<M: Aggregate>: Send + Sync {
    /// Persists a new model at version 1 and returns its id.
    async fn save(&self, tx: &mut TransactionContext, model: &mut M) -> Result<String, CqrsError>;

    /// Conditional write at the model's current version. A concurrent writer surfaces as a
    /// `Conflict`; nothing is retried here. On success the model carries its new version.
    async fn update(&self, tx: &mut TransactionContext, model: &mut M) -> Result<(), CqrsError>;

    async fn delete(&self, tx: &mut TransactionContext, id: &str) -> Result<(), CqrsError>;

    async fn exists(&self, tx: &TransactionContext, id: &str) -> Result<bool, CqrsError>;

    /// `None` when absent; the caller decides whether that is a `NotFound`.
    async fn find_by_id(&self, tx: &TransactionContext, id: &str) -> Result<Option<M>, CqrsError>;
}

/// [`CommandRepository`] over the write table named by the aggregate.
#[derive(Debug, Clone, Default)]
pub struct TableCommandRepository<Mp> {
    mapper: Mp,
}

impl<Mp: Mapper> TableCommandRepository<Mp> {
    pub const fn new(mapper: Mp) -> Self {
        Self { mapper }
    }

    fn encode(&self, model: &Mp::Model) -> Result<WriteRecord<serde_json::Value>, CqrsError> {
        let record = self.mapper.to_write_record(model);
        let fields = serde_json::to_value(&record.fields).context(Mp::Model::TABLE)?;
        Ok(record.map_fields(|_| fields))
    }
}

fn refresh<F>(meta: &mut ModelMeta, row: &WriteRecord<F>) {
    meta.version = row.version;
    meta.created_at = row.created_at;
    meta.updated_at = row.updated_at;
}

#[async_trait]
impl<Mp: Mapper> CommandRepository<Mp::Model> for TableCommandRepository<Mp> {
    #[instrument(skip_all, fields(table = Mp::Model::TABLE, id = model.id()))]
    async fn save(&self, tx: &mut TransactionContext, model: &mut Mp::Model) -> Result<String, CqrsError> {
        let record = self.encode(model)?;
        let row = tx.session_mut()?.insert(Mp::Model::TABLE, &record.id, record.fields).context("save")?;
        refresh(model.meta_mut(), &row);
        debug!("Staged insert");
        Ok(row.id)
    }

    #[instrument(skip_all, fields(table = Mp::Model::TABLE, id = model.id(), version = model.meta().version))]
    async fn update(&self, tx: &mut TransactionContext, model: &mut Mp::Model) -> Result<(), CqrsError> {
        let record = self.encode(model)?;
        let row = tx
            .session_mut()?
            .update_if_version(Mp::Model::TABLE, &record.id, record.version, record.fields)
            .context("update")?;
        refresh(model.meta_mut(), &row);
        debug!(next = row.version, "Staged conditional update");
        Ok(())
    }

    #[instrument(skip(self, tx), fields(table = Mp::Model::TABLE))]
    async fn delete(&self, tx: &mut TransactionContext, id: &str) -> Result<(), CqrsError> {
        tx.session_mut()?.delete(Mp::Model::TABLE, id).context("delete")?;
        Ok(())
    }

    async fn exists(&self, tx: &TransactionContext, id: &str) -> Result<bool, CqrsError> {
        Ok(tx.session().exists(Mp::Model::TABLE, id))
    }

    async fn find_by_id(&self, tx: &TransactionContext, id: &str) -> Result<Option<Mp::Model>, CqrsError> {
        let Some(row) = tx.session().get(Mp::Model::TABLE, id) else {
            return Ok(None);
        };
        let WriteRecord { id, version, created_at, updated_at, fields } = row;
        let fields: Mp::Fields = serde_json::from_value(fields).context(Mp::Model::TABLE)?;
        let record = WriteRecord { id, version, created_at, updated_at, fields };
        Ok(Some(self.mapper.to_model_from_write_record(record)))
    }
}
