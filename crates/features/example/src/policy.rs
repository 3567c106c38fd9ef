use crate::model::ExampleModel;
use crate::records::ExampleFields;
use async_trait::async_trait;
use tally_cqrs::Aggregate;
use tally_database::Database;
use tally_domain::context::CallerId;
use tally_kernel::errors::ServiceError;
use tally_kernel::security::OwnershipPolicy;

/// Ownership answers for `example` ids, read from committed rows.
#[derive(Debug, Clone)]
pub struct ExampleOwnershipPolicy {
    db: Database,
}

impl ExampleOwnershipPolicy {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    fn fields(&self, resource_id: &str) -> Result<Option<ExampleFields>, ServiceError> {
        let Some(row) = self.db.get(ExampleModel::TABLE, resource_id) else {
            return Ok(None);
        };
        serde_json::from_value(row.fields)
            .map(Some)
            .map_err(|err| ServiceError::internal("Corrupt example row").with_source(err))
    }
}

#[async_trait]
impl OwnershipPolicy for ExampleOwnershipPolicy {
    async fn is_public(&self, resource_id: &str) -> Result<bool, ServiceError> {
        Ok(self.fields(resource_id)?.is_some_and(|fields| fields.is_public))
    }

    async fn owns(&self, caller: &CallerId, resource_id: &str) -> Result<bool, ServiceError> {
        Ok(self.fields(resource_id)?.is_some_and(|fields| fields.owner_id == caller.as_str()))
    }
}
