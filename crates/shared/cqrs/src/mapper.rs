use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tally_domain::record::WriteRecord;

/// Identity and persistence metadata every business model carries.
///
/// `version` is 0 until the model has been saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMeta {
    pub id: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelMeta {
    /// Metadata for a model that has not been persisted yet, with a fresh `table:key` id.
    #[must_use]
    pub fn new(table: &str, now: DateTime<Utc>) -> Self {
        Self { id: tally_kernel::record_id(table), version: 0, created_at: now, updated_at: now }
    }

    #[must_use]
    pub fn from_record<F>(record: &WriteRecord<F>) -> Self {
        Self {
            id: record.id.clone(),
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.version > 0
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Wraps `fields` in a write record carrying this metadata.
    #[must_use]
    pub fn record<F>(&self, fields: F) -> WriteRecord<F> {
        WriteRecord {
            id: self.id.clone(),
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            fields,
        }
    }
}

/// An in-memory business model stored in one write table.
pub trait Aggregate: Send + Sync + 'static {
    /// Write table, also the id prefix.
    const TABLE: &'static str;
    /// Human name used in error messages.
    const NAME: &'static str;

    fn meta(&self) -> &ModelMeta;

    fn meta_mut(&mut self) -> &mut ModelMeta;

    fn id(&self) -> &str {
        &self.meta().id
    }
}

/// Explicit transforms between the transport, business, write and read shapes of one aggregate.
///
/// Implementations are pure: no I/O and no validation. Validation belongs to the model.
pub trait Mapper: Send + Sync + 'static {
    type Request;
    type Model: Aggregate;
    type Fields: Serialize + DeserializeOwned + Send + Sync;
    type Projection: DeserializeOwned + Send;
    type Response;

    fn to_model_from_request(&self, request: Self::Request) -> Self::Model;

    fn to_write_record(&self, model: &Self::Model) -> WriteRecord<Self::Fields>;

    fn to_model_from_write_record(&self, record: WriteRecord<Self::Fields>) -> Self::Model;

    fn to_response_from_projection(&self, projection: Self::Projection) -> Self::Response;

    fn to_response_from_model(&self, model: &Self::Model) -> Self::Response;
}
