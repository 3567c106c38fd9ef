use crate::constants::INITIAL_VERSION;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted write-model row.
///
/// `version` starts at 1 and is bumped by the store on every successful conditional update.
/// An update must carry the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRecord<F> {
    pub id: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fields: F,
}

impl<F> WriteRecord<F> {
    /// A record that has never been stored.
    #[must_use]
    pub fn fresh(id: impl Into<String>, fields: F, now: DateTime<Utc>) -> Self {
        Self { id: id.into(), version: INITIAL_VERSION, created_at: now, updated_at: now, fields }
    }

    /// The record as it will look after a successful update at `now`.
    #[must_use]
    pub fn bumped(mut self, now: DateTime<Utc>) -> Self {
        self.version += 1;
        self.updated_at = now;
        self
    }

    pub fn map_fields<G>(self, f: impl FnOnce(F) -> G) -> WriteRecord<G> {
        WriteRecord {
            id: self.id,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            fields: f(self.fields),
        }
    }
}
