use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read view holding one [`ExampleProjection`] per example.
pub const EXAMPLE_VIEW: &str = "example_view";

/// Write table reserving `(owner, lowercased name)` pairs.
pub(crate) const NAME_TABLE: &str = "example_name";

/// Columns of an `example` write row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleFields {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: String,
    pub is_active: bool,
    pub is_public: bool,
}

/// Denormalized read shape, rebuilt by the projector after every committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleProjection {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub owner_name: String,
    pub is_active: bool,
    pub is_public: bool,
    pub display_name: String,
    pub status_text: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn name_key(owner_id: &str, name: &str) -> String {
    format!("{NAME_TABLE}:{owner_id}:{}", name.trim().to_lowercase())
}
