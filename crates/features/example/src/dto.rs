use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const fn first_page() -> usize {
    1
}

const fn default_page_size() -> usize {
    20
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExampleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExampleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExamplesRequest {
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub active_only: bool,
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl Default for ListExamplesRequest {
    fn default() -> Self {
        Self { page: first_page(), page_size: default_page_size(), active_only: false, owner_id: None }
    }
}

/// Transport shape of one example.
///
/// `owner_name` is only known on the read side; responses built straight from a just-written
/// model leave it empty and use the bare name as `display_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    pub is_active: bool,
    pub is_public: bool,
    pub display_name: String,
    pub status_text: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamplePage {
    pub items: Vec<ExampleResponse>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}
