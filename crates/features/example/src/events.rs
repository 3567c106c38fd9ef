use crate::error::{ExampleError, ExampleErrorExt};
use serde::{Deserialize, Serialize};
use tally_domain::event::Topic;

/// Lifecycle events of the example aggregate, published on `example.{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExampleTopic {
    Created,
    Updated,
    Deleted,
    Activated,
    Deactivated,
}

impl ExampleTopic {
    pub const ALL: [Self; 5] =
        [Self::Created, Self::Updated, Self::Deleted, Self::Activated, Self::Deactivated];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "example.created",
            Self::Updated => "example.updated",
            Self::Deleted => "example.deleted",
            Self::Activated => "example.activated",
            Self::Deactivated => "example.deactivated",
        }
    }

    pub fn topic(self) -> Result<Topic, ExampleError> {
        Topic::new(self.as_str()).context(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleCreated {
    pub example_id: String,
    pub owner_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleUpdated {
    pub example_id: String,
    pub version: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleDeleted {
    pub example_id: String,
    pub owner_id: String,
}

/// Payload of both `example.activated` and `example.deactivated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleStatusChanged {
    pub example_id: String,
    pub version: u64,
    pub is_active: bool,
}

/// The part every example payload shares; enough for the projector to find the row.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExampleRef {
    pub(crate) example_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_topic_is_well_formed() {
        for topic in ExampleTopic::ALL {
            let parsed = topic.topic().unwrap();
            assert_eq!(parsed.subdomain(), "example");
            assert_eq!(parsed.as_str(), topic.as_str());
        }
    }
}
