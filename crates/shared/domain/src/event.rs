use crate::context::CorrelationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Topic names follow `{subdomain}.{action}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("topic must have the form `subdomain.action`, got `{0}`")]
    Shape(String),
    #[error("topic segment `{0}` must be lowercase ascii letters, digits, `_` or `-`")]
    Segment(String),
}

impl Topic {
    pub fn new(value: impl Into<String>) -> Result<Self, TopicError> {
        let value = value.into();
        let mut parts = value.split('.');
        let (Some(subdomain), Some(action), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(TopicError::Shape(value));
        };
        for segment in [subdomain, action] {
            if !is_valid_segment(segment) {
                return Err(TopicError::Segment(segment.to_owned()));
            }
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn subdomain(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(s, _)| s)
    }

    #[must_use]
    pub fn action(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, a)| a)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Topic {
    type Error = TopicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable fact produced while handling a request.
///
/// Constructed once; there are no setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    event_id: String,
    occurred_at: DateTime<Utc>,
    correlation_id: CorrelationId,
    topic: Topic,
    payload: serde_json::Value,
}

impl DomainEvent {
    #[must_use]
    pub const fn new(
        event_id: String,
        occurred_at: DateTime<Utc>,
        correlation_id: CorrelationId,
        topic: Topic,
        payload: serde_json::Value,
    ) -> Self {
        Self { event_id, occurred_at, correlation_id, topic, payload }
    }

    #[must_use]
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    #[must_use]
    pub const fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    #[must_use]
    pub const fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_subdomain_action() {
        let topic = Topic::new("example.created").unwrap();
        assert_eq!(topic.subdomain(), "example");
        assert_eq!(topic.action(), "created");
    }

    #[test]
    fn rejects_malformed_topics() {
        for raw in ["example", "example.", ".created", "a.b.c", "Example.created", "example.cre ated"] {
            assert!(Topic::new(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn topic_deserialization_is_validated() {
        assert!(serde_json::from_str::<Topic>("\"example.updated\"").is_ok());
        assert!(serde_json::from_str::<Topic>("\"nope\"").is_err());
    }

    #[test]
    fn event_serializes_with_camel_case_keys() {
        let event = DomainEvent::new(
            "evt-1".to_owned(),
            Utc::now(),
            CorrelationId::new("corr"),
            Topic::new("example.created").unwrap(),
            serde_json::json!({ "id": "example:1" }),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["eventId"], "evt-1");
        assert_eq!(value["correlationId"], "corr");
        assert_eq!(value["topic"], "example.created");
    }
}
