use super::ServiceError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tally_domain::constants::SCRUBBED_MESSAGE;
use tally_domain::error::ErrorKind;
use tracing::{debug, error, warn};

/// Maps classified errors to the stable external contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTranslator {
    expose_internal: bool,
}

/// Status plus the serialized body of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: u16,
    pub error: ErrorBody,
}

pub type ErrorPayload = Option<Map<String, Value>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: ErrorKind,
    pub message: String,
    pub details: ErrorPayload,
    pub timestamp: String,
    pub path: String,
    pub request_id: String,
}

impl ErrorTranslator {
    #[must_use]
    pub const fn new(expose_internal: bool) -> Self {
        Self { expose_internal }
    }

    #[must_use]
    pub fn translate(&self, err: &ServiceError, path: &str, request_id: &str) -> ErrorResponse {
        self.translate_at(err, path, request_id, Utc::now())
    }

    #[must_use]
    pub fn translate_at(
        &self,
        err: &ServiceError,
        path: &str,
        request_id: &str,
        at: DateTime<Utc>,
    ) -> ErrorResponse {
        let kind = err.kind();
        match kind {
            ErrorKind::Unknown => {
                let source = std::error::Error::source(err).map(ToString::to_string);
                error!(request_id, path, error = %err, source, "Unhandled error");
            },
            ErrorKind::Conflict | ErrorKind::Forbidden => {
                warn!(request_id, path, %kind, code = err.code(), "Request rejected");
            },
            _ => debug!(request_id, path, %kind, code = err.code(), "Request rejected"),
        }

        let scrub = kind.is_internal() && !self.expose_internal;
        let (message, details) = if scrub {
            (SCRUBBED_MESSAGE.to_owned(), None)
        } else {
            (err.message().to_owned(), err.details().cloned())
        };

        ErrorResponse {
            status: kind.status(),
            error: ErrorBody {
                code: kind,
                message,
                details,
                timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
                path: path.to_owned(),
                request_id: request_id.to_owned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statuses_follow_the_kind_table() {
        let translator = ErrorTranslator::default();
        let cases = [
            (ServiceError::not_found("Example", "example:1"), 404),
            (ServiceError::validation("bad"), 400),
            (ServiceError::conflict("stale"), 409),
            (ServiceError::unauthorized("who?"), 401),
            (ServiceError::forbidden("no"), 403),
            (ServiceError::internal("db exploded"), 500),
        ];
        for (err, status) in cases {
            assert_eq!(translator.translate(&err, "/x", "req").status, status);
        }
    }

    #[test]
    fn unknown_errors_are_scrubbed() {
        let err = ServiceError::internal("connection refused at 10.0.0.3").with_detail("host", "10.0.0.3");
        let response = ErrorTranslator::new(false).translate(&err, "/examples", "req-1");
        assert_eq!(response.error.message, SCRUBBED_MESSAGE);
        assert!(response.error.details.is_none());

        let exposed = ErrorTranslator::new(true).translate(&err, "/examples", "req-1");
        assert!(exposed.error.message.contains("10.0.0.3"));
    }

    #[test]
    fn body_has_the_stable_shape() {
        let at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
        let err = ServiceError::not_found("Example", "example:9");
        let response = ErrorTranslator::default().translate_at(&err, "/examples/9", "req-9", at);

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "error": {
                    "code": "NotFound",
                    "message": "Example with id 'example:9' not found",
                    "details": { "id": "example:9" },
                    "timestamp": "2026-01-02T03:04:05.000Z",
                    "path": "/examples/9",
                    "requestId": "req-9"
                }
            })
        );
    }
}
