//! The error contract between business code and the outside world.
//!
//! Business code raises a [`ServiceError`] carrying one [`ErrorKind`], a rendered message and
//! structured details. The [`ErrorTranslator`] turns it into the stable external shape.

mod translator;

pub use translator::{ErrorBody, ErrorPayload, ErrorResponse, ErrorTranslator};

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::error::Error as StdError;
use tally_domain::error::{Classify, ErrorKind};

/// A typed error code owned by one feature, with a message template.
///
/// Templates use `{key}` placeholders filled from the error details.
pub trait ServiceErrorCode: Copy + Send + Sync + 'static {
    fn kind(self) -> ErrorKind;

    fn template(self) -> &'static str;

    /// Stable identifier for logs (`EXAMPLE_NOT_FOUND`).
    fn code(self) -> &'static str;
}

/// A classified business or infrastructure failure.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    kind: ErrorKind,
    code: Option<&'static str>,
    message: Cow<'static, str>,
    details: Option<Map<String, Value>>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self { kind, code: None, message: message.into(), details: None, source: None }
    }

    /// Builds an error from a feature code, rendering its template with `details`.
    ///
    /// Non-object details are stored under a `value` key.
    pub fn from_code<C: ServiceErrorCode>(code: C, details: Value) -> Self {
        let details = match details {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => Map::from_iter([("value".to_owned(), other)]),
        };
        Self {
            kind: code.kind(),
            code: Some(code.code()),
            message: render_template(code.template(), &details).into(),
            details: (!details.is_empty()).then_some(details),
            source: None,
        }
    }

    /// Wraps any classified error. `Unknown` errors keep their text here; the translator decides
    /// whether it leaves the process.
    pub fn from_classified<E>(err: E) -> Self
    where
        E: Classify + StdError + Send + Sync + 'static,
    {
        Self {
            kind: err.kind(),
            code: None,
            message: err.to_string().into(),
            details: None,
            source: Some(Box::new(err)),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{resource} with id '{id}' not found"))
            .with_detail("id", id)
    }

    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::ValidationFailed, message)
    }

    pub fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.get_or_insert_with(Map::new).insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn details(&self) -> Option<&Map<String, Value>> {
        self.details.as_ref()
    }
}

impl Classify for ServiceError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Substitutes `{key}` with the matching detail. Unknown placeholders stay verbatim.
#[must_use]
pub fn render_template(template: &str, details: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match details.get(key) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    },
                }
                rest = &after[close + 1..];
            },
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            },
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Copy)]
    enum Code {
        Missing,
        NotOwner,
    }

    impl ServiceErrorCode for Code {
        fn kind(self) -> ErrorKind {
            match self {
                Self::Missing => ErrorKind::NotFound,
                Self::NotOwner => ErrorKind::Forbidden,
            }
        }

        fn template(self) -> &'static str {
            match self {
                Self::Missing => "Example with id '{id}' not found",
                Self::NotOwner => "User {user} may not modify {id}",
            }
        }

        fn code(self) -> &'static str {
            match self {
                Self::Missing => "EXAMPLE_NOT_FOUND",
                Self::NotOwner => "EXAMPLE_UNAUTHORIZED",
            }
        }
    }

    #[test]
    fn code_renders_template_from_details() {
        let err = ServiceError::from_code(Code::Missing, json!({ "id": "example:1" }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "Example with id 'example:1' not found");
        assert_eq!(err.code(), Some("EXAMPLE_NOT_FOUND"));
        assert_eq!(err.details().unwrap()["id"], "example:1");
    }

    #[test]
    fn missing_placeholders_stay_verbatim() {
        let err = ServiceError::from_code(Code::NotOwner, json!({ "id": 7 }));
        assert_eq!(err.message(), "User {user} may not modify 7");
    }

    #[test]
    fn unterminated_brace_is_kept() {
        assert_eq!(render_template("oops {id", &Map::new()), "oops {id");
        assert_eq!(render_template("plain", &Map::new()), "plain");
    }

    #[test]
    fn classified_errors_keep_kind_and_source() {
        let inner = ServiceError::conflict("stale");
        let outer = ServiceError::from_classified(inner);
        assert_eq!(outer.kind(), ErrorKind::Conflict);
        assert!(std::error::Error::source(&outer).is_some());
    }
}
