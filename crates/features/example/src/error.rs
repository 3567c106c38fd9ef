use serde_json::json;
use std::borrow::Cow;
use tally_domain::error::ErrorKind;
use tally_kernel::errors::{ServiceError, ServiceErrorCode};

/// Error codes raised by the example service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleErrorCode {
    NotFound,
    ValidationFailed,
    Conflict,
    /// The caller is known but does not own the example.
    Unauthorized,
    AlreadyExists,
}

impl ServiceErrorCode for ExampleErrorCode {
    fn kind(self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::ValidationFailed => ErrorKind::ValidationFailed,
            Self::Conflict | Self::AlreadyExists => ErrorKind::Conflict,
            Self::Unauthorized => ErrorKind::Forbidden,
        }
    }

    fn template(self) -> &'static str {
        match self {
            Self::NotFound => "Example '{id}' not found",
            Self::ValidationFailed => "Validation failed: {reason}",
            Self::Conflict => "Example '{id}' was changed by another request",
            Self::Unauthorized => "You are not authorized to access example '{id}'",
            Self::AlreadyExists => "Example with name '{name}' already exists",
        }
    }

    fn code(self) -> &'static str {
        match self {
            Self::NotFound => "EXAMPLE_NOT_FOUND",
            Self::ValidationFailed => "EXAMPLE_VALIDATION_FAILED",
            Self::Conflict => "EXAMPLE_CONFLICT",
            Self::Unauthorized => "EXAMPLE_UNAUTHORIZED",
            Self::AlreadyExists => "EXAMPLE_ALREADY_EXISTS",
        }
    }
}

/// Invariant violations raised by the example model itself.
#[tally_derive::tally_error]
pub enum ExampleError {
    #[kind(ValidationFailed)]
    #[error("Invalid example{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[kind(Forbidden)]
    #[error("Caller does not own {id}{}: {message}", format_context(.context))]
    NotOwner { id: String, message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid event topic{}: {source}", format_context(.context))]
    Topic {
        #[source]
        source: tally_domain::event::TopicError,
        context: Option<Cow<'static, str>>,
    },
}

impl ExampleError {
    pub(crate) fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Validation { message: message.into(), context: None }
    }
}

impl From<ExampleError> for ServiceError {
    fn from(err: ExampleError) -> Self {
        match err {
            ExampleError::Validation { message, .. } => {
                Self::from_code(ExampleErrorCode::ValidationFailed, json!({ "reason": message }))
            },
            ExampleError::NotOwner { id, .. } => {
                Self::from_code(ExampleErrorCode::Unauthorized, json!({ "id": id }))
            },
            other @ ExampleError::Topic { .. } => Self::from_classified(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_errors_render_through_codes() {
        let err: ServiceError = ExampleError::validation("Example name cannot be empty").into();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(err.message(), "Validation failed: Example name cannot be empty");
        assert_eq!(err.code(), Some("EXAMPLE_VALIDATION_FAILED"));
    }

    #[test]
    fn not_owner_is_forbidden() {
        let err: ServiceError =
            ExampleError::NotOwner { id: "example:1".into(), message: "owned by u1".into(), context: None }.into();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(err.message(), "You are not authorized to access example 'example:1'");
    }
}
