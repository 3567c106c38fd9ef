use std::borrow::Cow;
use tally_database::DatabaseError;
use tally_domain::error::{Classify, ErrorKind};
use tally_kernel::errors::ServiceError;

/// Errors raised by the unit of work, repositories, outbox and relay.
#[tally_derive::tally_error]
pub enum CqrsError {
    /// `begin` was called twice for the same request without finishing the first transaction.
    #[error("Transaction already active{}: {message}", format_context(.context))]
    AlreadyActive { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The transaction was already committed or rolled back.
    #[error("Transaction closed{}: {message}", format_context(.context))]
    Closed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The configured maximum transaction duration elapsed before commit.
    #[error("Transaction deadline exceeded{}: {message}", format_context(.context))]
    Timeout { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Database error{}: {source}", format_context(.context))]
    Database {
        #[source]
        source: DatabaseError,
        context: Option<Cow<'static, str>>,
    },

    /// Fields could not be converted between the typed and the stored shape.
    #[error("Serialization error{}: {source}", format_context(.context))]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: Option<Cow<'static, str>>,
    },

    /// `page` or `page_size` below 1.
    #[error("Invalid pagination{}: {message}", format_context(.context))]
    Pagination { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Relay settings that cannot work, such as a zero batch size.
    #[error("Invalid configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl Classify for CqrsError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Database { source, .. } => source.kind(),
            Self::Pagination { .. } | Self::InvalidConfiguration { .. } => ErrorKind::ValidationFailed,
            _ => ErrorKind::Unknown,
        }
    }
}

impl From<CqrsError> for ServiceError {
    fn from(err: CqrsError) -> Self {
        Self::from_classified(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_kinds_pass_through() {
        let err: CqrsError = DatabaseError::VersionConflict { message: "v1 != v2".into(), context: None }.into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let service: ServiceError = err.into();
        assert_eq!(service.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn lifecycle_errors_are_internal() {
        let err = CqrsError::Timeout { message: "30s".into(), context: None };
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(
            CqrsError::Pagination { message: "page 0".into(), context: None }.kind(),
            ErrorKind::ValidationFailed
        );
    }
}
