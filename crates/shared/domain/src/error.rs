use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter};

/// Closed set of error kinds surfaced by business and infrastructure code.
///
/// Every error that reaches the translator is reduced to exactly one kind; the kind alone
/// decides the external status. Never derive a kind from message text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumIter,
)]
pub enum ErrorKind {
    NotFound,
    ValidationFailed,
    Conflict,
    Unauthorized,
    Forbidden,
    Unknown,
}

impl ErrorKind {
    /// External status code for this kind.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::ValidationFailed => 400,
            Self::Conflict => 409,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::Unknown => 500,
        }
    }

    /// Whether the message of an error of this kind must be scrubbed before leaving the process.
    #[must_use]
    pub const fn is_internal(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// Reduces an error to its [`ErrorKind`].
///
/// Implemented by `#[tally_error]` enums that annotate variants with `#[kind(..)]`.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn status_table_is_total_and_distinct() {
        let mut seen = std::collections::HashSet::new();
        for kind in ErrorKind::iter() {
            assert!(seen.insert(kind.status()), "duplicate status for {kind}");
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn only_unknown_is_internal() {
        let internal: Vec<_> = ErrorKind::iter().filter(|k| k.is_internal()).collect();
        assert_eq!(internal, vec![ErrorKind::Unknown]);
    }

    #[test]
    fn kind_serializes_as_code() {
        assert_eq!(serde_json::to_string(&ErrorKind::ValidationFailed).unwrap(), "\"ValidationFailed\"");
        assert_eq!(ErrorKind::NotFound.as_ref(), "NotFound");
    }
}
