use crate::ids::split_record_id;
use std::borrow::Cow;

#[tally_derive::tally_error]
pub enum ResourceGuardError {
    #[kind(ValidationFailed)]
    #[error("Malformed record id{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Normalizes client supplied ids before they reach storage.
#[derive(Debug)]
pub struct ResourceGuard;

impl ResourceGuard {
    /// Returns `id` as `table:key` for `table`.
    ///
    /// Bare keys are prefixed (`123` becomes `example:123`); ids naming another table
    /// (`system:config` sent to an `example` route) are rejected.
    ///
    /// # Errors
    /// [`ResourceGuardError::Validation`] on a foreign table or an empty key.
    pub fn verify(id: impl AsRef<str>, table: impl AsRef<str>) -> Result<String, ResourceGuardError> {
        let (id, table) = (id.as_ref().trim(), table.as_ref());
        let (found, key) = split_record_id(id).unwrap_or((table, id));

        if found != table {
            return Err(ResourceGuardError::Validation {
                message: format!("'{id}' does not belong to '{table}'").into(),
                context: None,
            });
        }
        if key.is_empty() {
            return Err(ResourceGuardError::Validation {
                message: format!("empty key for '{table}'").into(),
                context: None,
            });
        }
        Ok(format!("{table}:{key}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_domain::error::{Classify, ErrorKind};

    #[test]
    fn prefixed_and_bare_ids_normalize() {
        assert_eq!(ResourceGuard::verify("example:123", "example").unwrap(), "example:123");
        assert_eq!(ResourceGuard::verify(" 123 ", "example").unwrap(), "example:123");
    }

    #[test]
    fn foreign_or_empty_ids_are_validation_failures() {
        for bad in ["system:config", "example:", "", "   "] {
            let err = ResourceGuard::verify(bad, "example").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationFailed, "{bad:?}");
        }
    }
}
