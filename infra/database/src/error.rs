use std::borrow::Cow;

/// A specialized [`DatabaseError`] enum of this crate.
#[tally_derive::tally_error]
pub enum DatabaseError {
    /// Builder or argument validation errors.
    #[kind(ValidationFailed)]
    #[error("Validation error{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[kind(NotFound)]
    #[error("Row not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Insert of an id that already exists (stored or staged by another transaction).
    #[kind(Conflict)]
    #[error("Row already exists{}: {message}", format_context(.context))]
    AlreadyExists { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The stored version differs from the version the writer read.
    #[kind(Conflict)]
    #[error("Version conflict{}: {message}", format_context(.context))]
    VersionConflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Another open transaction already staged a write for the row.
    #[kind(Conflict)]
    #[error("Row is being written by another transaction{}: {message}", format_context(.context))]
    WriteIntent { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// An outbox entry is not in the state the requested operation needs.
    #[kind(Conflict)]
    #[error("Invalid outbox transition{}: {source}", format_context(.context))]
    Transition {
        #[source]
        source: tally_domain::outbox::TransitionError,
        context: Option<Cow<'static, str>>,
    },

    /// Committing would exceed the configured outbox capacity; nothing was applied.
    #[error("Outbox is full{}: {message}", format_context(.context))]
    OutboxFull { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The transaction was already committed or rolled back.
    #[error("Transaction closed{}: {message}", format_context(.context))]
    Closed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal database error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
