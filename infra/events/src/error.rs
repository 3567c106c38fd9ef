use std::borrow::Cow;

/// Errors that can occur during event bus operations.
#[tally_derive::tally_error]
pub enum EventBusError {
    /// One or more handlers rejected the event; the event should be redelivered.
    #[error("Handler failed{}: {message}", format_context(.context))]
    Handler { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Capacity must be greater than zero for bounded buffers.
    #[kind(ValidationFailed)]
    #[error("Invalid capacity{}: {message}", format_context(.context))]
    InvalidCapacity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The bus was shut down and no longer accepts events.
    #[error("Event bus closed{}: {message}", format_context(.context))]
    Closed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal event bus error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
