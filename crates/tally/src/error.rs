use std::borrow::Cow;

/// Failures while assembling or running the [`crate::Platform`].
#[tally_derive::tally_error]
pub enum PlatformError {
    #[error("Logger setup failed{}: {source}", format_context(.context))]
    Logger {
        #[source]
        source: tally_logger::LoggerError,
        context: Option<Cow<'static, str>>,
    },

    #[error("Database setup failed{}: {source}", format_context(.context))]
    Database {
        #[source]
        source: tally_database::DatabaseError,
        context: Option<Cow<'static, str>>,
    },

    #[error("Example slice setup failed{}: {source}", format_context(.context))]
    Example {
        #[source]
        source: tally_example::ExampleError,
        context: Option<Cow<'static, str>>,
    },

    #[error("Outbox relay setup failed{}: {source}", format_context(.context))]
    Relay {
        #[source]
        source: tally_cqrs::CqrsError,
        context: Option<Cow<'static, str>>,
    },

    #[error("Invalid platform state{}: {message}", format_context(.context))]
    State { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
