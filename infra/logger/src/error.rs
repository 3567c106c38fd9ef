use std::borrow::Cow;
use std::path::PathBuf;

/// Why the subscriber could not be installed.
#[tally_derive::tally_error]
pub enum LoggerError {
    #[error("Cannot create log directory '{}'{}: {source}", path.display(), format_context(context))]
    Directory { path: PathBuf, source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Cannot open rolling log file{}: {source}", format_context(context))]
    Appender { source: tracing_appender::rolling::InitError, context: Option<Cow<'static, str>> },

    /// Only one global subscriber per process; the second install lands here.
    #[error("Subscriber already installed{}: {source}", format_context(context))]
    Subscriber {
        source: tracing_subscriber::util::TryInitError,
        context: Option<Cow<'static, str>>,
    },

    /// Empty name, unknown level name, zero retained files or a malformed filter directive.
    #[error("Invalid logging settings{}: {message}", format_context(context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
