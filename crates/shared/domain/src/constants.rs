/// Header carrying the correlation id in and out of a request.
pub const CORRELATION_HEADER: &str = "X-Correlation-ID";

/// First version assigned to a freshly saved write record.
pub const INITIAL_VERSION: u64 = 1;

/// Message returned for `Unknown` errors when internal details are scrubbed.
pub const SCRUBBED_MESSAGE: &str = "An unexpected error occurred";
