use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(
    /// Opaque token propagated through a request and every event derived from it.
    CorrelationId
);
string_id!(
    /// Unique id of one inbound request; never shared between requests.
    RequestId
);
string_id!(
    /// Authenticated caller identity, as produced by the external authenticator.
    CallerId
);

/// Per-request state carried explicitly through the call chain.
///
/// Created once by the pipeline; the caller is attached after authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: RequestId,
    correlation_id: CorrelationId,
    caller: Option<CallerId>,
    mutating: bool,
    path: String,
}

impl RequestContext {
    #[must_use]
    pub fn new(
        request_id: RequestId,
        correlation_id: CorrelationId,
        path: impl Into<String>,
        mutating: bool,
    ) -> Self {
        Self { request_id, correlation_id, caller: None, mutating, path: path.into() }
    }

    #[must_use]
    pub fn with_caller(mut self, caller: CallerId) -> Self {
        self.caller = Some(caller);
        self
    }

    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    #[must_use]
    pub const fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    #[must_use]
    pub const fn caller(&self) -> Option<&CallerId> {
        self.caller.as_ref()
    }

    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        self.mutating
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_is_attached_after_construction() {
        let ctx = RequestContext::new("req-1".into(), "corr-1".into(), "/examples", true);
        assert!(ctx.caller().is_none());

        let ctx = ctx.with_caller("user-1".into());
        assert_eq!(ctx.caller().map(CallerId::as_str), Some("user-1"));
        assert_eq!(ctx.correlation_id().as_str(), "corr-1");
        assert!(ctx.is_mutating());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = CorrelationId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
