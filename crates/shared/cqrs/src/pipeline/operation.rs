use crate::context::TransactionContext;
use async_trait::async_trait;
use fxhash::FxHashMap;
use tally_domain::context::{CallerId, RequestContext};
use tally_kernel::errors::ServiceError;

/// The transport-neutral view of an inbound call: a path and its headers.
///
/// Header names are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct Inbound {
    path: String,
    headers: FxHashMap<String, String>,
}

impl Inbound {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), headers: FxHashMap::default() }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Identity verification, owned by the transport layer.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// `Ok(None)` for anonymous callers; `Err` when credentials are present but invalid.
    async fn authenticate(&self, inbound: &Inbound) -> Result<Option<CallerId>, ServiceError>;
}

/// Treats every caller as anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

#[async_trait]
impl Authenticator for Anonymous {
    async fn authenticate(&self, _inbound: &Inbound) -> Result<Option<CallerId>, ServiceError> {
        Ok(None)
    }
}

/// Reads the caller id from a header set by a gateway that already verified it.
#[derive(Debug, Clone)]
pub struct HeaderAuthenticator {
    header: String,
}

impl HeaderAuthenticator {
    pub const DEFAULT_HEADER: &'static str = "X-Caller-ID";

    #[must_use]
    pub fn new(header: impl Into<String>) -> Self {
        Self { header: header.into() }
    }
}

impl Default for HeaderAuthenticator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HEADER)
    }
}

#[async_trait]
impl Authenticator for HeaderAuthenticator {
    async fn authenticate(&self, inbound: &Inbound) -> Result<Option<CallerId>, ServiceError> {
        match inbound.header_value(&self.header).map(str::trim) {
            None => Ok(None),
            Some("") => Err(ServiceError::unauthorized("Empty caller identity")),
            Some(caller) => Ok(Some(CallerId::new(caller))),
        }
    }
}

/// A business operation that changes state. Runs inside exactly one transaction.
#[async_trait]
pub trait MutatingOperation: Send + Sync {
    type Output: Send;

    /// Resource type the ownership guard checks against.
    fn resource_type(&self) -> &'static str;

    /// The targeted resource, `None` for creates.
    fn resource_id(&self) -> Option<&str>;

    fn success_status(&self) -> u16 {
        200
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        tx: &mut TransactionContext,
    ) -> Result<Self::Output, ServiceError>;
}

/// A read-only operation. Never opens a transaction.
#[async_trait]
pub trait QueryOperation: Send + Sync {
    type Output: Send;

    fn resource_type(&self) -> &'static str;

    fn resource_id(&self) -> Option<&str> {
        None
    }

    async fn execute(&self, ctx: &RequestContext) -> Result<Self::Output, ServiceError>;
}
