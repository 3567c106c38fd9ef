use crate::errors::ServiceError;
use crate::security::resource::ResourceGuard;
use async_trait::async_trait;
use fxhash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tally_domain::context::CallerId;
use tracing::{debug, warn};

/// Storage-backed answers the guard needs for one resource type.
#[async_trait]
pub trait OwnershipPolicy: Send + Sync + 'static {
    async fn is_public(&self, resource_id: &str) -> Result<bool, ServiceError>;

    async fn owns(&self, caller: &CallerId, resource_id: &str) -> Result<bool, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: &'static str },
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Authorization gate for named resources.
///
/// Holds no persistence logic; every question goes to the [`OwnershipPolicy`] registered for
/// the resource type. Unregistered types are denied.
#[derive(Clone, Default)]
pub struct OwnershipGuard {
    policies: Arc<FxHashMap<String, Arc<dyn OwnershipPolicy>>>,
}

impl fmt::Debug for OwnershipGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.policies.keys().collect();
        types.sort();
        f.debug_struct("OwnershipGuard").field("resource_types", &types).finish()
    }
}

impl OwnershipGuard {
    #[must_use]
    pub fn builder() -> OwnershipGuardBuilder {
        OwnershipGuardBuilder::default()
    }

    /// Decides whether `caller` may act on `resource_id` of `resource_type`.
    ///
    /// No id (list, create) is allowed. Otherwise public resources are allowed, then owners.
    /// A malformed or foreign-table id is a validation error, not a denial.
    pub async fn authorize(
        &self,
        caller: Option<&CallerId>,
        resource_id: Option<&str>,
        resource_type: &str,
    ) -> Result<Decision, ServiceError> {
        let Some(raw_id) = resource_id else {
            return Ok(Decision::Allow);
        };
        let resource_id = ResourceGuard::verify(raw_id, resource_type)
            .map_err(ServiceError::from_classified)?;

        let Some(policy) = self.policies.get(resource_type) else {
            warn!(resource_type, "No ownership policy registered, denying");
            return Ok(Decision::Deny { reason: "unknown resource type" });
        };

        if policy.is_public(&resource_id).await? {
            debug!(%resource_id, "Public resource, allowing");
            return Ok(Decision::Allow);
        }

        let Some(caller) = caller else {
            return Ok(Decision::Deny { reason: "anonymous caller" });
        };

        if policy.owns(caller, &resource_id).await? {
            Ok(Decision::Allow)
        } else {
            debug!(%resource_id, %caller, "Caller does not own resource");
            Ok(Decision::Deny { reason: "not the owner" })
        }
    }
}

#[derive(Default)]
pub struct OwnershipGuardBuilder {
    policies: FxHashMap<String, Arc<dyn OwnershipPolicy>>,
}

impl fmt::Debug for OwnershipGuardBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnershipGuardBuilder").field("policies", &self.policies.len()).finish()
    }
}

impl OwnershipGuardBuilder {
    #[must_use]
    pub fn policy(mut self, resource_type: impl Into<String>, policy: Arc<dyn OwnershipPolicy>) -> Self {
        self.policies.insert(resource_type.into(), policy);
        self
    }

    #[must_use]
    pub fn build(self) -> OwnershipGuard {
        OwnershipGuard { policies: Arc::new(self.policies) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tally_domain::error::ErrorKind;

    #[derive(Default)]
    struct Fixed {
        public: bool,
        owner: &'static str,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl OwnershipPolicy for Fixed {
        async fn is_public(&self, _resource_id: &str) -> Result<bool, ServiceError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.public)
        }

        async fn owns(&self, caller: &CallerId, _resource_id: &str) -> Result<bool, ServiceError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(caller.as_str() == self.owner)
        }
    }

    fn guard(policy: Arc<Fixed>) -> OwnershipGuard {
        OwnershipGuard::builder().policy("example", policy).build()
    }

    #[tokio::test]
    async fn missing_id_skips_the_policy() {
        let policy = Arc::new(Fixed::default());
        let decision = guard(policy.clone()).authorize(None, None, "example").await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(policy.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn public_resources_skip_the_owner_check() {
        let policy = Arc::new(Fixed { public: true, ..Fixed::default() });
        let caller = CallerId::new("u2");
        let decision =
            guard(policy.clone()).authorize(Some(&caller), Some("example:1"), "example").await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(policy.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn only_the_owner_passes_a_private_resource() {
        let guard = guard(Arc::new(Fixed { owner: "u1", ..Fixed::default() }));

        let owner = CallerId::new("u1");
        assert!(guard.authorize(Some(&owner), Some("1"), "example").await.unwrap().is_allowed());

        let stranger = CallerId::new("u2");
        assert_eq!(
            guard.authorize(Some(&stranger), Some("example:1"), "example").await.unwrap(),
            Decision::Deny { reason: "not the owner" }
        );
        assert!(!guard.authorize(None, Some("example:1"), "example").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn unknown_types_and_foreign_ids() {
        let guard = guard(Arc::new(Fixed::default()));
        let caller = CallerId::new("u1");

        let decision = guard.authorize(Some(&caller), Some("order:1"), "order").await.unwrap();
        assert!(!decision.is_allowed());

        let err = guard.authorize(Some(&caller), Some("order:1"), "example").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }
}
