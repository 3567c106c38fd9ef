use async_trait::async_trait;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use tally_kernel::errors::ServiceError;

/// Source of user display names for the read model.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// `None` when the user is unknown; the projection then shows the raw id.
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, ServiceError>;
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    names: RwLock<FxHashMap<String, String>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: impl Into<String>, display_name: impl Into<String>) {
        self.names.write().insert(user_id.into(), display_name.into());
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.names.read().get(user_id).cloned())
    }
}
