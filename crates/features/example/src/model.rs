use crate::error::ExampleError;
use chrono::{DateTime, Utc};
use tally_cqrs::{Aggregate, ModelMeta};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// The example aggregate. Only its own methods change it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleModel {
    meta: ModelMeta,
    name: String,
    description: String,
    owner_id: String,
    is_active: bool,
    is_public: bool,
}

impl Aggregate for ExampleModel {
    const TABLE: &'static str = "example";
    const NAME: &'static str = "Example";

    fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ModelMeta {
        &mut self.meta
    }
}

impl ExampleModel {
    /// A new, active example. Fails if any invariant does not hold.
    pub fn create(
        name: impl Into<String>,
        description: impl Into<String>,
        owner_id: impl Into<String>,
        is_public: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, ExampleError> {
        let model = Self::draft(
            ModelMeta::new(Self::TABLE, now),
            name.into(),
            description.into(),
            owner_id.into(),
            is_public,
        );
        model.validate()?;
        Ok(model)
    }

    /// An unvalidated model; callers run [`ExampleModel::validate`] before persisting it.
    #[must_use]
    pub const fn draft(
        meta: ModelMeta,
        name: String,
        description: String,
        owner_id: String,
        is_public: bool,
    ) -> Self {
        Self { meta, name, description, owner_id, is_active: true, is_public }
    }

    /// Rebuilds a stored model as-is, without validation.
    #[must_use]
    pub const fn hydrate(
        meta: ModelMeta,
        name: String,
        description: String,
        owner_id: String,
        is_active: bool,
        is_public: bool,
    ) -> Self {
        Self { meta, name, description, owner_id, is_active, is_public }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.is_public
    }

    pub fn update_details(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ExampleError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ExampleError::validation("Name cannot be empty"));
        }
        let previous = (
            std::mem::replace(&mut self.name, name),
            std::mem::replace(&mut self.description, description.into()),
        );
        if let Err(err) = self.validate() {
            (self.name, self.description) = previous;
            return Err(err);
        }
        self.meta.touch(now);
        Ok(())
    }

    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.is_active = true;
        self.meta.touch(now);
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.meta.touch(now);
    }

    pub fn validate_ownership(&self, user_id: &str) -> Result<(), ExampleError> {
        if self.owner_id == user_id {
            return Ok(());
        }
        Err(ExampleError::NotOwner {
            id: self.meta.id.clone(),
            message: "User does not own this resource".into(),
            context: None,
        })
    }

    pub fn validate(&self) -> Result<(), ExampleError> {
        if self.name.trim().is_empty() {
            return Err(ExampleError::validation("Example name cannot be empty"));
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(ExampleError::validation(format!(
                "Example name cannot exceed {MAX_NAME_LEN} characters"
            )));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ExampleError::validation(format!(
                "Example description cannot exceed {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if self.owner_id.trim().is_empty() {
            return Err(ExampleError::validation("Example must have an owner"));
        }
        Ok(())
    }
}
