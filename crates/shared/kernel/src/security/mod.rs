pub mod ownership;
pub mod resource;

pub use ownership::{Decision, OwnershipGuard, OwnershipGuardBuilder, OwnershipPolicy};
pub use resource::{ResourceGuard, ResourceGuardError};
