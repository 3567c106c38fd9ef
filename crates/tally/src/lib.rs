//! Facade crate for the Tally coordination core and its feature slices.
//! Re-exports the shared crates and assembles them into a [`Platform`].
//! Keep this crate thin: it should compose other crates, not implement business logic.
//!
//! ## Usage
//! ```rust,no_run
//! use tally::Platform;
//! use tally::domain::config::AppConfig;
//! use tally::kernel::config::load_config;
//!
//! # async fn run() -> Result<(), tally::PlatformError> {
//! let cfg: AppConfig = load_config(Some("tally.toml")).unwrap_or_default();
//! let platform = Platform::builder().config(cfg).logging(true).build()?;
//! platform.start()?;
//! // serve requests through `platform.pipeline()`
//! platform.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod platform;

pub use error::{PlatformError, PlatformErrorExt};
pub use platform::{Platform, PlatformBuilder};

pub use tally_cqrs as cqrs;
pub use tally_database as database;
pub use tally_domain as domain;
pub use tally_event_bus as events;
pub use tally_kernel as kernel;
pub use tally_logger as logger;

/// Feature registry for runtime introspection.
pub mod features {
    pub use tally_example as example;

    /// Slices registered by [`crate::Platform`].
    pub const ENABLED: &[&str] = &["example"];

    #[must_use]
    pub fn is_enabled(name: &str) -> bool {
        ENABLED.contains(&name)
    }
}
