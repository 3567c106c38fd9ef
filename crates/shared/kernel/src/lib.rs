//! Building blocks every slice leans on.
//!
//! * [`ids`]: `table:key` record identifiers ([`record_id`], [`safe_nanoid!`]).
//! * [`config`]: layered TOML plus `TALLY__` environment loading.
//! * [`security`]: id normalization and the per-table ownership guard.
//! * [`errors`]: the [`errors::ServiceError`] contract and its status translation.
//!
//! ```rust
//! let id = tally_kernel::record_id("example");
//! assert!(id.starts_with("example:"));
//! ```
pub mod config;
pub mod errors;
pub mod ids;
pub mod security;

pub use ids::{record_id, split_record_id};
pub use nanoid::nanoid;
pub use tally_domain as domain;
