use serde::Deserialize;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Top-level configuration shared across the coordination core.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfigInner {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub transaction: TransactionConfig,
    pub relay: RelayConfig,
    pub errors: ErrorConfig,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(flatten, default)]
    inner: Arc<AppConfigInner>,
}

impl Deref for AppConfig {
    type Target = AppConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for AppConfig {
    fn deref_mut(&mut self) -> &mut AppConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// Subscriber setup: console and/or rolling file output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub name: String,
    pub level: String,
    pub console: bool,
    pub directory: Option<PathBuf>,
    pub json: bool,
    pub max_files: usize,
    /// Full `EnvFilter` directive; overrides `level` when set.
    pub env_filter: Option<String>,
}

/// In-process store limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub outbox_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Hard ceiling for one mutating request, begin to commit.
    pub max_duration_ms: u64,
}

/// Outbox relay tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub lease_ms: u64,
    pub workers: usize,
}

#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ErrorConfig {
    /// Keep `Unknown` messages instead of scrubbing them. Development only.
    pub expose_internal: bool,
}

impl TransactionConfig {
    #[must_use]
    pub const fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }
}

impl RelayConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    /// Exponential backoff after `attempts` failed deliveries, capped at `max_backoff_ms`.
    #[must_use]
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exp = attempts.saturating_sub(1).min(32);
        let millis = self.base_backoff_ms.saturating_mul(1_u64 << exp).min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

// --- Default ---

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            name: "tally".to_owned(),
            level: "info".to_owned(),
            console: true,
            directory: None,
            json: false,
            max_files: 7,
            env_filter: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { outbox_capacity: 100_000 }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self { max_duration_ms: 30_000 }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            batch_size: 64,
            max_attempts: 5,
            base_backoff_ms: 100,
            max_backoff_ms: 30_000,
            lease_ms: 30_000,
            workers: 4,
        }
    }
}
