use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment prefix: `TALLY__RELAY__MAX_ATTEMPTS=8` maps to `relay.max_attempts`.
pub const ENV_PREFIX: &str = "TALLY";
const DEFAULT_CONFIG_FILE: &str = "tally";

/// Custom error type for config loading.
#[tally_derive::tally_error]
pub enum ConfigError {
    #[kind(ValidationFailed)]
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads configuration from a file, then overlays `TALLY__`-prefixed environment variables.
///
/// The file format follows its extension (TOML, JSON, YAML...). Without a path the `tally`
/// file in the working directory is used. Nested keys use a double underscore separator.
///
/// # Errors
/// * The configuration file cannot be found.
/// * The merged content does not match `T`.
///
/// # Example
/// ```rust
/// use tally_kernel::config::load_config;
///
/// #[derive(Default, serde::Deserialize)]
/// struct AppConfig {
///     port: u16,
/// }
///
/// let cfg: AppConfig = load_config(Some("config/local")).unwrap_or_default();
/// ```
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let effective_path =
        path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), |p| p.as_ref().to_path_buf());

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(true))
        .add_source(environment());

    info!("Loading config from {}", effective_path.display());

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .convert_case(config::Case::Snake)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tally_domain::config::AppConfig;

    #[test]
    fn environment_keys_map_to_nested_sections() {
        let vars = HashMap::from([
            ("TALLY__RELAY__MAX_ATTEMPTS".to_owned(), "8".to_owned()),
            ("TALLY__ERRORS__EXPOSE_INTERNAL".to_owned(), "true".to_owned()),
            ("OTHER__RELAY__WORKERS".to_owned(), "99".to_owned()),
        ]);

        let cfg: AppConfig = Config::builder()
            .add_source(environment().source(Some(vars)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.relay.max_attempts, 8);
        assert!(cfg.errors.expose_internal);
        assert_eq!(cfg.relay.workers, 4);
    }
}
