use serial_test::serial;
use std::io::Write;
use tally_domain::config::AppConfig;
use tally_kernel::config::{ConfigError, load_config};
use tempfile::NamedTempFile;

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
#[serial]
fn file_values_override_defaults() {
    let file = toml_file(
        r#"
        [relay]
        max_attempts = 3
        batch_size = 16

        [errors]
        expose_internal = true
        "#,
    );

    let cfg: AppConfig = load_config(Some(file.path())).expect("load config");
    assert_eq!(cfg.relay.max_attempts, 3);
    assert_eq!(cfg.relay.batch_size, 16);
    assert_eq!(cfg.relay.workers, 4);
    assert!(cfg.errors.expose_internal);
}

#[test]
#[serial]
fn missing_file_is_an_error() {
    let result: Result<AppConfig, _> = load_config(Some("/definitely/not/here.toml"));
    assert!(matches!(result, Err(ConfigError::Config { .. })));
}
