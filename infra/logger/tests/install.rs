use serial_test::serial;
use std::fs;
use std::time::Duration;
use tally_domain::config::LoggingConfig;
use tally_logger::{LevelFilter, Logger, LoggerError};
use tempfile::tempdir;

// One process, one subscriber: the second install must be refused.
#[test]
#[serial]
fn text_file_from_config_then_refuses_reinstall() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let config = LoggingConfig {
        name: "relay".to_owned(),
        level: "info".to_owned(),
        console: false,
        directory: Some(tmp_dir.path().join("nested").join("logs")),
        ..LoggingConfig::default()
    };

    let logger = Logger::from_config(&config)?;
    assert!(logger.guard().is_some());

    let again = Logger::builder().name("relay-again").level(LevelFilter::WARN).init();
    assert!(matches!(again, Err(LoggerError::Subscriber { .. })));

    tracing::info!(topic = "example.created", "entry dispatched");
    tracing::debug!("below the configured level");
    std::thread::sleep(Duration::from_millis(30));
    drop(logger);

    let dir = config.directory.as_ref().expect("directory configured");
    let files: Vec<_> = fs::read_dir(dir)?.flatten().map(|entry| entry.path()).collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().and_then(|n| n.to_str()).unwrap_or_default();
    assert!(name.starts_with("relay") && name.ends_with(".log"), "unexpected file {name}");

    let contents = fs::read_to_string(&files[0])?;
    assert!(contents.contains("entry dispatched"));
    assert!(contents.contains("example.created"));
    assert!(!contents.contains("below the configured level"));
    Ok(())
}
