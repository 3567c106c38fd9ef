use serial_test::serial;
use std::fs;
use std::time::Duration;
use tally_domain::config::LoggingConfig;
use tally_logger::Logger;
use tempfile::tempdir;

#[test]
#[serial]
fn json_file_output_from_config() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let config = LoggingConfig {
        name: "from-config".to_owned(),
        level: "debug".to_owned(),
        console: false,
        directory: Some(tmp_dir.path().join("json")),
        json: true,
        ..LoggingConfig::default()
    };

    let logger = Logger::from_config(&config)?;
    tracing::debug!(correlation_id = "corr-7", "structured line");
    std::thread::sleep(Duration::from_millis(30));
    drop(logger);

    let dir = config.directory.as_ref().expect("directory configured");
    let line = fs::read_dir(dir)?
        .flatten()
        .map(|entry| fs::read_to_string(entry.path()))
        .collect::<Result<Vec<_>, _>>()?
        .concat();
    let first = line.lines().next().expect("at least one line");
    let value: serde_json::Value = serde_json::from_str(first)?;
    assert_eq!(value["fields"]["message"], "structured line");
    assert_eq!(value["fields"]["correlation_id"], "corr-7");

    Ok(())
}
