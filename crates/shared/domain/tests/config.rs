use serde_json::json;
use std::time::Duration;
use tally_domain::config::{AppConfig, DatabaseConfig, ErrorConfig, RelayConfig, TransactionConfig};

#[test]
fn config_defaults_are_sane() {
    let relay = RelayConfig::default();
    assert_eq!(relay.poll_interval(), Duration::from_millis(200));
    assert_eq!(relay.batch_size, 64);
    assert_eq!(relay.max_attempts, 5);
    assert_eq!(relay.workers, 4);

    assert_eq!(TransactionConfig::default().max_duration(), Duration::from_secs(30));
    assert_eq!(DatabaseConfig::default().outbox_capacity, 100_000);
    assert!(!ErrorConfig::default().expose_internal);
}

#[test]
fn backoff_doubles_and_is_capped() {
    let relay = RelayConfig { base_backoff_ms: 100, max_backoff_ms: 1_000, ..RelayConfig::default() };
    assert_eq!(relay.backoff(1), Duration::from_millis(100));
    assert_eq!(relay.backoff(2), Duration::from_millis(200));
    assert_eq!(relay.backoff(3), Duration::from_millis(400));
    assert_eq!(relay.backoff(10), Duration::from_millis(1_000));
    assert_eq!(relay.backoff(u32::MAX), Duration::from_millis(1_000));
}

#[test]
fn app_config_deserializes_partial_documents() {
    let raw = json!({
        "relay": { "max_attempts": 8 },
        "errors": { "expose_internal": true },
        "logging": { "name": "orders", "json": true }
    });

    let cfg: AppConfig = serde_json::from_value(raw).expect("config deserialize");
    assert_eq!(cfg.relay.max_attempts, 8);
    assert_eq!(cfg.relay.batch_size, 64);
    assert!(cfg.errors.expose_internal);
    assert_eq!(cfg.logging.name, "orders");
    assert_eq!(cfg.transaction.max_duration_ms, 30_000);
}

#[test]
fn deref_mut_copies_on_write() {
    let original = AppConfig::default();
    let mut changed = original.clone();
    changed.relay.workers = 1;

    assert_eq!(original.relay.workers, 4);
    assert_eq!(changed.relay.workers, 1);
}
