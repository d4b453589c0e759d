use roost_sync::{RestConfig, SyncConfig};
use std::time::Duration;

#[test]
fn sync_config_defaults() {
    let config = SyncConfig::default();
    assert_eq!(config.schema, "public");
    assert_eq!(config.dedup_capacity, 100);
    assert_eq!(config.dedup_window(), Duration::from_secs(10));
    assert_eq!(config.dedup_retention(), Duration::from_secs(300));
    assert_eq!(config.optimistic_ttl(), Duration::from_secs(5));
    assert_eq!(config.retry_backoff(), Duration::from_secs(5));
    assert_eq!(config.hard_reset_cooldown(), Duration::from_secs(2));
    assert_eq!(config.event_buffer, 64);
}

#[test]
fn sync_config_partial_json_fills_defaults() {
    let config: SyncConfig =
        serde_json::from_str(r#"{ "optimistic_ttl_ms": 1500, "schema": "breeding" }"#).unwrap();
    assert_eq!(config.optimistic_ttl(), Duration::from_millis(1_500));
    assert_eq!(config.schema, "breeding");
    assert_eq!(config.dedup_capacity, 100);
}

#[test]
fn sync_config_serde_roundtrip() {
    let config = SyncConfig {
        retry_backoff_ms: 250,
        ..Default::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let back: SyncConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn rest_config_defaults() {
    let config = RestConfig::default();
    assert!(config.base_url.is_empty());
    assert_eq!(config.request_timeout_secs, 30);
}
