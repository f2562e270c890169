//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use offline_pipeline::config::{ConfigError, PipelineConfig, StoreBackendConfig};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn test_defaults() {
    let cfg = PipelineConfig::default();
    assert_eq!(cfg.max_queue_size, 1000);
    assert!(cfg.offline_mode_enabled);
    assert_eq!(cfg.retry_interval(), Some(Duration::from_secs(60)));
    assert_eq!(cfg.store, StoreBackendConfig::InMemory);
    assert!(cfg.endpoint_policy().is_deferrable("events/trackPurchase"));
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_zero_queue_size_is_invalid() {
    let cfg = PipelineConfig {
        max_queue_size: 0,
        ..PipelineConfig::default()
    };
    assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_empty_allow_list_only_valid_without_offline_mode() {
    let cfg = PipelineConfig {
        deferrable_endpoints: Vec::new(),
        ..PipelineConfig::default()
    };
    assert!(cfg.validate().is_err());

    let disabled = PipelineConfig {
        offline_mode_enabled: false,
        ..cfg
    };
    assert!(disabled.validate().is_ok());
}

#[test]
fn test_stream_name_must_be_a_file_stem() {
    let cfg = PipelineConfig {
        store: StoreBackendConfig::File {
            dir: PathBuf::from("/tmp/q"),
            stream: "../escape".into(),
        },
        ..PipelineConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_from_json_str_applies_defaults() {
    let cfg = PipelineConfig::from_json_str(
        r#"{
            "max_queue_size": 50,
            "retry_interval_secs": 0,
            "store": { "file": { "dir": "/var/lib/app/offline" } }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.max_queue_size, 50);
    assert_eq!(cfg.retry_interval(), None);
    assert!(cfg.offline_mode_enabled);
    assert_eq!(
        cfg.store,
        StoreBackendConfig::File {
            dir: PathBuf::from("/var/lib/app/offline"),
            stream: "offline_tasks".into(),
        }
    );
}

#[test]
fn test_from_json_str_rejects_garbage_and_invalid_values() {
    assert!(matches!(PipelineConfig::from_json_str("{"), Err(ConfigError::Parse(_))));
    assert!(matches!(
        PipelineConfig::from_json_str(r#"{"max_queue_size": 0}"#),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_env_overrides() {
    let cfg = PipelineConfig::from_lookup(lookup(&[
        ("OFFLINE_PIPELINE_MAX_QUEUE_SIZE", "25"),
        ("OFFLINE_PIPELINE_OFFLINE_MODE_ENABLED", "true"),
        ("OFFLINE_PIPELINE_DEFERRABLE_ENDPOINTS", "events/track, events/trackPurchase,"),
        ("OFFLINE_PIPELINE_RETRY_INTERVAL_SECS", "5"),
        ("OFFLINE_PIPELINE_STORE_DIR", "/data/queue"),
        ("OFFLINE_PIPELINE_STORE_STREAM", "tracking"),
    ]))
    .unwrap();

    assert_eq!(cfg.max_queue_size, 25);
    assert_eq!(cfg.deferrable_endpoints, vec!["events/track", "events/trackPurchase"]);
    assert_eq!(cfg.retry_interval(), Some(Duration::from_secs(5)));
    assert_eq!(
        cfg.store,
        StoreBackendConfig::File {
            dir: PathBuf::from("/data/queue"),
            stream: "tracking".into(),
        }
    );
}

#[test]
fn test_env_without_overrides_is_default() {
    assert_eq!(PipelineConfig::from_lookup(lookup(&[])).unwrap(), PipelineConfig::default());
}

#[test]
fn test_env_rejects_unparsable_value() {
    let err = PipelineConfig::from_lookup(lookup(&[("OFFLINE_PIPELINE_MAX_QUEUE_SIZE", "lots")])).unwrap_err();
    match err {
        ConfigError::Env { var, .. } => assert_eq!(var, "OFFLINE_PIPELINE_MAX_QUEUE_SIZE"),
        other => panic!("unexpected error: {other:?}"),
    }
}
