//! Tests for pipeline construction

use std::sync::Arc;
use std::time::Duration;

use offline_pipeline::builders::{open_store, PipelineBuilder};
use offline_pipeline::config::{PipelineConfig, StoreBackendConfig};
use offline_pipeline::core::{
    ApiRequest, Outcome, PipelineError, SerializedRequest, TaskStore, Transport, TransportError,
};
use offline_pipeline::infra::ManualConnectivity;
use offline_pipeline::util::ResponseBody;

struct NullTransport;

impl Transport for NullTransport {
    fn execute(&self, _: &SerializedRequest) -> Result<ResponseBody, TransportError> {
        Ok(ResponseBody::Null)
    }
}

#[test]
fn test_transport_is_required() {
    let err = PipelineBuilder::new(PipelineConfig::default()).build().unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
}

#[test]
fn test_invalid_config_is_rejected() {
    let cfg = PipelineConfig {
        max_queue_size: 0,
        ..PipelineConfig::default()
    };
    let err = PipelineBuilder::new(cfg)
        .transport(Arc::new(NullTransport))
        .build()
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
}

#[test]
fn test_builds_with_defaults() {
    let pipeline = PipelineBuilder::new(PipelineConfig::default())
        .transport(Arc::new(NullTransport))
        .build()
        .unwrap();
    assert!(pipeline.is_deferrable("events/track"));
    assert!(matches!(
        pipeline.submit(ApiRequest::post("api-key", "events/track")),
        Outcome::Deferred(_)
    ));
    // No connectivity signal means always online.
    assert!(pipeline.wait_for_idle(Duration::from_secs(5)));
    assert_eq!(pipeline.health().queue_len, Some(0));
    assert_eq!(pipeline.health().max_queue_size, 1000);
    pipeline.shutdown();
}

#[test]
fn test_file_backend_is_opened_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = PipelineConfig {
        store: StoreBackendConfig::File {
            dir: dir.path().join("nested"),
            stream: "queue".into(),
        },
        ..PipelineConfig::default()
    };
    let pipeline = PipelineBuilder::new(cfg)
        .transport(Arc::new(NullTransport))
        .connectivity(Arc::new(ManualConnectivity::new(false)))
        .build()
        .unwrap();
    pipeline.submit(ApiRequest::post("api-key", "events/track"));
    pipeline.shutdown();

    assert!(dir.path().join("nested").join("queue.jsonl").exists());
    let store = open_store(&StoreBackendConfig::File {
        dir: dir.path().join("nested"),
        stream: "queue".into(),
    })
    .unwrap();
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_builder_from_lookup_reads_prefixed_variables() {
    let dir = tempfile::tempdir().unwrap();
    let store_dir = dir.path().to_string_lossy().into_owned();
    let builder = PipelineBuilder::from_lookup(|name| match name {
        "OFFLINE_PIPELINE_MAX_QUEUE_SIZE" => Some("5".into()),
        "OFFLINE_PIPELINE_STORE_DIR" => Some(store_dir.clone()),
        _ => None,
    })
    .unwrap();
    let pipeline = builder
        .transport(Arc::new(NullTransport))
        .connectivity(Arc::new(ManualConnectivity::new(false)))
        .build()
        .unwrap();
    assert_eq!(pipeline.health().max_queue_size, 5);
    assert!(matches!(
        pipeline.submit(ApiRequest::post("api-key", "events/track")),
        Outcome::Deferred(_)
    ));
    pipeline.shutdown();
    assert!(dir.path().join("offline_tasks.jsonl").exists());
}

#[test]
fn test_builder_from_lookup_reports_bad_variable_with_context() {
    let err = PipelineBuilder::from_lookup(|name| {
        (name == "OFFLINE_PIPELINE_MAX_QUEUE_SIZE").then(|| "lots".to_string())
    })
    .unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.starts_with("loading offline pipeline configuration"), "{chain}");
    assert!(chain.contains("OFFLINE_PIPELINE_MAX_QUEUE_SIZE"), "{chain}");
}
