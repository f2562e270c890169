//! Tests for runtime adapters and the diagnostics surface

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use offline_pipeline::builders::PipelineBuilder;
use offline_pipeline::config::PipelineConfig;
use offline_pipeline::core::{ApiRequest, AsyncTransport, GateBlock, SerializedRequest, TransportError};
use offline_pipeline::infra::ManualConnectivity;
use offline_pipeline::runtime::{snapshot, TokioTransport};
use offline_pipeline::util::ResponseBody;

struct AsyncEcho;

#[async_trait]
impl AsyncTransport for AsyncEcho {
    async fn execute(&self, request: &SerializedRequest) -> Result<ResponseBody, TransportError> {
        tokio::task::yield_now().await;
        Ok(serde_json::json!({ "path": request.resource_path }))
    }
}

#[test]
fn test_async_transport_drives_pipeline() {
    let transport = Arc::new(TokioTransport::new(AsyncEcho).unwrap());
    let pipeline = PipelineBuilder::new(PipelineConfig::default())
        .transport(transport)
        .build()
        .unwrap();

    let (tx, rx) = crossbeam_channel::bounded(1);
    pipeline.submit(ApiRequest::post("api-key", "events/track").on_success(move |body| {
        let _ = tx.send(body);
    }));
    let body = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(body, serde_json::json!({ "path": "events/track" }));
    pipeline.shutdown();
}

#[test]
fn test_snapshot_reports_queue_and_gate() {
    let net = Arc::new(ManualConnectivity::new(false));
    let pipeline = PipelineBuilder::new(PipelineConfig::default())
        .transport(Arc::new(TokioTransport::new(AsyncEcho).unwrap()))
        .connectivity(net)
        .build()
        .unwrap();
    pipeline.submit(ApiRequest::post("api-key", "events/track"));
    assert!(pipeline.wait_for_idle(Duration::from_secs(5)));

    let snap = snapshot(&pipeline);
    assert_eq!(snap.pending.len(), 1);
    assert_eq!(snap.health.queue_len, Some(1));
    assert_eq!(snap.runner.last_block, Some(GateBlock::Offline));
    assert!(snap.runner.running);

    let json = snap.to_json().unwrap();
    assert!(json.contains("\"last_block\": \"offline\""));
    pipeline.shutdown();
}
