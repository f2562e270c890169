//! Tests for error types

use offline_pipeline::config::ConfigError;
use offline_pipeline::core::{PipelineError, StoreError, TransportError};

#[test]
fn test_store_error_display() {
    let err = StoreError::Corrupt("duplicate record".to_string());
    assert_eq!(format!("{err}"), "store corrupt: duplicate record");

    let io = StoreError::from(std::io::Error::other("disk full"));
    assert_eq!(format!("{io}"), "store io error: disk full");
}

#[test]
fn test_pipeline_error_wraps_store_error_transparently() {
    let err = PipelineError::from(StoreError::Corrupt("bad".to_string()));
    assert_eq!(format!("{err}"), "store corrupt: bad");
    assert!(matches!(err, PipelineError::Store(StoreError::Corrupt(_))));
}

#[test]
fn test_shutdown_error() {
    assert_eq!(format!("{}", PipelineError::Shutdown), "pipeline has been shut down");
}

#[test]
fn test_transport_error_classes() {
    assert!(TransportError::retryable("timeout").is_retryable());
    assert!(TransportError::AuthRefresh { reason: "expired".into() }.is_retryable());
    assert!(!TransportError::permanent(404, "not found").is_retryable());
    assert_eq!(
        format!("{}", TransportError::permanent(404, "not found")),
        "permanent transport failure (404): not found"
    );
}

#[test]
fn test_config_error_display() {
    let err = ConfigError::Env {
        var: "OFFLINE_PIPELINE_MAX_QUEUE_SIZE".into(),
        reason: "invalid digit found in string".into(),
    };
    assert_eq!(
        format!("{err}"),
        "invalid value for OFFLINE_PIPELINE_MAX_QUEUE_SIZE: invalid digit found in string"
    );
}

#[test]
fn test_app_result_accepts_pipeline_errors() {
    fn host_glue() -> offline_pipeline::core::AppResult<()> {
        let result: Result<(), PipelineError> = Err(PipelineError::Shutdown);
        result?;
        Ok(())
    }
    assert_eq!(host_glue().unwrap_err().to_string(), "pipeline has been shut down");
}
