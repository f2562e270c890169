//! Tests for HTTP status classification and the serialized request format

use offline_pipeline::core::{classify_response, ApiRequest, HttpMethod, SerializedRequest, TransportError};

#[test]
fn test_success_statuses() {
    assert_eq!(
        classify_response(200, Some(serde_json::json!({ "ok": true }))).unwrap(),
        serde_json::json!({ "ok": true })
    );
    assert_eq!(classify_response(204, None).unwrap(), serde_json::Value::Null);
}

#[test]
fn test_retryable_statuses() {
    for status in [408, 429, 500, 502, 503, 599] {
        let err = classify_response(status, None).unwrap_err();
        assert!(err.is_retryable(), "{status} should be retryable");
        assert!(matches!(err, TransportError::Retryable { status: Some(s), .. } if s == status));
    }
}

#[test]
fn test_unauthorized_requests_auth_refresh() {
    let err = classify_response(401, None).unwrap_err();
    assert!(matches!(err, TransportError::AuthRefresh { .. }));
    assert!(err.is_retryable());
}

#[test]
fn test_other_statuses_are_permanent() {
    let body = serde_json::json!({ "code": "InvalidEmailException" });
    match classify_response(400, Some(body.clone())).unwrap_err() {
        TransportError::Permanent { status, body: Some(b), .. } => {
            assert_eq!(status, 400);
            assert_eq!(b, body);
        }
        other => panic!("unexpected classification: {other:?}"),
    }
    for status in [302, 403, 404, 409, 422] {
        assert!(!classify_response(status, None).unwrap_err().is_retryable());
    }
}

#[test]
fn test_payload_keeps_field_order_and_omits_missing_token() {
    let request = ApiRequest::post("api-key", "events/track")
        .with_field("zeta", 1)
        .with_field("alpha", 2)
        .request;
    let payload = request.to_payload().unwrap();
    assert!(payload.find("zeta").unwrap() < payload.find("alpha").unwrap());
    assert!(!payload.contains("auth_token"));

    let decoded = SerializedRequest::from_payload(&payload).unwrap();
    assert_eq!(decoded.method, HttpMethod::Post);
    assert_eq!(decoded.body.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
}
