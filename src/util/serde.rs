//! Shared identifier and payload aliases.

/// Process-unique task identifier (UUID v4 text).
pub type TaskId = String;

/// Structured response document returned by the transport.
pub type ResponseBody = serde_json::Value;

/// Order-preserving key/value request document.
pub type RequestBody = serde_json::Map<String, serde_json::Value>;

/// Generate a fresh task identifier.
#[must_use]
pub fn new_task_id() -> TaskId {
    uuid::Uuid::new_v4().to_string()
}
