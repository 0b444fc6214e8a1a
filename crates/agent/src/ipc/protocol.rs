#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// One message received from the client. `params` stays untyped here; each
/// dispatch arm deserializes its own parameter shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// One message sent back to the client. Exactly one per request, correlated
/// by id; `result` and `error` are mutually exclusive and omitted when empty.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Response {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Success response. A null result is omitted from the wire entirely.
    pub fn ok(id: String, result: serde_json::Value) -> Self {
        Self {
            id,
            result: (!result.is_null()).then_some(result),
            error: None,
        }
    }

    pub fn err(id: String, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(message.into()),
        }
    }
}
