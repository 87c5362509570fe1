//! Common types shared across remote API models.
//!
//! Every endpoint wraps its payload in the same envelope; this module owns
//! that envelope and the helpers that turn it into a typed result.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// A single message from the remote API (usually in error responses).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

/// Pagination info attached to list responses.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ResultInfo {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}

/// Generic remote API response wrapper.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
    #[serde(default = "none_result")]
    pub result: Option<T>,
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
}

fn none_result<T>() -> Option<T> {
    None
}

impl<T> ApiEnvelope<T> {
    /// First error message, if the envelope carries one.
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(|e| e.message.as_str())
    }

    /// Unwrap the payload, mapping `success == false` to an envelope failure
    /// and a missing payload to an invalid-response error.
    pub fn into_result(self, operation: &'static str) -> Result<T> {
        if !self.success {
            return Err(ClientError::EnvelopeFailure {
                operation,
                message: self
                    .first_error()
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
        self.result.ok_or_else(|| {
            ClientError::InvalidResponse(format!("missing result for {operation}"))
        })
    }

    /// Check `success` only, for operations whose payload is `null`.
    pub fn expect_success(self, operation: &'static str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(ClientError::EnvelopeFailure {
                operation,
                message: self
                    .first_error()
                    .unwrap_or("unknown error")
                    .to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success_with_result() {
        let json = r#"{"success": true, "errors": [], "messages": [], "result": {"id": "ns1"}}"#;
        let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(json).unwrap();
        let value = envelope.into_result("get namespace").unwrap();
        assert_eq!(value["id"], "ns1");
    }

    #[test]
    fn test_envelope_failure_carries_first_message() {
        let json = r#"{
            "success": false,
            "errors": [{"code": 10013, "message": "namespace not found"}],
            "messages": [],
            "result": null
        }"#;
        let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(json).unwrap();
        let err = envelope.into_result("list keys").unwrap_err();
        assert_eq!(err.to_string(), "failed to list keys: namespace not found");
    }

    #[test]
    fn test_expect_success_with_null_result() {
        let json = r#"{"success": true, "errors": [], "messages": [], "result": null}"#;
        let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(json).unwrap();
        envelope.expect_success("delete keys").unwrap();
    }

    #[test]
    fn test_result_info_cursor() {
        let json = r#"{
            "success": true,
            "errors": [],
            "messages": [],
            "result": [],
            "result_info": {"cursor": "abc", "count": 42}
        }"#;
        let envelope: ApiEnvelope<Vec<serde_json::Value>> = serde_json::from_str(json).unwrap();
        let info = envelope.result_info.clone().unwrap();
        assert_eq!(info.cursor.as_deref(), Some("abc"));
        assert_eq!(info.count, Some(42));
    }
}
