//! Models for bulk write and bulk delete requests.

use serde::{Deserialize, Serialize};

/// One item of a bulk write request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WriteItem {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl WriteItem {
    /// A plain key/value pair with no expiration or metadata.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expiration: None,
            expiration_ttl: None,
            metadata: None,
        }
    }
}

/// Result payload of a bulk write. Newer API versions report per-key
/// outcomes; older ones return `null`, so every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkWriteResult {
    #[serde(default)]
    pub successful_key_count: Option<u64>,
    #[serde(default)]
    pub unsuccessful_keys: Option<Vec<String>>,
}

/// Body item for the fallback bulk-delete verb, which takes objects rather
/// than bare strings.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteName {
    pub name: String,
}
