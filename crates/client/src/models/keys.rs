//! Models for key listing responses.

use serde::{Deserialize, Serialize};

/// One key as returned by the listing endpoint.
///
/// `metadata` is present only when the remote chose to embed it in the list
/// page; callers must be prepared to fetch it separately.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl KeyEntry {
    /// A bare key with no expiration or metadata.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expiration: None,
            metadata: None,
        }
    }
}

/// One page of the key listing.
#[derive(Debug, Clone, Default)]
pub struct KeyPage {
    pub keys: Vec<KeyEntry>,
    /// Opaque continuation token; `None` or empty means the listing is done.
    pub cursor: Option<String>,
}

impl KeyPage {
    /// Whether another page exists (implied by a non-empty cursor).
    pub fn has_more(&self) -> bool {
        self.cursor.as_deref().is_some_and(|c| !c.is_empty())
    }
}
