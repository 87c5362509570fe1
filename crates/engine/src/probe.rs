//! Per-key metadata probing and predicate evaluation.
//!
//! A probe decides whether one key matches a metadata predicate, fetching
//! the metadata as lazily as possible. The sources are tried as an explicit
//! state machine: metadata embedded in the list page, then the shared cache,
//! then a metadata GET, and only when enabled a value GET that is parsed as
//! JSON (for stores whose tag convention lives in the value body).

use std::sync::Arc;

use tracing::trace;

use crate::cache::MetadataCache;
use kvbulk_client::{ClientError, KeyEntry, KvClient};

/// Predicate evaluated against a key's metadata.
#[derive(Debug, Clone)]
pub enum MetadataFilter {
    /// The named field must be present; a non-empty expected value must
    /// additionally equal the field coerced to a string.
    Field {
        name: String,
        expected: Option<String>,
    },
    /// Free-text search: case-insensitive substring over every scalar in
    /// the metadata tree.
    Search { needle: String },
}

impl MetadataFilter {
    /// Field presence filter matching any value.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field {
            name: name.into(),
            expected: None,
        }
    }

    /// Field equality filter.
    pub fn field_equals(name: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::Field {
            name: name.into(),
            expected: Some(expected.into()),
        }
    }

    /// Deep-search filter.
    pub fn search(needle: impl Into<String>) -> Self {
        Self::Search {
            needle: needle.into(),
        }
    }

    /// Evaluate the predicate against a metadata document.
    pub fn matches(&self, metadata: &serde_json::Value) -> bool {
        match self {
            Self::Field { name, expected } => {
                let Some(field) = metadata.get(name) else {
                    return false;
                };
                match expected.as_deref() {
                    // An empty expected value matches any present field.
                    None | Some("") => true,
                    Some(expected) => coerce_to_string(field) == expected,
                }
            }
            Self::Search { needle } => {
                let needle = needle.to_lowercase();
                !needle.is_empty() && deep_contains(metadata, &needle)
            }
        }
    }
}

/// Coerce a JSON scalar to the string form used for equality comparison.
fn coerce_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Case-insensitive substring match over every scalar in the tree.
fn deep_contains(value: &serde_json::Value, needle_lower: &str) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => s.to_lowercase().contains(needle_lower),
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) => {
            value.to_string().contains(needle_lower)
        }
        serde_json::Value::Array(items) => items.iter().any(|v| deep_contains(v, needle_lower)),
        serde_json::Value::Object(map) => map.values().any(|v| deep_contains(v, needle_lower)),
    }
}

/// Where a probe found the metadata it evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeSource {
    /// Embedded in the listing response.
    Listed,
    /// The shared metadata cache.
    Cache,
    /// A dedicated metadata GET.
    MetadataFetch,
    /// The value body, parsed as JSON.
    ValueScan,
}

/// Outcome of probing one key.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub matched: bool,
    /// The metadata that was evaluated, owned by the caller thereafter.
    pub metadata: Option<serde_json::Value>,
    /// `None` when the key has no metadata anywhere.
    pub source: Option<ProbeSource>,
}

impl ProbeResult {
    fn absent() -> Self {
        Self {
            matched: false,
            metadata: None,
            source: None,
        }
    }
}

/// Probes keys for metadata matches, one HTTP call at most per key.
#[derive(Clone)]
pub struct MetadataProbe {
    client: KvClient,
    namespace_id: String,
    cache: Option<Arc<MetadataCache>>,
    value_fallback: bool,
}

impl MetadataProbe {
    pub fn new(client: KvClient, namespace_id: impl Into<String>) -> Self {
        Self {
            client,
            namespace_id: namespace_id.into(),
            cache: None,
            value_fallback: false,
        }
    }

    /// Wrap lookups with a shared cache.
    pub fn with_cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Also try parsing the value body as JSON when no metadata exists.
    pub fn with_value_fallback(mut self, enabled: bool) -> Self {
        self.value_fallback = enabled;
        self
    }

    /// Decide whether `entry` matches `filter`, fetching metadata only when
    /// the listing did not carry it.
    pub async fn probe(
        &self,
        entry: &KeyEntry,
        filter: &MetadataFilter,
    ) -> Result<ProbeResult, ClientError> {
        let mut source = ProbeSource::Listed;
        loop {
            match source {
                ProbeSource::Listed => {
                    if let Some(metadata) = &entry.metadata {
                        trace!(key = %entry.name, "evaluating metadata from list page");
                        return Ok(self.evaluate(metadata.clone(), filter, ProbeSource::Listed));
                    }
                    source = ProbeSource::Cache;
                }
                ProbeSource::Cache => {
                    if let Some(cache) = &self.cache
                        && let Some(metadata) = cache.get(&entry.name)
                    {
                        trace!(key = %entry.name, "evaluating cached metadata");
                        return Ok(self.evaluate(metadata, filter, ProbeSource::Cache));
                    }
                    source = ProbeSource::MetadataFetch;
                }
                ProbeSource::MetadataFetch => {
                    match self
                        .client
                        .get_metadata(&self.namespace_id, &entry.name)
                        .await?
                    {
                        Some(metadata) => {
                            if let Some(cache) = &self.cache {
                                cache.set(&entry.name, metadata.clone());
                            }
                            return Ok(self.evaluate(
                                metadata,
                                filter,
                                ProbeSource::MetadataFetch,
                            ));
                        }
                        None if self.value_fallback => source = ProbeSource::ValueScan,
                        None => return Ok(ProbeResult::absent()),
                    }
                }
                ProbeSource::ValueScan => {
                    let Some(body) = self
                        .client
                        .get_value(&self.namespace_id, &entry.name)
                        .await?
                    else {
                        return Ok(ProbeResult::absent());
                    };
                    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&body) else {
                        return Ok(ProbeResult::absent());
                    };
                    if !parsed.is_object() {
                        return Ok(ProbeResult::absent());
                    }
                    return Ok(self.evaluate(parsed, filter, ProbeSource::ValueScan));
                }
            }
        }
    }

    fn evaluate(
        &self,
        metadata: serde_json::Value,
        filter: &MetadataFilter,
        source: ProbeSource,
    ) -> ProbeResult {
        ProbeResult {
            matched: filter.matches(&metadata),
            metadata: Some(metadata),
            source: Some(source),
        }
    }
}
