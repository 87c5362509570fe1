//! Centralized constants for the kv-bulk workspace.
//!
//! This module contains default values and remote API limits used across
//! crates to avoid magic number duplication.

// =============================================================================
// Remote API Limits
// =============================================================================

/// Smallest page size the remote key listing accepts.
pub const MIN_LIST_LIMIT: u32 = 10;

/// Largest page size the remote key listing accepts.
pub const MAX_LIST_LIMIT: u32 = 1000;

/// Page size used when the caller passes zero or nothing.
pub const DEFAULT_LIST_LIMIT: u32 = 1000;

/// Maximum number of keys a single bulk-delete call accepts.
pub const MAX_BULK_DELETE_KEYS: usize = 1000;

/// Maximum number of items a single bulk-write call accepts.
pub const MAX_BULK_WRITE_ITEMS: usize = 10_000;

// =============================================================================
// Connection & Retry Defaults
// =============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default maximum number of retries for rate-limited requests.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Default maximum number of HTTP redirects to follow.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Default sustained request rate against the remote API (requests/second).
///
/// The public API allows 1,200 requests per 5 minutes; 4/s keeps a margin.
pub const DEFAULT_RATE_LIMIT_RPS: f64 = 4.0;

/// Default burst capacity of the request token bucket.
pub const DEFAULT_RATE_LIMIT_BURST: f64 = 50.0;

/// Default base URL of the remote API.
pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

// =============================================================================
// Orchestration Defaults
// =============================================================================

/// Default deadline for a full key enumeration in seconds.
pub const DEFAULT_ENUMERATION_DEADLINE_SECS: u64 = 120;

/// Default deadline for a metadata probe batch in seconds.
pub const DEFAULT_METADATA_DEADLINE_SECS: u64 = 300;

/// Accumulated-matches threshold that triggers a drain-and-delete pass.
pub const HIGH_WATER_MARK: usize = 1000;

/// Number of entries dispatched to the worker pool as one chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Progress callbacks fire at most once per this many completed items.
pub const PROGRESS_REPORT_INTERVAL: u64 = 100;

/// Input queues to worker pools hold this many items per worker.
pub const POOL_QUEUE_FACTOR: usize = 2;

// =============================================================================
// Metadata Cache Defaults
// =============================================================================

/// Default maximum number of cached metadata entries.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

/// Default maximum total size of cached metadata in bytes (50 MiB).
pub const DEFAULT_CACHE_MAX_BYTES: usize = 50 * 1024 * 1024;

/// Default time-to-live of a cached metadata entry in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

// =============================================================================
// Concurrency Bounds
// =============================================================================

/// Operation classes with distinct concurrency defaults and caps.
///
/// Every orchestration normalizes its requested worker count through
/// [`ConcurrencyClass::clamp`] at entry, so downstream code never sees a
/// value outside the class bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyClass {
    /// Bulk write batches.
    BulkWrite,
    /// Bulk delete batches.
    BulkDelete,
    /// Per-key value fetch (export).
    ValueFetch,
    /// Per-key metadata probe.
    MetadataProbe,
    /// Parallel page enumeration.
    PageFetch,
}

impl ConcurrencyClass {
    /// Worker count used when the caller does not ask for one.
    pub const fn default_workers(self) -> usize {
        match self {
            Self::BulkWrite | Self::BulkDelete => 20,
            Self::ValueFetch => 10,
            Self::MetadataProbe => 50,
            Self::PageFetch => 5,
        }
    }

    /// Smallest worker count the class allows.
    pub const fn floor(self) -> usize {
        1
    }

    /// Largest worker count the class allows, if bounded.
    pub const fn ceiling(self) -> Option<usize> {
        match self {
            Self::BulkWrite | Self::BulkDelete => Some(100),
            Self::ValueFetch => Some(50),
            Self::MetadataProbe => Some(1000),
            Self::PageFetch => None,
        }
    }

    /// Normalize a requested worker count into the class bounds.
    ///
    /// `None` or zero selects the class default; anything else is clamped to
    /// `[floor, ceiling]`.
    pub fn clamp(self, requested: Option<usize>) -> usize {
        let requested = match requested {
            None | Some(0) => self.default_workers(),
            Some(n) => n,
        };
        let floored = requested.max(self.floor());
        match self.ceiling() {
            Some(cap) => floored.min(cap),
            None => floored,
        }
    }
}

/// Normalize a requested listing page size into the remote API bounds.
///
/// Zero (or an absent value) selects [`DEFAULT_LIST_LIMIT`]; anything below
/// the remote minimum is raised, anything above the maximum is clamped.
pub fn normalize_list_limit(requested: Option<u32>) -> u32 {
    match requested {
        None | Some(0) => DEFAULT_LIST_LIMIT,
        Some(n) => n.clamp(MIN_LIST_LIMIT, MAX_LIST_LIMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clamp_defaults() {
        assert_eq!(ConcurrencyClass::BulkWrite.clamp(None), 20);
        assert_eq!(ConcurrencyClass::BulkDelete.clamp(Some(0)), 20);
        assert_eq!(ConcurrencyClass::ValueFetch.clamp(None), 10);
        assert_eq!(ConcurrencyClass::MetadataProbe.clamp(None), 50);
        assert_eq!(ConcurrencyClass::PageFetch.clamp(None), 5);
    }

    #[test]
    fn test_clamp_bounds() {
        assert_eq!(ConcurrencyClass::BulkWrite.clamp(Some(500)), 100);
        assert_eq!(ConcurrencyClass::ValueFetch.clamp(Some(200)), 50);
        assert_eq!(ConcurrencyClass::MetadataProbe.clamp(Some(5000)), 1000);
        // Page enumeration has no ceiling.
        assert_eq!(ConcurrencyClass::PageFetch.clamp(Some(64)), 64);
    }

    #[test]
    fn test_normalize_list_limit() {
        assert_eq!(normalize_list_limit(None), 1000);
        assert_eq!(normalize_list_limit(Some(0)), 1000);
        assert_eq!(normalize_list_limit(Some(5)), 10);
        assert_eq!(normalize_list_limit(Some(10)), 10);
        assert_eq!(normalize_list_limit(Some(250)), 250);
        assert_eq!(normalize_list_limit(Some(5000)), 1000);
    }

    proptest! {
        #[test]
        fn prop_list_limit_always_in_bounds(requested in proptest::option::of(any::<u32>())) {
            let limit = normalize_list_limit(requested);
            prop_assert!((MIN_LIST_LIMIT..=MAX_LIST_LIMIT).contains(&limit));
        }

        #[test]
        fn prop_clamp_respects_class_bounds(requested in proptest::option::of(any::<usize>())) {
            for class in [
                ConcurrencyClass::BulkWrite,
                ConcurrencyClass::BulkDelete,
                ConcurrencyClass::ValueFetch,
                ConcurrencyClass::MetadataProbe,
                ConcurrencyClass::PageFetch,
            ] {
                let workers = class.clamp(requested);
                prop_assert!(workers >= class.floor());
                if let Some(cap) = class.ceiling() {
                    prop_assert!(workers <= cap);
                }
            }
        }
    }
}
