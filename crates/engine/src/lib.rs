//! Concurrent orchestration engine for bulk KV operations.
//!
//! This crate turns millions of individual remote operations into bounded,
//! observable, fault-tolerant pipelines: cursor-paginated enumeration with
//! loop and deadline detection, bounded-concurrency worker pools, adaptive
//! bulk deletion with binary-search isolation of rejecting keys, and the
//! filter/purge pipeline that composes them with a streaming chunk model.
//!
//! The thin HTTP wrappers live in `kvbulk-client`; everything here is about
//! fan-out, accounting and failure containment.

#![cfg_attr(not(test), warn(clippy::unwrap_used))]

pub mod cache;
pub mod deleter;
pub mod error;
pub mod export;
pub mod filter;
pub mod pager;
pub mod pool;
pub mod probe;
pub mod progress;
pub mod purge;
pub mod writer;

pub use cache::{CacheStats, MetadataCache};
pub use deleter::{BatchProgressFn, BulkDeleter, DeleteOutcome, IsolationOutcome, KeyFailure};
pub use error::{CancelCause, EngineError, Result};
pub use export::{ExportOutcome, ExportedEntry, Exporter, ListOptions};
pub use filter::{FilterEngine, FilterOptions, FilterOutcome, FilterSummary};
pub use pager::{ListPage, PagerOptions, PagerOutcome, PagerSummary, PagerWarning};
pub use pool::{DispatchOutcome, PoolBounds, WorkFailure, WorkItem, WorkOutput, WorkerPool};
pub use probe::{MetadataFilter, MetadataProbe, ProbeResult, ProbeSource};
pub use progress::{ProgressFn, ProgressSnapshot, ProgressTracker};
pub use purge::{MatchAccumulator, PurgeOptions, PurgeOrchestrator, PurgeOutcome, PurgePhase};
pub use writer::{BulkWriter, WriteOutcome};
