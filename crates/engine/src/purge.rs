//! Tag-based purge: filter composed with bulk deletion.
//!
//! The orchestrator streams matches out of the [`FilterEngine`]; once the
//! shared accumulator crosses its high-water mark, the accumulated keys are
//! swapped out (publish a fresh empty vector, operate on the owned
//! predecessor) and handed to the [`BulkDeleter`] in bounded batches. A
//! final drain runs when filtering completes. Dry-run counts matches and
//! deletes nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::MetadataCache;
use crate::deleter::{BulkDeleter, KeyFailure};
use crate::error::{CancelCause, EngineError, Result};
use crate::filter::{FilterEngine, FilterOptions};
use crate::pager::PagerWarning;
use crate::probe::MetadataFilter;
use crate::progress::ProgressTracker;
use kvbulk_client::{KeyEntry, KvClient};
use kvbulk_config::constants::{HIGH_WATER_MARK, MAX_BULK_DELETE_KEYS};

/// Phases of one purge orchestration, logged on transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgePhase {
    Init,
    Filtering,
    Draining,
    Deleting,
    Done,
    Cancelled,
}

/// Tuning knobs for one purge.
#[derive(Debug, Clone)]
pub struct PurgeOptions {
    /// Count matches without deleting anything.
    pub dry_run: bool,
    /// Accumulated matches that trigger a drain-and-delete pass.
    pub high_water: usize,
    /// Keys per bulk-delete call.
    pub batch_size: usize,
    /// Filter pipeline settings.
    pub filter: FilterOptions,
}

impl Default for PurgeOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            high_water: HIGH_WATER_MARK,
            batch_size: MAX_BULK_DELETE_KEYS,
            filter: FilterOptions::default(),
        }
    }
}

/// What a purge did. On cancellation this is still returned, with the cause
/// recorded, so callers always learn how far the purge got.
#[derive(Debug, Default)]
pub struct PurgeOutcome {
    pub matched: u64,
    pub deleted: u64,
    pub scanned: u64,
    pub warnings: Vec<PagerWarning>,
    pub failures: Vec<KeyFailure>,
    pub cancelled: Option<CancelCause>,
}

/// Matched keys shared between the filter pipeline and the drain passes.
///
/// One mutex per orchestration, held only during append and during the
/// swap-and-drain handoff. Draining publishes a fresh empty vector via
/// `mem::take`, so concurrent producers never observe the set being deleted.
pub struct MatchAccumulator {
    keys: std::sync::Mutex<Vec<String>>,
    total: AtomicU64,
}

impl MatchAccumulator {
    pub fn new() -> Self {
        Self {
            keys: std::sync::Mutex::new(Vec::new()),
            total: AtomicU64::new(0),
        }
    }

    /// Append matched keys; returns the live length after the append.
    pub fn extend(&self, entries: &[KeyEntry]) -> usize {
        let mut keys = self.lock();
        keys.extend(entries.iter().map(|e| e.name.clone()));
        self.total.fetch_add(entries.len() as u64, Ordering::Release);
        keys.len()
    }

    /// Swap the live vector for an empty one and return the predecessor.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    /// Total matches ever accumulated, across drains.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Live (undrained) length.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MatchAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Composes the filter engine and the bulk deleter into the purge operation.
pub struct PurgeOrchestrator {
    client: KvClient,
    namespace_id: String,
    cancel: CancellationToken,
    progress: Arc<ProgressTracker>,
    cache: Option<Arc<MetadataCache>>,
}

impl PurgeOrchestrator {
    pub fn new(
        client: KvClient,
        namespace_id: impl Into<String>,
        cancel: CancellationToken,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            client,
            namespace_id: namespace_id.into(),
            cancel,
            progress,
            cache: None,
        }
    }

    /// Wrap metadata lookups with a shared cache.
    pub fn with_cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Purge every key matching `filter`.
    ///
    /// Cancellation (caller token or deadline) returns the partial outcome
    /// with the cause recorded; the first fatal client error short-circuits
    /// with `Err`.
    pub async fn purge(
        &self,
        filter: &MetadataFilter,
        options: &PurgeOptions,
    ) -> Result<PurgeOutcome> {
        let mut phase = PurgePhase::Init;
        debug!(namespace = %self.namespace_id, dry_run = options.dry_run, "purge starting");

        let accumulator = Arc::new(MatchAccumulator::new());
        let deleter = BulkDeleter::new(
            self.client.clone(),
            self.namespace_id.clone(),
            self.cancel.clone(),
        );
        let deleted = Arc::new(AtomicU64::new(0));
        let failures: Arc<std::sync::Mutex<Vec<KeyFailure>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));

        let engine = {
            let engine = FilterEngine::new(
                self.client.clone(),
                self.namespace_id.clone(),
                self.cancel.clone(),
                self.progress.clone(),
            );
            match &self.cache {
                Some(cache) => engine.with_cache(cache.clone()),
                None => engine,
            }
        };

        set_phase(&mut phase, PurgePhase::Filtering);

        let dry_run = options.dry_run;
        let high_water = options.high_water.max(1);
        let batch_size = options.batch_size;
        let stream_result = engine
            .run_streaming(filter, &options.filter, |matched| {
                let accumulator = accumulator.clone();
                let deleter = deleter.clone();
                let deleted = deleted.clone();
                let failures = failures.clone();
                let progress = self.progress.clone();
                async move {
                    let live = accumulator.extend(&matched);
                    if dry_run || live < high_water {
                        return Ok(());
                    }
                    let drained = accumulator.drain();
                    debug!(drained = drained.len(), "high-water mark reached, draining");
                    let outcome = drain_batch(
                        &deleter,
                        drained,
                        batch_size,
                        &progress,
                    )
                    .await;
                    deleted.fetch_add(outcome.deleted as u64, Ordering::Release);
                    failures
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .extend(outcome.failures);
                    if outcome.cancelled {
                        return Err(EngineError::cancelled());
                    }
                    Ok(())
                }
            })
            .await;

        let mut outcome = PurgeOutcome::default();
        match stream_result {
            Ok(summary) => {
                outcome.scanned = summary.scanned;
                outcome.warnings = summary.warnings;
                // Probe failures are reported but never fatal.
                outcome.failures.extend(summary.probe_failures);

                if !dry_run && !accumulator.is_empty() {
                    set_phase(&mut phase, PurgePhase::Draining);
                    let drained = accumulator.drain();
                    set_phase(&mut phase, PurgePhase::Deleting);
                    let final_outcome =
                        drain_batch(&deleter, drained, batch_size, &self.progress).await;
                    deleted.fetch_add(final_outcome.deleted as u64, Ordering::Release);
                    failures
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .extend(final_outcome.failures);
                    if final_outcome.cancelled {
                        outcome.cancelled = Some(CancelCause::CallerRequested);
                    }
                }
                set_phase(&mut phase, PurgePhase::Done);
            }
            Err(e) => match e.cancel_cause() {
                Some(cause) => {
                    set_phase(&mut phase, PurgePhase::Cancelled);
                    outcome.cancelled = Some(cause);
                }
                None => return Err(e),
            },
        }

        outcome.matched = accumulator.total();
        outcome.deleted = deleted.load(Ordering::Acquire);
        outcome.failures.extend(
            failures
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .drain(..),
        );
        self.progress.finish();

        info!(
            namespace = %self.namespace_id,
            matched = outcome.matched,
            deleted = outcome.deleted,
            dry_run,
            cancelled = outcome.cancelled.is_some(),
            "purge finished"
        );
        Ok(outcome)
    }
}

/// Hand one drained set to the deleter in bounded batches, bumping the
/// shared counters after every successful batch.
async fn drain_batch(
    deleter: &BulkDeleter,
    keys: Vec<String>,
    batch_size: usize,
    progress: &Arc<ProgressTracker>,
) -> crate::deleter::DeleteOutcome {
    let tracker = progress.clone();
    deleter
        .delete_sequential_batches(
            &keys,
            batch_size,
            Some(Arc::new(move |n| {
                tracker.add_deleted(n as u64);
                tracker.report_now();
            })),
        )
        .await
}

fn set_phase(phase: &mut PurgePhase, next: PurgePhase) {
    debug!(from = ?phase, to = ?next, "purge phase transition");
    *phase = next;
}
