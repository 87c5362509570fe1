//! Metadata filtering pipeline: pager → chunker → probe pool → accumulator.
//!
//! Pages stream from the pager into a small channel (its bound is what
//! throttles enumeration to the probe rate), get chunked, and each chunk is
//! dispatched through the worker pool running the metadata probe plus the
//! predicate. Chunks are awaited one at a time: the chunk boundary is the
//! memory bound and the natural progress-reporting point.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

use crate::cache::MetadataCache;
use crate::deleter::KeyFailure;
use crate::error::{CancelCause, EngineError, Result};
use crate::pager::{self, ListPage, PagerOptions, PagerWarning};
use crate::pool::{PoolBounds, WorkerPool};
use crate::probe::{MetadataFilter, MetadataProbe};
use crate::progress::ProgressTracker;
use kvbulk_client::{KeyEntry, KvClient};
use kvbulk_config::constants::{
    ConcurrencyClass, DEFAULT_CHUNK_SIZE, DEFAULT_METADATA_DEADLINE_SECS,
};

/// Tuning knobs for one filter run.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Entries dispatched to the pool as one unit.
    pub chunk_size: usize,
    /// Probe workers; clamped into the metadata-probe class bounds.
    pub concurrency: Option<usize>,
    /// Listing page size (normalized by the client).
    pub list_limit: Option<u32>,
    /// Restrict enumeration to keys with this prefix.
    pub prefix: Option<String>,
    /// Pager deadline and page budget.
    pub pager: PagerOptions,
    /// Parse value bodies as JSON when no metadata exists.
    pub value_fallback: bool,
    /// Overall deadline for the whole run (enumeration plus probing).
    /// Expiry is a normal cancellation, not a fatal error.
    pub deadline: Duration,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: None,
            list_limit: None,
            prefix: None,
            pager: PagerOptions {
                operation: "filter",
                ..Default::default()
            },
            value_fallback: false,
            deadline: Duration::from_secs(DEFAULT_METADATA_DEADLINE_SECS),
        }
    }
}

/// What a filter run scanned and flagged, without the matched entries.
#[derive(Debug, Default)]
pub struct FilterSummary {
    pub scanned: u64,
    pub matched: u64,
    pub pages: usize,
    pub warnings: Vec<PagerWarning>,
    /// Probe errors; these keys were skipped, not treated as matches.
    pub probe_failures: Vec<KeyFailure>,
}

/// A filter run's matched entries plus its summary.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub matched: Vec<KeyEntry>,
    pub summary: FilterSummary,
}

/// Streams a namespace's keys through metadata probes.
pub struct FilterEngine {
    client: KvClient,
    namespace_id: String,
    cache: Option<Arc<MetadataCache>>,
    cancel: CancellationToken,
    progress: Arc<ProgressTracker>,
}

impl FilterEngine {
    pub fn new(
        client: KvClient,
        namespace_id: impl Into<String>,
        cancel: CancellationToken,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            client,
            namespace_id: namespace_id.into(),
            cache: None,
            cancel,
            progress,
        }
    }

    /// Wrap metadata lookups with a shared cache.
    pub fn with_cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run the filter and collect every matched entry.
    ///
    /// The accumulator is the shared-mutex pattern orchestrations rely on;
    /// `run_streaming` is the zero-copy variant for callers that drain
    /// matches as they appear.
    pub async fn run(
        &self,
        filter: &MetadataFilter,
        options: &FilterOptions,
    ) -> Result<FilterOutcome> {
        let accumulator: Arc<std::sync::Mutex<Vec<KeyEntry>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));

        let sink = accumulator.clone();
        let summary = self
            .run_streaming(filter, options, move |matched| {
                let sink = sink.clone();
                async move {
                    sink.lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .extend(matched);
                    Ok(())
                }
            })
            .await?;

        let matched = match Arc::try_unwrap(accumulator) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(|p| p.into_inner()),
            Err(shared) => shared
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .drain(..)
                .collect(),
        };
        Ok(FilterOutcome { matched, summary })
    }

    /// Run the filter, handing each chunk's matches to `on_match` as soon as
    /// the chunk completes. `on_match` returning an error cancels the run.
    pub async fn run_streaming<C, Fut>(
        &self,
        filter: &MetadataFilter,
        options: &FilterOptions,
        mut on_match: C,
    ) -> Result<FilterSummary>
    where
        C: FnMut(Vec<KeyEntry>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let chunk_size = options.chunk_size.max(1);
        let workers = ConcurrencyClass::MetadataProbe.clamp(options.concurrency);

        // The per-operation deadline is a cancellation signal with a timer:
        // everything below (pager, pool, chunk loop) hangs off this child
        // token, so expiry interrupts even a probe batch in flight.
        let batch_cancel = self.cancel.child_token();
        let _deadline_timer = AbortOnDropHandle::new(tokio::spawn({
            let token = batch_cancel.clone();
            let deadline = options.deadline;
            let operation = options.pager.operation;
            async move {
                tokio::time::sleep(deadline).await;
                warn!(
                    operation,
                    deadline_secs = deadline.as_secs(),
                    "metadata batch deadline elapsed, cancelling remaining work"
                );
                token.cancel();
            }
        }));

        let probe = MetadataProbe::new(self.client.clone(), self.namespace_id.clone())
            .with_value_fallback(options.value_fallback);
        let probe = match &self.cache {
            Some(cache) => probe.with_cache(cache.clone()),
            None => probe,
        };

        let filter_for_workers = filter.clone();
        let mut pool = WorkerPool::spawn(
            PoolBounds::fixed(workers),
            batch_cancel.child_token(),
            move |entry: KeyEntry| {
                let probe = probe.clone();
                let filter = filter_for_workers.clone();
                async move {
                    let result = probe.probe(&entry, &filter).await.map_err(EngineError::from)?;
                    Ok(result.matched.then_some(entry))
                }
            },
        );
        self.progress.set_workers(pool.current_workers() as u64);

        // The pager runs as its own task; this channel's small bound is the
        // backpressure that keeps enumeration at the probe rate.
        let (page_tx, mut page_rx) = mpsc::channel::<Vec<KeyEntry>>(2);
        let pager_task = {
            let client = self.client.clone();
            let namespace_id = self.namespace_id.clone();
            let list_limit = options.list_limit;
            let prefix = options.prefix.clone();
            let pager_options = options.pager.clone();
            let cancel = batch_cancel.clone();
            tokio::spawn(async move {
                pager::paginate_streaming(
                    move |cursor: Option<String>| {
                        let client = client.clone();
                        let namespace_id = namespace_id.clone();
                        let prefix = prefix.clone();
                        async move {
                            let page = client
                                .list_keys_page(
                                    &namespace_id,
                                    list_limit,
                                    cursor.as_deref(),
                                    prefix.as_deref(),
                                )
                                .await?;
                            Ok(ListPage {
                                items: page.keys,
                                cursor: page.cursor,
                            })
                        }
                    },
                    &pager_options,
                    &cancel,
                    |items| {
                        let tx = page_tx.clone();
                        async move {
                            tx.send(items).await.map_err(|_| {
                                EngineError::ConsumerStopped("filter pipeline closed".to_string())
                            })
                        }
                    },
                )
                .await
            })
        };

        let mut summary = FilterSummary::default();
        let mut pending: Vec<KeyEntry> = Vec::new();

        let pipeline: Result<()> = async {
            while let Some(items) = page_rx.recv().await {
                self.progress.add_fetched(items.len() as u64);
                pending.extend(items);
                while pending.len() >= chunk_size {
                    let rest = pending.split_off(chunk_size);
                    let chunk = std::mem::replace(&mut pending, rest);
                    self.process_chunk(chunk, &batch_cancel, &mut pool, &mut summary, &mut on_match)
                        .await?;
                }
            }
            if !pending.is_empty() {
                let chunk = std::mem::take(&mut pending);
                self.process_chunk(chunk, &batch_cancel, &mut pool, &mut summary, &mut on_match)
                    .await?;
            }
            Ok(())
        }
        .await;

        if let Err(e) = pipeline {
            pager_task.abort();
            return Err(self.classify_cancellation(e));
        }

        let pager_summary = match pager_task
            .await
            .map_err(|e| EngineError::Worker(format!("pager task failed: {e}")))?
        {
            Ok(pager_summary) => pager_summary,
            Err(e) => return Err(self.classify_cancellation(e)),
        };
        summary.pages = pager_summary.pages;
        summary.warnings = pager_summary.warnings;

        self.progress.set_total(summary.scanned as i64);
        self.progress.finish();
        debug!(
            scanned = summary.scanned,
            matched = summary.matched,
            pages = summary.pages,
            "filter run finished"
        );
        Ok(summary)
    }

    /// Rewrite a cancellation coming off the batch token: when the caller's
    /// own token is untouched, the deadline timer is what fired.
    fn classify_cancellation(&self, error: EngineError) -> EngineError {
        match error {
            EngineError::Cancelled { .. } if !self.cancel.is_cancelled() => EngineError::Cancelled {
                cause: CancelCause::DeadlineExceeded,
            },
            other => other,
        }
    }

    async fn process_chunk<C, Fut>(
        &self,
        chunk: Vec<KeyEntry>,
        cancel: &CancellationToken,
        pool: &mut WorkerPool<KeyEntry, Option<KeyEntry>>,
        summary: &mut FilterSummary,
        on_match: &mut C,
    ) -> Result<()>
    where
        C: FnMut(Vec<KeyEntry>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if cancel.is_cancelled() {
            return Err(EngineError::cancelled());
        }

        let chunk_len = chunk.len();
        let keys_by_index: Vec<String> = chunk.iter().map(|e| e.name.clone()).collect();
        let dispatch = pool.dispatch(chunk).await;
        if dispatch.cancelled {
            return Err(EngineError::cancelled());
        }

        let matched: Vec<KeyEntry> = dispatch
            .outputs
            .into_iter()
            .filter_map(|output| output.value)
            .collect();

        for failure in dispatch.failures {
            let key = keys_by_index
                .get(failure.index)
                .cloned()
                .unwrap_or_default();
            warn!(key = %key, error = %failure.error, "metadata probe failed, skipping key");
            summary.probe_failures.push(KeyFailure {
                key,
                error: failure.error.to_string(),
            });
        }

        summary.scanned += chunk_len as u64;
        summary.matched += matched.len() as u64;
        self.progress.add_processed(chunk_len as u64);
        self.progress.add_matched(matched.len() as u64);
        self.progress.set_workers(pool.current_workers() as u64);

        if !matched.is_empty() {
            on_match(matched).await?;
        }
        Ok(())
    }
}
