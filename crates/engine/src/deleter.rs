//! Adaptive bulk deletion with binary-search isolation.
//!
//! The happy path is one bulk call per batch. When the remote rejects a
//! batch, [`BulkDeleter::delete_with_isolation`] bisects it recursively to
//! find the offending keys: halves are retried as smaller bulks (the two
//! halves run concurrently), and an isolated singleton falls back to a
//! single-key DELETE. A residual singleton failure is recorded per key and
//! never fails the surrounding orchestration.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::pool::{PoolBounds, WorkerPool};
use kvbulk_client::KvClient;
use kvbulk_config::constants::{ConcurrencyClass, MAX_BULK_DELETE_KEYS};

/// A key that could not be deleted, with the remote's reason.
#[derive(Debug, Clone)]
pub struct KeyFailure {
    pub key: String,
    pub error: String,
}

/// Result of a multi-batch delete run.
#[derive(Debug, Default)]
pub struct DeleteOutcome {
    /// Keys confirmed deleted.
    pub deleted: usize,
    /// Per-key (or per-batch) failures; never abort the remaining batches.
    pub failures: Vec<KeyFailure>,
    /// First error observed, for the caller's summary line.
    pub first_error: Option<String>,
    /// True when cancellation cut the run short.
    pub cancelled: bool,
}

/// Result of a bisection run: every input key lands in exactly one list.
#[derive(Debug, Default)]
pub struct IsolationOutcome {
    pub deleted: Vec<String>,
    pub failures: Vec<KeyFailure>,
}

/// Per-batch progress callback: receives the number of keys deleted by the
/// batch that just finished. Invoked from worker tasks.
pub type BatchProgressFn = Arc<dyn Fn(usize) + Send + Sync>;

/// Deletes batches of keys against one namespace.
#[derive(Clone)]
pub struct BulkDeleter {
    client: KvClient,
    namespace_id: String,
    cancel: CancellationToken,
}

impl BulkDeleter {
    pub fn new(
        client: KvClient,
        namespace_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            namespace_id: namespace_id.into(),
            cancel,
        }
    }

    /// Normalize a requested batch size into `1..=MAX_BULK_DELETE_KEYS`.
    fn clamp_batch(batch_size: usize) -> usize {
        if batch_size == 0 {
            MAX_BULK_DELETE_KEYS
        } else {
            batch_size.min(MAX_BULK_DELETE_KEYS)
        }
    }

    /// Attempt one bulk call for the whole batch. All-or-nothing from the
    /// remote's perspective.
    pub async fn delete_batch(&self, keys: &[String]) -> Result<usize> {
        self.client.bulk_delete(&self.namespace_id, keys).await?;
        Ok(keys.len())
    }

    /// Delete with recursive bisection: a failing bulk is split in half and
    /// each half retried concurrently until the rejecting keys are isolated.
    ///
    /// Total bulk calls are O(f · log n) for f failing keys in a batch of n.
    pub async fn delete_with_isolation(&self, keys: Vec<String>) -> Result<IsolationOutcome> {
        let total = keys.len();
        let outcome = self.isolate(keys).await?;
        debug!(
            total,
            deleted = outcome.deleted.len(),
            failed = outcome.failures.len(),
            "isolation finished"
        );
        Ok(outcome)
    }

    fn isolate(&self, keys: Vec<String>) -> BoxFuture<'_, Result<IsolationOutcome>> {
        async move {
            if self.cancel.is_cancelled() {
                return Err(EngineError::cancelled());
            }
            let mut outcome = IsolationOutcome::default();
            match keys.len() {
                0 => return Ok(outcome),
                1 => {
                    if let Some(key) = keys.into_iter().next() {
                        match self.client.delete_value(&self.namespace_id, &key).await {
                            Ok(()) => outcome.deleted.push(key),
                            Err(e) => {
                                warn!(key = %key, error = %e, "isolated key rejected by single delete");
                                outcome.failures.push(KeyFailure {
                                    key,
                                    error: e.to_string(),
                                });
                            }
                        }
                    }
                    return Ok(outcome);
                }
                _ => {}
            }

            match self.client.bulk_delete(&self.namespace_id, &keys).await {
                Ok(()) => {
                    outcome.deleted = keys;
                    Ok(outcome)
                }
                Err(e) => {
                    debug!(
                        batch = keys.len(),
                        error = %e,
                        "bulk delete rejected, bisecting"
                    );
                    let mid = keys.len() / 2;
                    let mut left = keys;
                    let right = left.split_off(mid);
                    let (left_outcome, right_outcome) =
                        tokio::join!(self.isolate(left), self.isolate(right));
                    let (mut left_outcome, right_outcome) = (left_outcome?, right_outcome?);
                    left_outcome.deleted.extend(right_outcome.deleted);
                    left_outcome.failures.extend(right_outcome.failures);
                    Ok(left_outcome)
                }
            }
        }
        .boxed()
    }

    /// Split `keys` into batches of `batch_size` and delete them serially.
    pub async fn delete_sequential_batches(
        &self,
        keys: &[String],
        batch_size: usize,
        progress: Option<BatchProgressFn>,
    ) -> DeleteOutcome {
        let batch_size = Self::clamp_batch(batch_size);
        let mut outcome = DeleteOutcome::default();

        for chunk in keys.chunks(batch_size) {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            match self.delete_batch(chunk).await {
                Ok(n) => {
                    outcome.deleted += n;
                    if let Some(progress) = &progress {
                        progress(n);
                    }
                }
                Err(e) => {
                    warn!(batch = chunk.len(), error = %e, "delete batch failed, continuing");
                    record_batch_failure(&mut outcome, chunk, &e);
                }
            }
        }
        outcome
    }

    /// Split `keys` into batches and run them through a worker pool.
    pub async fn delete_concurrent_batches(
        &self,
        keys: &[String],
        batch_size: usize,
        concurrency: Option<usize>,
        progress: Option<BatchProgressFn>,
    ) -> DeleteOutcome {
        let batch_size = Self::clamp_batch(batch_size);
        let workers = ConcurrencyClass::BulkDelete.clamp(concurrency);
        let batches: Vec<Vec<String>> = keys.chunks(batch_size).map(|c| c.to_vec()).collect();

        let deleter = self.clone();
        let mut pool = WorkerPool::spawn(
            PoolBounds::fixed(workers),
            self.cancel.child_token(),
            move |batch: Vec<String>| {
                let deleter = deleter.clone();
                let progress = progress.clone();
                async move {
                    let n = deleter.delete_batch(&batch).await.map_err(|e| {
                        EngineError::Worker(format!("batch of {} keys failed: {e}", batch.len()))
                    })?;
                    if let Some(progress) = &progress {
                        progress(n);
                    }
                    Ok(n)
                }
            },
        );

        let dispatch = pool.dispatch(batches.clone()).await;
        let mut outcome = DeleteOutcome {
            cancelled: dispatch.cancelled,
            ..Default::default()
        };
        for output in dispatch.outputs {
            outcome.deleted += output.value;
        }
        for failure in dispatch.failures {
            let message = failure.error.to_string();
            if let Some(batch) = batches.get(failure.index) {
                record_batch_failure_message(&mut outcome, batch, &message);
            } else {
                outcome.first_error.get_or_insert(message);
            }
        }
        outcome
    }

    /// One bulk attempt; on failure, fall back to per-key deletes for the
    /// whole batch. Succeeds when at least one key was deleted.
    pub async fn delete_batch_with_fallback(&self, keys: &[String]) -> Result<DeleteOutcome> {
        match self.delete_batch(keys).await {
            Ok(n) => Ok(DeleteOutcome {
                deleted: n,
                ..Default::default()
            }),
            Err(bulk_error) => {
                debug!(error = %bulk_error, "bulk delete failed, trying per-key fallback");
                let mut outcome = DeleteOutcome::default();
                for key in keys {
                    if self.cancel.is_cancelled() {
                        outcome.cancelled = true;
                        break;
                    }
                    match self.client.delete_value(&self.namespace_id, key).await {
                        Ok(()) => outcome.deleted += 1,
                        Err(e) => {
                            outcome.first_error.get_or_insert(e.to_string());
                            outcome.failures.push(KeyFailure {
                                key: key.clone(),
                                error: e.to_string(),
                            });
                        }
                    }
                }
                if outcome.deleted == 0 && !outcome.cancelled {
                    return Err(bulk_error);
                }
                Ok(outcome)
            }
        }
    }
}

fn record_batch_failure(outcome: &mut DeleteOutcome, chunk: &[String], error: &EngineError) {
    record_batch_failure_message(outcome, chunk, &error.to_string());
}

fn record_batch_failure_message(outcome: &mut DeleteOutcome, chunk: &[String], message: &str) {
    outcome.first_error.get_or_insert_with(|| message.to_string());
    for key in chunk {
        outcome.failures.push(KeyFailure {
            key: key.clone(),
            error: message.to_string(),
        });
    }
}
