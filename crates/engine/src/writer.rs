//! Bulk write orchestration.
//!
//! Mirrors the deleter's batching shape: split the items into remote-sized
//! batches, then run them serially or through a worker pool. Per-batch
//! errors are accumulated with the partial success count; one bad batch
//! never aborts the rest.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::deleter::{BatchProgressFn, KeyFailure};
use crate::error::EngineError;
use crate::pool::{PoolBounds, WorkerPool};
use kvbulk_client::{KvClient, WriteItem};
use kvbulk_config::constants::{ConcurrencyClass, MAX_BULK_WRITE_ITEMS};

/// Result of a multi-batch write run.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    /// Items confirmed written.
    pub written: usize,
    /// Keys the remote reported as unsuccessful, plus whole failed batches.
    pub failures: Vec<KeyFailure>,
    pub first_error: Option<String>,
    pub cancelled: bool,
}

/// Writes batches of items into one namespace.
#[derive(Clone)]
pub struct BulkWriter {
    client: KvClient,
    namespace_id: String,
    cancel: CancellationToken,
}

impl BulkWriter {
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

    fn clamp_batch(batch_size: usize) -> usize {
        if batch_size == 0 {
            MAX_BULK_WRITE_ITEMS
        } else {
            batch_size.min(MAX_BULK_WRITE_ITEMS)
        }
    }

    /// Write one batch; returns the number of items the remote accepted and
    /// the keys it rejected.
    async fn write_batch(&self, batch: &[WriteItem]) -> Result<(usize, Vec<String>), EngineError> {
        let result = self.client.bulk_write(&self.namespace_id, batch).await?;
        let rejected = result.unsuccessful_keys.unwrap_or_default();
        let written = result
            .successful_key_count
            .map(|n| n as usize)
            .unwrap_or_else(|| batch.len().saturating_sub(rejected.len()));
        Ok((written, rejected))
    }

    /// Split `items` into batches of `batch_size` and write them serially.
    pub async fn write_sequential_batches(
        &self,
        items: &[WriteItem],
        batch_size: usize,
        progress: Option<BatchProgressFn>,
    ) -> WriteOutcome {
        let batch_size = Self::clamp_batch(batch_size);
        let mut outcome = WriteOutcome::default();

        for batch in items.chunks(batch_size) {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            match self.write_batch(batch).await {
                Ok((written, rejected)) => {
                    outcome.written += written;
                    for key in rejected {
                        outcome.failures.push(KeyFailure {
                            key,
                            error: "rejected by bulk write".to_string(),
                        });
                    }
                    if let Some(progress) = &progress {
                        progress(written);
                    }
                }
                Err(e) => {
                    warn!(batch = batch.len(), error = %e, "write batch failed, continuing");
                    let message = e.to_string();
                    outcome.first_error.get_or_insert_with(|| message.clone());
                    for item in batch {
                        outcome.failures.push(KeyFailure {
                            key: item.key.clone(),
                            error: message.clone(),
                        });
                    }
                }
            }
        }
        outcome
    }

    /// Split `items` into batches and write them through a worker pool.
    pub async fn write_concurrent_batches(
        &self,
        items: &[WriteItem],
        batch_size: usize,
        concurrency: Option<usize>,
        progress: Option<BatchProgressFn>,
    ) -> WriteOutcome {
        let batch_size = Self::clamp_batch(batch_size);
        let workers = ConcurrencyClass::BulkWrite.clamp(concurrency);
        let batches: Vec<Vec<WriteItem>> = items.chunks(batch_size).map(|c| c.to_vec()).collect();

        let writer = self.clone();
        let mut pool = WorkerPool::spawn(
            PoolBounds::fixed(workers),
            self.cancel.child_token(),
            move |batch: Vec<WriteItem>| {
                let writer = writer.clone();
                let progress = progress.clone();
                async move {
                    let (written, rejected) = writer.write_batch(&batch).await?;
                    if let Some(progress) = &progress {
                        progress(written);
                    }
                    Ok((written, rejected))
                }
            },
        );

        let dispatch = pool.dispatch(batches.clone()).await;
        let mut outcome = WriteOutcome {
            cancelled: dispatch.cancelled,
            ..Default::default()
        };
        for output in dispatch.outputs {
            let (written, rejected) = output.value;
            outcome.written += written;
            for key in rejected {
                outcome.failures.push(KeyFailure {
                    key,
                    error: "rejected by bulk write".to_string(),
                });
            }
        }
        for failure in dispatch.failures {
            let message = failure.error.to_string();
            outcome.first_error.get_or_insert_with(|| message.clone());
            if let Some(batch) = batches.get(failure.index) {
                for item in batch {
                    outcome.failures.push(KeyFailure {
                        key: item.key.clone(),
                        error: message.clone(),
                    });
                }
            }
        }
        outcome
    }
}
