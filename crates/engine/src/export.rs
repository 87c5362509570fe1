//! Namespace enumeration and ordered fetch-with-metadata.
//!
//! The pool gives no completion-order guarantee, so the exporter carries the
//! key's position through the work item and reorders on the consumer side by
//! writing each result into its slot.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

use crate::deleter::KeyFailure;
use crate::error::{CancelCause, Result};
use crate::pager::{self, ListPage, PagerOptions, PagerOutcome, PagerWarning};
use crate::pool::{PoolBounds, WorkerPool};
use kvbulk_client::{KeyEntry, KvClient};
use kvbulk_config::constants::{ConcurrencyClass, DEFAULT_METADATA_DEADLINE_SECS};

/// Options for enumeration.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub limit: Option<u32>,
    pub prefix: Option<String>,
    pub pager: PagerOptions,
}

/// One fully hydrated entry, in listing order.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedEntry {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Result of a full export.
#[derive(Debug, Default)]
pub struct ExportOutcome {
    pub entries: Vec<ExportedEntry>,
    pub failures: Vec<KeyFailure>,
    pub warnings: Vec<PagerWarning>,
}

/// Enumerates keys and fetches their values and metadata.
pub struct Exporter {
    client: KvClient,
    namespace_id: String,
    cancel: CancellationToken,
    /// Deadline for one hydration batch; expiry cancels the remaining
    /// fetches and reports the un-fetched keys as failures.
    fetch_deadline: Duration,
}

impl Exporter {
    pub fn new(
        client: KvClient,
        namespace_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            namespace_id: namespace_id.into(),
            cancel,
            fetch_deadline: Duration::from_secs(DEFAULT_METADATA_DEADLINE_SECS),
        }
    }

    /// Override the per-batch fetch deadline.
    pub fn with_fetch_deadline(mut self, deadline: Duration) -> Self {
        self.fetch_deadline = deadline;
        self
    }

    /// Enumerate every key in the namespace, in cursor order.
    pub async fn list_all_keys(&self, options: &ListOptions) -> Result<PagerOutcome<KeyEntry>> {
        let client = self.client.clone();
        let namespace_id = self.namespace_id.clone();
        let limit = options.limit;
        let prefix = options.prefix.clone();
        pager::paginate(
            move |cursor: Option<String>| {
                let client = client.clone();
                let namespace_id = namespace_id.clone();
                let prefix = prefix.clone();
                async move {
                    let page = client
                        .list_keys_page(&namespace_id, limit, cursor.as_deref(), prefix.as_deref())
                        .await?;
                    Ok(ListPage {
                        items: page.keys,
                        cursor: page.cursor,
                    })
                }
            },
            &options.pager,
            &self.cancel,
        )
        .await
    }

    /// Enumerate keys page by page, delivering each page's key names to
    /// `on_keys`. An error from the callback cancels the enumeration.
    pub async fn stream_keys<C, Fut>(
        &self,
        options: &ListOptions,
        mut on_keys: C,
    ) -> Result<Vec<PagerWarning>>
    where
        C: FnMut(Vec<KeyEntry>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let client = self.client.clone();
        let namespace_id = self.namespace_id.clone();
        let limit = options.limit;
        let prefix = options.prefix.clone();
        let summary = pager::paginate_streaming(
            move |cursor: Option<String>| {
                let client = client.clone();
                let namespace_id = namespace_id.clone();
                let prefix = prefix.clone();
                async move {
                    let page = client
                        .list_keys_page(&namespace_id, limit, cursor.as_deref(), prefix.as_deref())
                        .await?;
                    Ok(ListPage {
                        items: page.keys,
                        cursor: page.cursor,
                    })
                }
            },
            &options.pager,
            &self.cancel,
            |items| on_keys(items),
        )
        .await?;
        Ok(summary.warnings)
    }

    /// Fetch value + metadata for every key, preserving input order in the
    /// returned entries.
    ///
    /// The batch runs under [`Exporter::with_fetch_deadline`]; on expiry the
    /// remaining keys are reported as failures alongside whatever was
    /// already fetched.
    pub async fn fetch_entries(
        &self,
        keys: Vec<KeyEntry>,
        concurrency: Option<usize>,
    ) -> (Vec<ExportedEntry>, Vec<KeyFailure>) {
        let workers = ConcurrencyClass::ValueFetch.clamp(concurrency);
        let key_names: Vec<String> = keys.iter().map(|e| e.name.clone()).collect();

        // Deadline as a cancellation signal with a timer, so it interrupts
        // fetches already in the pool queue.
        let batch_cancel = self.cancel.child_token();
        let _deadline_timer = AbortOnDropHandle::new(tokio::spawn({
            let token = batch_cancel.clone();
            let deadline = self.fetch_deadline;
            async move {
                tokio::time::sleep(deadline).await;
                warn!(
                    deadline_secs = deadline.as_secs(),
                    "fetch batch deadline elapsed, cancelling remaining work"
                );
                token.cancel();
            }
        }));

        let client = self.client.clone();
        let namespace_id = self.namespace_id.clone();
        let mut pool = WorkerPool::spawn(
            PoolBounds::fixed(workers),
            batch_cancel.child_token(),
            move |entry: KeyEntry| {
                let client = client.clone();
                let namespace_id = namespace_id.clone();
                async move {
                    let value = client.get_value(&namespace_id, &entry.name).await?;
                    // Metadata embedded in the listing wins; only fetch when
                    // the page did not carry it.
                    let metadata = match entry.metadata {
                        Some(metadata) => Some(metadata),
                        None => client.get_metadata(&namespace_id, &entry.name).await?,
                    };
                    Ok(ExportedEntry {
                        key: entry.name,
                        value,
                        expiration: entry.expiration,
                        metadata,
                    })
                }
            },
        );

        let expected = keys.len();
        let dispatch = pool.dispatch(keys).await;

        // Reorder by slot; the pool's completion order is arbitrary.
        let mut slots: Vec<Option<ExportedEntry>> = Vec::with_capacity(expected);
        slots.resize_with(expected, || None);
        for output in dispatch.outputs {
            if let Some(slot) = slots.get_mut(output.index) {
                *slot = Some(output.value);
            }
        }

        let mut failures = Vec::new();
        let mut failed_indices = vec![false; expected];
        for failure in dispatch.failures {
            if let Some(flag) = failed_indices.get_mut(failure.index) {
                *flag = true;
            }
            failures.push(KeyFailure {
                key: key_names.get(failure.index).cloned().unwrap_or_default(),
                error: failure.error.to_string(),
            });
        }

        if dispatch.cancelled {
            // Keys that produced neither a result nor a failure were cut off
            // by the deadline or the caller's token.
            let cause = if self.cancel.is_cancelled() {
                CancelCause::CallerRequested
            } else {
                CancelCause::DeadlineExceeded
            };
            for (index, slot) in slots.iter().enumerate() {
                if slot.is_none() && !failed_indices[index] {
                    failures.push(KeyFailure {
                        key: key_names.get(index).cloned().unwrap_or_default(),
                        error: format!("not fetched: {cause}"),
                    });
                }
            }
        }

        (slots.into_iter().flatten().collect(), failures)
    }

    /// Enumerate the namespace and hydrate every entry.
    pub async fn export_namespace(
        &self,
        options: &ListOptions,
        concurrency: Option<usize>,
    ) -> Result<ExportOutcome> {
        let listing = self.list_all_keys(options).await?;
        debug!(
            keys = listing.items.len(),
            pages = listing.pages,
            "enumeration finished, fetching values"
        );
        let (entries, failures) = self.fetch_entries(listing.items, concurrency).await;
        Ok(ExportOutcome {
            entries,
            failures,
            warnings: listing.warnings,
        })
    }
}
