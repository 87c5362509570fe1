//! Cursor pagination driver.
//!
//! [`paginate`] and [`paginate_streaming`] drive one logical listing against
//! a cursor-paginated endpoint. The pager owns the safety rails around an
//! eventually-consistent remote: it detects cursor loops, honors an overall
//! deadline and an optional page budget, and retries transient page fetches
//! with a linear backoff. Safety stops are reported as warnings on the
//! result, never as errors; only transport exhaustion and cancellation fail
//! the enumeration.

use std::collections::HashSet;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use kvbulk_client::ClientError;
use kvbulk_config::constants::{DEFAULT_ENUMERATION_DEADLINE_SECS, DEFAULT_MAX_RETRIES};

/// One page handed back by the caller's `list_fn`.
#[derive(Debug, Clone)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    /// Continuation token; `None` or empty means the listing is done.
    pub cursor: Option<String>,
}

/// Tuning knobs for one enumeration.
#[derive(Debug, Clone)]
pub struct PagerOptions {
    /// Overall deadline for the enumeration, checked between pages.
    pub deadline: Duration,
    /// Retry budget per page fetch for transient errors.
    pub max_page_retries: usize,
    /// Stop after this many pages; zero means unbounded.
    pub max_pages: usize,
    /// Label used in log lines.
    pub operation: &'static str,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(DEFAULT_ENUMERATION_DEADLINE_SECS),
            max_page_retries: DEFAULT_MAX_RETRIES,
            max_pages: 0,
            operation: "list",
        }
    }
}

/// Safety stops and anomalies observed during an enumeration.
///
/// Warnings never promote to errors; they ride alongside the (possibly
/// partial) result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerWarning {
    CursorLoop,
    DeadlineExceeded,
    PageLimitReached,
    EmptyPageWithCursor,
}

impl std::fmt::Display for PagerWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CursorLoop => write!(f, "cursor loop detected"),
            Self::DeadlineExceeded => write!(f, "timed out, results may be incomplete"),
            Self::PageLimitReached => write!(f, "page limit reached"),
            Self::EmptyPageWithCursor => write!(f, "empty page with continuation"),
        }
    }
}

/// What an enumeration did, independent of the items it produced.
#[derive(Debug, Clone, Default)]
pub struct PagerSummary {
    pub pages: usize,
    pub warnings: Vec<PagerWarning>,
}

/// An enumeration result with the collected items.
#[derive(Debug, Clone, Default)]
pub struct PagerOutcome<T> {
    pub items: Vec<T>,
    pub pages: usize,
    pub warnings: Vec<PagerWarning>,
}

/// Drive the pagination to completion, collecting every item.
pub async fn paginate<T, F, Fut>(
    list_fn: F,
    options: &PagerOptions,
    cancel: &CancellationToken,
) -> Result<PagerOutcome<T>>
where
    T: Send,
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = std::result::Result<ListPage<T>, ClientError>>,
{
    let mut items: Vec<T> = Vec::new();
    let summary = paginate_streaming(list_fn, options, cancel, |page_items| {
        items.extend(page_items);
        std::future::ready(Ok(()))
    })
    .await?;

    Ok(PagerOutcome {
        items,
        pages: summary.pages,
        warnings: summary.warnings,
    })
}

/// Drive the pagination, delivering each page to `on_page` as it arrives.
///
/// `on_page` returning an error cancels the enumeration and surfaces that
/// error to the caller.
pub async fn paginate_streaming<T, F, Fut, C, CFut>(
    mut list_fn: F,
    options: &PagerOptions,
    cancel: &CancellationToken,
    mut on_page: C,
) -> Result<PagerSummary>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = std::result::Result<ListPage<T>, ClientError>>,
    C: FnMut(Vec<T>) -> CFut,
    CFut: Future<Output = Result<()>>,
{
    let started = tokio::time::Instant::now();
    let mut seen_cursors: HashSet<String> = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut summary = PagerSummary::default();

    loop {
        if cancel.is_cancelled() {
            return Err(EngineError::cancelled());
        }

        let page = fetch_page_with_retry(
            &mut list_fn,
            cursor.clone(),
            options.max_page_retries,
            options.operation,
            cancel,
        )
        .await?;
        summary.pages += 1;

        let next_cursor = page.cursor.clone().filter(|c| !c.is_empty());
        let empty_with_cursor = page.items.is_empty() && next_cursor.is_some();

        on_page(page.items).await?;

        if empty_with_cursor {
            warn!(operation = options.operation, "empty page with continuation cursor");
            push_warning(&mut summary.warnings, PagerWarning::EmptyPageWithCursor);
        }

        let Some(next) = next_cursor else {
            break;
        };
        if !seen_cursors.insert(next.clone()) {
            warn!(operation = options.operation, cursor = %next, "cursor loop detected, stopping");
            push_warning(&mut summary.warnings, PagerWarning::CursorLoop);
            break;
        }
        cursor = Some(next);

        if options.max_pages > 0 && summary.pages >= options.max_pages {
            debug!(
                operation = options.operation,
                pages = summary.pages,
                "page limit reached, stopping"
            );
            push_warning(&mut summary.warnings, PagerWarning::PageLimitReached);
            break;
        }
        if started.elapsed() >= options.deadline {
            warn!(
                operation = options.operation,
                pages = summary.pages,
                "enumeration deadline elapsed, returning partial results"
            );
            push_warning(&mut summary.warnings, PagerWarning::DeadlineExceeded);
            break;
        }
    }

    Ok(summary)
}

fn push_warning(warnings: &mut Vec<PagerWarning>, warning: PagerWarning) {
    if !warnings.contains(&warning) {
        warnings.push(warning);
    }
}

/// Fetch one page, retrying transient errors with a 1-second linear backoff
/// (1s, 2s, 3s, …). Non-transient errors and retry exhaustion surface the
/// transport error unchanged.
async fn fetch_page_with_retry<T, F, Fut>(
    list_fn: &mut F,
    cursor: Option<String>,
    max_retries: usize,
    operation: &'static str,
    cancel: &CancellationToken,
) -> Result<ListPage<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = std::result::Result<ListPage<T>, ClientError>>,
{
    let mut attempt = 0usize;
    loop {
        match list_fn(cursor.clone()).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                let backoff = Duration::from_secs(attempt as u64);
                debug!(
                    operation,
                    attempt,
                    max_retries,
                    backoff_secs = backoff.as_secs(),
                    error = %e,
                    "transient page fetch error, retrying"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(EngineError::cancelled()),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}
