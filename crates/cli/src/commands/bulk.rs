//! Bulk write and bulk delete commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

use super::{CommandContext, confirm, print_warnings};
use crate::cancellation::SIGINT_EXIT_CODE;
use crate::progress;
use kvbulk_client::WriteItem;
use kvbulk_engine::{BulkDeleter, BulkWriter, Exporter, KeyFailure, ListOptions};

pub async fn bulk_put(
    ctx: &CommandContext,
    namespace: &str,
    file: &Path,
    batch_size: usize,
    concurrency: Option<usize>,
    sequential: bool,
) -> anyhow::Result<i32> {
    let namespace_id = ctx.resolve_namespace_id(namespace).await?;

    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading items from {}", file.display()))?;
    let items: Vec<WriteItem> =
        serde_json::from_str(&raw).context("expected a JSON array of {key, value, ...} items")?;
    if items.is_empty() {
        eprintln!("nothing to write");
        return Ok(0);
    }

    let bar = progress::operation_bar(&format!("writing {} items", items.len()));
    let bar_for_batches = bar.clone();
    let total = items.len();
    let written_so_far = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = written_so_far.clone();
    let on_batch: kvbulk_engine::BatchProgressFn = std::sync::Arc::new(move |n| {
        let done = counter.fetch_add(n, std::sync::atomic::Ordering::SeqCst) + n;
        bar_for_batches.set_message(format!("written {done}/{total}"));
    });

    let writer = BulkWriter::new(ctx.client.clone(), namespace_id, ctx.cancel.clone());
    let outcome = if sequential {
        writer
            .write_sequential_batches(&items, batch_size, Some(on_batch))
            .await
    } else {
        writer
            .write_concurrent_batches(&items, batch_size, concurrency, Some(on_batch))
            .await
    };
    bar.finish_and_clear();

    eprintln!("wrote {} of {} items", outcome.written, total);
    report_failures(&outcome.failures);
    if outcome.cancelled {
        return Ok(SIGINT_EXIT_CODE);
    }
    if outcome.written == 0 {
        bail!(
            "no items were written: {}",
            outcome.first_error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(0)
}

#[allow(clippy::too_many_arguments)]
pub async fn bulk_delete(
    ctx: &CommandContext,
    namespace: &str,
    keys_file: Option<PathBuf>,
    prefix: Option<String>,
    batch_size: usize,
    concurrency: Option<usize>,
    isolate: bool,
    force: bool,
) -> anyhow::Result<i32> {
    let namespace_id = ctx.resolve_namespace_id(namespace).await?;

    let keys: Vec<String> = match (keys_file, prefix) {
        (Some(path), None) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading keys from {}", path.display()))?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
        (None, Some(prefix)) => {
            let exporter =
                Exporter::new(ctx.client.clone(), namespace_id.clone(), ctx.cancel.clone());
            let listing = exporter
                .list_all_keys(&ListOptions {
                    prefix: Some(prefix),
                    ..Default::default()
                })
                .await?;
            print_warnings(&listing.warnings);
            listing.items.into_iter().map(|e| e.name).collect()
        }
        _ => unreachable!("clap enforces exactly one source"),
    };

    if keys.is_empty() {
        eprintln!("nothing to delete");
        return Ok(0);
    }
    if !confirm(&format!("Delete {} keys?", keys.len()), force)? {
        eprintln!("aborted");
        return Ok(0);
    }

    let deleter = BulkDeleter::new(ctx.client.clone(), namespace_id, ctx.cancel.clone());
    let bar = progress::operation_bar(&format!("deleting {} keys", keys.len()));

    if isolate {
        let outcome = deleter.delete_with_isolation(keys).await?;
        bar.finish_and_clear();
        eprintln!("deleted {} keys", outcome.deleted.len());
        report_failures(&outcome.failures);
        return Ok(0);
    }

    let bar_for_batches = bar.clone();
    let total = keys.len();
    let deleted_so_far = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = deleted_so_far.clone();
    let outcome = deleter
        .delete_concurrent_batches(
            &keys,
            batch_size,
            concurrency,
            Some(std::sync::Arc::new(move |n| {
                let done = counter.fetch_add(n, std::sync::atomic::Ordering::SeqCst) + n;
                bar_for_batches.set_message(format!("deleted {done}/{total}"));
            })),
        )
        .await;
    bar.finish_and_clear();

    eprintln!("deleted {} of {} keys", outcome.deleted, total);
    report_failures(&outcome.failures);
    if outcome.cancelled {
        return Ok(SIGINT_EXIT_CODE);
    }
    Ok(0)
}

/// Print per-key failures to stderr, capped so a huge rejection list does
/// not bury the summary.
fn report_failures(failures: &[KeyFailure]) {
    const SHOWN: usize = 20;
    for failure in failures.iter().take(SHOWN) {
        eprintln!("failed: {}: {}", failure.key, failure.error);
    }
    if failures.len() > SHOWN {
        eprintln!("... and {} more failures", failures.len() - SHOWN);
    }
}
