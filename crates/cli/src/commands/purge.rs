//! `kvbulk purge` — delete every key whose metadata matches a predicate.

use std::sync::Arc;

use anyhow::bail;

use super::{CommandContext, confirm, print_warnings};
use crate::cancellation::SIGINT_EXIT_CODE;
use crate::progress;
use kvbulk_engine::{
    FilterOptions, MetadataCache, MetadataFilter, PagerOptions, ProgressTracker, PurgeOptions,
    PurgeOrchestrator,
};

pub struct PurgeArgs {
    pub namespace: String,
    pub tag_field: Option<String>,
    pub tag_value: Option<String>,
    pub search: Option<String>,
    pub dry_run: bool,
    pub force: bool,
    pub prefix: Option<String>,
    pub chunk_size: usize,
    pub concurrency: Option<usize>,
    pub value_fallback: bool,
}

fn build_filter(args: &PurgeArgs) -> anyhow::Result<MetadataFilter> {
    if let Some(needle) = &args.search {
        return Ok(MetadataFilter::search(needle.clone()));
    }
    let Some(field) = &args.tag_field else {
        bail!("provide --tag-field or --search");
    };
    Ok(match &args.tag_value {
        Some(value) => MetadataFilter::field_equals(field.clone(), value.clone()),
        None => MetadataFilter::field(field.clone()),
    })
}

pub async fn purge(ctx: &CommandContext, args: PurgeArgs) -> anyhow::Result<i32> {
    let namespace_id = ctx.resolve_namespace_id(&args.namespace).await?;
    let filter = build_filter(&args)?;

    if !args.dry_run {
        let prompt = format!(
            "Purge every matching key from '{}'? This cannot be undone.",
            args.namespace
        );
        if !confirm(&prompt, args.force)? {
            eprintln!("aborted");
            return Ok(0);
        }
    }

    let label = if args.dry_run { "dry-run purge" } else { "purge" };
    let bar = progress::operation_bar(label);
    let tracker = Arc::new(ProgressTracker::new(Some(progress::snapshot_callback(
        bar.clone(),
        "purge",
    ))));

    let orchestrator = PurgeOrchestrator::new(
        ctx.client.clone(),
        namespace_id,
        ctx.cancel.clone(),
        tracker,
    )
    .with_cache(Arc::new(MetadataCache::with_defaults()));

    let options = PurgeOptions {
        dry_run: args.dry_run,
        filter: FilterOptions {
            chunk_size: args.chunk_size,
            concurrency: args.concurrency,
            prefix: args.prefix.clone(),
            value_fallback: args.value_fallback,
            pager: PagerOptions {
                operation: "purge",
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    };

    let outcome = orchestrator.purge(&filter, &options).await?;
    bar.finish_and_clear();

    print_warnings(&outcome.warnings);
    for failure in outcome.failures.iter().take(20) {
        eprintln!("failed: {}: {}", failure.key, failure.error);
    }
    if outcome.failures.len() > 20 {
        eprintln!("... and {} more failures", outcome.failures.len() - 20);
    }

    if args.dry_run {
        eprintln!(
            "dry run: {} of {} scanned keys match",
            outcome.matched, outcome.scanned
        );
        println!("{}", outcome.matched);
    } else {
        eprintln!(
            "purged {} of {} matched keys ({} scanned)",
            outcome.deleted, outcome.matched, outcome.scanned
        );
        println!("{}", outcome.deleted);
    }

    if let Some(cause) = outcome.cancelled {
        eprintln!("stopped early: {cause}");
        return Ok(SIGINT_EXIT_CODE);
    }
    Ok(0)
}
