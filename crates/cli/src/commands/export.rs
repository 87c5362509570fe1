//! `kvbulk export` — dump every entry as JSON lines.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;

use super::{CommandContext, print_warnings};
use kvbulk_engine::{Exporter, ListOptions, PagerOptions};

pub async fn export(
    ctx: &CommandContext,
    namespace: &str,
    output: Option<PathBuf>,
    prefix: Option<String>,
    concurrency: Option<usize>,
) -> anyhow::Result<i32> {
    let namespace_id = ctx.resolve_namespace_id(namespace).await?;
    let exporter = Exporter::new(ctx.client.clone(), namespace_id, ctx.cancel.clone());

    let options = ListOptions {
        prefix,
        pager: PagerOptions {
            operation: "export",
            ..Default::default()
        },
        ..Default::default()
    };
    let outcome = exporter.export_namespace(&options, concurrency).await?;

    let mut sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    for entry in &outcome.entries {
        serde_json::to_writer(&mut sink, entry)?;
        sink.write_all(b"\n")?;
    }
    sink.flush()?;

    print_warnings(&outcome.warnings);
    for failure in &outcome.failures {
        eprintln!("failed: {}: {}", failure.key, failure.error);
    }
    eprintln!(
        "exported {} entries{}",
        outcome.entries.len(),
        output
            .map(|p| format!(" to {}", p.display()))
            .unwrap_or_default()
    );
    Ok(0)
}
