//! Single-key and listing commands.

use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::DateTime;

use super::{CommandContext, print_warnings};
use kvbulk_client::WriteOptions;
use kvbulk_engine::{Exporter, ListOptions, PagerOptions};

pub async fn list(
    ctx: &CommandContext,
    namespace: &str,
    prefix: Option<String>,
    limit: Option<u32>,
    max_pages: usize,
    json: bool,
) -> anyhow::Result<i32> {
    let namespace_id = ctx.resolve_namespace_id(namespace).await?;
    let exporter = Exporter::new(ctx.client.clone(), namespace_id, ctx.cancel.clone());
    let options = ListOptions {
        limit,
        prefix,
        pager: PagerOptions {
            max_pages,
            operation: "list",
            ..Default::default()
        },
    };

    let mut total = 0usize;
    let warnings = exporter
        .stream_keys(&options, |entries| {
            total += entries.len();
            let lines: Result<Vec<String>, serde_json::Error> = entries
                .iter()
                .map(|entry| {
                    if json {
                        serde_json::to_string(entry)
                    } else {
                        Ok(entry.name.clone())
                    }
                })
                .collect();
            std::future::ready(match lines {
                Ok(lines) => {
                    for line in lines {
                        println!("{line}");
                    }
                    Ok(())
                }
                Err(e) => Err(kvbulk_engine::EngineError::ConsumerStopped(e.to_string())),
            })
        })
        .await?;

    print_warnings(&warnings);
    eprintln!("{total} keys");
    Ok(0)
}

pub async fn get(
    ctx: &CommandContext,
    namespace: &str,
    key: &str,
    with_metadata: bool,
) -> anyhow::Result<i32> {
    let namespace_id = ctx.resolve_namespace_id(namespace).await?;
    let Some(value) = ctx.client.get_value(&namespace_id, key).await? else {
        bail!("key '{key}' not found");
    };

    if with_metadata {
        let metadata = ctx.client.get_metadata(&namespace_id, key).await?;
        let entry = serde_json::json!({
            "key": key,
            "value": value,
            "metadata": metadata,
        });
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!("{value}");
    }
    Ok(0)
}

#[allow(clippy::too_many_arguments)]
pub async fn put(
    ctx: &CommandContext,
    namespace: &str,
    key: &str,
    value: Option<String>,
    file: Option<PathBuf>,
    ttl: Option<i64>,
    expiration: Option<i64>,
    metadata: Option<String>,
) -> anyhow::Result<i32> {
    let namespace_id = ctx.resolve_namespace_id(namespace).await?;

    let value = match (value, file) {
        (Some(value), None) => value,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading value from {}", path.display()))?,
        (None, None) => bail!("provide a value argument or --file"),
        (Some(_), Some(_)) => unreachable!("clap enforces the conflict"),
    };

    let metadata = metadata
        .map(|raw| serde_json::from_str(&raw).context("--metadata is not valid JSON"))
        .transpose()?;

    let options = WriteOptions {
        expiration,
        expiration_ttl: ttl,
        metadata,
    };
    ctx.client
        .put_value(&namespace_id, key, &value, &options)
        .await?;

    if let Some(expiration) = expiration
        && let Some(when) = DateTime::from_timestamp(expiration, 0)
    {
        eprintln!("wrote '{key}' (expires {when})");
    } else {
        eprintln!("wrote '{key}'");
    }
    Ok(0)
}

pub async fn delete(ctx: &CommandContext, namespace: &str, key: &str) -> anyhow::Result<i32> {
    let namespace_id = ctx.resolve_namespace_id(namespace).await?;
    ctx.client.delete_value(&namespace_id, key).await?;
    eprintln!("deleted '{key}'");
    Ok(0)
}
