//! Command implementations and dispatch.

mod bulk;
mod export;
mod keys;
mod namespaces;
mod purge;

use tokio_util::sync::CancellationToken;

use crate::args::Commands;
use kvbulk_client::KvClient;

/// Everything a command needs to run.
pub struct CommandContext {
    pub client: KvClient,
    pub cancel: CancellationToken,
}

impl CommandContext {
    /// Resolve a namespace argument (id or title) to its id.
    pub async fn resolve_namespace_id(&self, ident: &str) -> anyhow::Result<String> {
        let namespace = self.client.resolve_namespace(ident).await?;
        tracing::debug!(id = %namespace.id, title = %namespace.title, "namespace resolved");
        Ok(namespace.id)
    }
}

/// Ask for confirmation unless `force` was passed.
pub fn confirm(prompt: &str, force: bool) -> anyhow::Result<bool> {
    if force {
        return Ok(true);
    }
    Ok(dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Print pager warnings to stderr, away from piped stdout.
pub fn print_warnings(warnings: &[kvbulk_engine::PagerWarning]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}

/// Execute one parsed command; returns the process exit code.
pub async fn run(command: Commands, ctx: CommandContext) -> anyhow::Result<i32> {
    match command {
        Commands::Namespaces => namespaces::list(&ctx).await,
        Commands::List {
            namespace,
            prefix,
            limit,
            max_pages,
            json,
        } => keys::list(&ctx, &namespace, prefix, limit, max_pages, json).await,
        Commands::Get {
            namespace,
            key,
            metadata,
        } => keys::get(&ctx, &namespace, &key, metadata).await,
        Commands::Put {
            namespace,
            key,
            value,
            file,
            ttl,
            expiration,
            metadata,
        } => keys::put(&ctx, &namespace, &key, value, file, ttl, expiration, metadata).await,
        Commands::Delete { namespace, key } => keys::delete(&ctx, &namespace, &key).await,
        Commands::BulkPut {
            namespace,
            file,
            batch_size,
            concurrency,
            sequential,
        } => bulk::bulk_put(&ctx, &namespace, &file, batch_size, concurrency, sequential).await,
        Commands::BulkDelete {
            namespace,
            keys_file,
            prefix,
            batch_size,
            concurrency,
            isolate,
            force,
        } => {
            bulk::bulk_delete(
                &ctx, &namespace, keys_file, prefix, batch_size, concurrency, isolate, force,
            )
            .await
        }
        Commands::Export {
            namespace,
            output,
            prefix,
            concurrency,
        } => export::export(&ctx, &namespace, output, prefix, concurrency).await,
        Commands::Purge {
            namespace,
            tag_field,
            tag_value,
            search,
            dry_run,
            force,
            prefix,
            chunk_size,
            concurrency,
            value_fallback,
        } => {
            purge::purge(
                &ctx,
                purge::PurgeArgs {
                    namespace,
                    tag_field,
                    tag_value,
                    search,
                    dry_run,
                    force,
                    prefix,
                    chunk_size,
                    concurrency,
                    value_fallback,
                },
            )
            .await
        }
    }
}
