//! Command-line argument definitions.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Bulk operations for a remote, cursor-paginated key-value store.
#[derive(Debug, Parser)]
#[command(name = "kvbulk", version, about)]
pub struct Cli {
    /// Account id the storage namespaces live under.
    #[arg(long, global = true, env = "KV_ACCOUNT_ID")]
    pub account_id: Option<String>,

    /// Base URL of the remote API.
    #[arg(long, global = true, env = "KV_BASE_URL")]
    pub base_url: Option<String>,

    /// Named profile from the config file.
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Path to the config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the account's namespaces.
    Namespaces,

    /// Enumerate keys in a namespace.
    List {
        /// Namespace id or title.
        namespace: String,
        /// Only keys with this prefix.
        #[arg(long)]
        prefix: Option<String>,
        /// Page size (normalized into the remote's 10..=1000 bounds).
        #[arg(long)]
        limit: Option<u32>,
        /// Stop after this many pages (0 = no limit).
        #[arg(long, default_value_t = 0)]
        max_pages: usize,
        /// Print full entries as JSON lines instead of bare key names.
        #[arg(long)]
        json: bool,
    },

    /// Read one value.
    Get {
        /// Namespace id or title.
        namespace: String,
        key: String,
        /// Also print the key's metadata.
        #[arg(long)]
        metadata: bool,
    },

    /// Write one value.
    Put {
        /// Namespace id or title.
        namespace: String,
        key: String,
        /// Value literal; mutually exclusive with --file.
        value: Option<String>,
        /// Read the value from a file.
        #[arg(long, conflicts_with = "value")]
        file: Option<PathBuf>,
        /// Relative expiration in seconds.
        #[arg(long)]
        ttl: Option<i64>,
        /// Absolute expiration, seconds since epoch.
        #[arg(long, conflicts_with = "ttl")]
        expiration: Option<i64>,
        /// JSON metadata to attach.
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Delete one key.
    Delete {
        /// Namespace id or title.
        namespace: String,
        key: String,
    },

    /// Bulk-write items from a JSON file (array of {key, value, ...}).
    BulkPut {
        /// Namespace id or title.
        namespace: String,
        /// JSON file with an array of write items.
        file: PathBuf,
        /// Items per bulk call (capped at 10,000).
        #[arg(long, default_value_t = 10_000)]
        batch_size: usize,
        /// Parallel batches (defaults to 20, capped at 100).
        #[arg(long)]
        concurrency: Option<usize>,
        /// Write batches one at a time instead of concurrently.
        #[arg(long)]
        sequential: bool,
    },

    /// Bulk-delete keys from a file, or every key under a prefix.
    BulkDelete {
        /// Namespace id or title.
        namespace: String,
        /// File with one key per line.
        #[arg(long, required_unless_present = "prefix")]
        keys_file: Option<PathBuf>,
        /// Delete every key with this prefix instead of reading a file.
        #[arg(long, conflicts_with = "keys_file")]
        prefix: Option<String>,
        /// Keys per bulk call (capped at 1,000).
        #[arg(long, default_value_t = 1_000)]
        batch_size: usize,
        /// Parallel batches (defaults to 20, capped at 100).
        #[arg(long)]
        concurrency: Option<usize>,
        /// On a rejected batch, bisect to isolate the failing keys.
        #[arg(long)]
        isolate: bool,
        /// Skip the confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Export every entry (value + metadata) as JSON lines.
    Export {
        /// Namespace id or title.
        namespace: String,
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only keys with this prefix.
        #[arg(long)]
        prefix: Option<String>,
        /// Parallel value fetches (defaults to 10, capped at 50).
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Delete every key whose metadata matches a predicate.
    Purge {
        /// Namespace id or title.
        namespace: String,
        /// Metadata field that must be present.
        #[arg(long, required_unless_present = "search")]
        tag_field: Option<String>,
        /// Expected value for --tag-field (any value when omitted).
        #[arg(long, requires = "tag_field")]
        tag_value: Option<String>,
        /// Free-text search over the whole metadata tree.
        #[arg(long, conflicts_with_all = ["tag_field", "tag_value"])]
        search: Option<String>,
        /// Count matches without deleting.
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt.
        #[arg(long)]
        force: bool,
        /// Only keys with this prefix.
        #[arg(long)]
        prefix: Option<String>,
        /// Entries probed per chunk.
        #[arg(long, default_value_t = 1_000)]
        chunk_size: usize,
        /// Parallel metadata probes (defaults to 50, capped at 1,000).
        #[arg(long)]
        concurrency: Option<usize>,
        /// Parse value bodies as JSON when keys carry no metadata.
        #[arg(long)]
        value_fallback: bool,
    },
}
