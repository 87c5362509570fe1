//! Terminal progress rendering for engine snapshots.
//!
//! Bars draw to stderr so stdout stays clean for piped output. While the
//! total is unknown (`-1`) the bar is a spinner with raw counts; a
//! percentage only appears once enumeration has published the total.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use kvbulk_engine::{ProgressFn, ProgressSnapshot};

/// A spinner-style bar for operations with an unknown total.
pub fn operation_bar(label: &str) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(label.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar
}

/// Adapt a progress bar into the engine's snapshot callback.
pub fn snapshot_callback(bar: ProgressBar, label: &'static str) -> ProgressFn {
    Arc::new(move |snapshot: ProgressSnapshot| {
        bar.set_message(format_snapshot(label, &snapshot));
    })
}

fn format_snapshot(label: &str, snapshot: &ProgressSnapshot) -> String {
    let mut line = format!(
        "{label}: fetched {} | processed {} | matched {} | deleted {}",
        snapshot.fetched, snapshot.processed, snapshot.matched, snapshot.deleted
    );
    if let Some(ratio) = snapshot.ratio() {
        line.push_str(&format!(" ({:.0}%)", ratio * 100.0));
    }
    if snapshot.workers > 0 {
        line.push_str(&format!(" [{} workers]", snapshot.workers));
    }
    line
}
