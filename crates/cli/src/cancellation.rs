//! Ctrl-C wiring: one cancellation token shared by every orchestration.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Conventional exit code for a SIGINT-terminated process.
pub const SIGINT_EXIT_CODE: i32 = 130;

/// Install a Ctrl-C handler that trips the returned token.
///
/// The first Ctrl-C requests a graceful stop: orchestrations finish their
/// in-flight work and report partial results.
pub fn install_ctrl_c_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trip = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancellation requested, draining in-flight work...");
            info!("ctrl-c received, cancelling");
            trip.cancel();
        }
    });
    token
}
