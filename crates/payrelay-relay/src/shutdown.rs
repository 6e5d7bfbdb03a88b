// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! SIGTERM and SIGINT (Ctrl+C) cancel a shared [`CancellationToken`]. The
//! dispatcher and registry listener watch that token; their task handles
//! are then drained with a deadline.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Returns a token that is cancelled on SIGINT or SIGTERM.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
            info!("received SIGINT (Ctrl+C), initiating shutdown");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT (Ctrl+C), initiating shutdown"),
        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received Ctrl+C, initiating shutdown");
}

/// Wait up to `timeout` for background tasks to finish, aborting stragglers.
pub async fn drain_tasks(handles: Vec<JoinHandle<()>>, timeout: Duration) {
    if handles.is_empty() {
        return;
    }
    let count = handles.len();
    let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

    let joined = tokio::time::timeout(timeout, async {
        for handle in handles {
            if let Err(e) = handle.await
                && !e.is_cancelled()
            {
                warn!(error = %e, "background task panicked");
            }
        }
    })
    .await;

    match joined {
        Ok(()) => info!(count, "background tasks drained"),
        Err(_) => {
            warn!(count, "drain timeout reached, aborting remaining tasks");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_live_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn drain_waits_for_finished_tasks() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
        });
        drain_tasks(vec![handle], Duration::from_secs(1)).await;
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn drain_aborts_stuck_tasks() {
        let handle = tokio::spawn(std::future::pending::<()>());
        let abort = handle.abort_handle();
        drain_tasks(vec![handle], Duration::from_millis(20)).await;
        assert!(logs_contain("drain timeout reached"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(abort.is_finished());
    }
}
