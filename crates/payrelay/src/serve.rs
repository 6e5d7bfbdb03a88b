// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `payrelay serve` command implementation.
//!
//! Opens the store, connects the socket transport, and runs the registry
//! listener and the dispatcher in the background. Intake events are read
//! from stdin, one per line:
//!
//! ```text
//! [sim=<slot>] <hex pdu> [<hex pdu> ...]
//! ```
//!
//! Shuts down on SIGINT/SIGTERM, or when the transport gives up reconnecting.

use std::sync::Arc;
use std::time::Duration;

use payrelay_config::model::PayrelayConfig;
use payrelay_core::types::AuthParams;
use payrelay_core::{RelayError, SocketTransport};
use payrelay_relay::shutdown::{drain_tasks, install_signal_handler};
use payrelay_relay::{DispatchExit, Dispatcher, ProcessOutcome, SmsProcessor};
use payrelay_sms::decode_hex_pdus;
use payrelay_socket::WsTransport;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::store::Stack;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// One parsed stdin line.
#[derive(Debug, PartialEq, Eq)]
pub struct IntakeLine {
    pub sim_slot: Option<i32>,
    pub pdus: Vec<Vec<u8>>,
}

/// Parse an intake line. Blank lines yield `Ok(None)`.
pub fn parse_intake_line(line: &str) -> Result<Option<IntakeLine>, String> {
    let mut tokens = line.split_whitespace().peekable();
    if tokens.peek().is_none() {
        return Ok(None);
    }

    let mut sim_slot = None;
    if let Some(slot) = tokens.peek().and_then(|t| t.strip_prefix("sim=")) {
        sim_slot = Some(
            slot.parse::<i32>()
                .map_err(|_| format!("invalid sim slot: {slot}"))?,
        );
        tokens.next();
    }

    let hex: Vec<&str> = tokens.collect();
    if hex.is_empty() {
        return Err("no PDUs on line".to_string());
    }
    let pdus = decode_hex_pdus(&hex).map_err(|e| e.to_string())?;
    Ok(Some(IntakeLine { sim_slot, pdus }))
}

pub async fn run_serve(config: PayrelayConfig) -> Result<(), RelayError> {
    info!(agent = %config.agent.name, "starting payrelay serve");

    let stack = Stack::open(&config).await?;
    // Presence from a previous run is stale until the server reports it again.
    stack.registry.mark_all_offline().await?;
    info!(
        offers = stack.catalog.all().await.len(),
        queued = stack.queue.count().await?,
        "store opened"
    );

    let transport = Arc::new(WsTransport::new(config.socket.clone()));
    let cancel = install_signal_handler();
    let mut handles = Vec::new();

    // Subscribe before connecting so early presence events are not missed.
    handles.push(tokio::spawn(stack.registry.clone().run_event_listener(
        transport.subscribe(),
        transport.connection_state(),
        cancel.clone(),
    )));

    let auth = AuthParams {
        user_id: config.agent.user_id.clone().unwrap_or_default(),
        connect_id: config.socket.connect_id.clone().unwrap_or_default(),
    };
    if let Err(e) = transport.connect(&auth).await {
        error!(error = %e, "failed to connect socket transport");
        cancel.cancel();
        drain_tasks(handles, DRAIN_TIMEOUT).await;
        return Err(e);
    }

    let (exit_tx, exit_rx) = watch::channel(None);
    let dispatcher = Dispatcher::new(
        stack.queue.clone(),
        stack.registry.clone(),
        transport.clone() as Arc<dyn SocketTransport>,
        stack.storage.clone(),
        &config.dispatch,
        &config.policy,
    );
    {
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let exit = dispatcher.run(cancel.clone()).await;
            let _ = exit_tx.send(Some(exit));
            if exit == DispatchExit::TransportLost {
                cancel.cancel();
            }
        }));
    }

    let processor = Arc::new(
        SmsProcessor::new(
            &config.sms,
            &config.dispatch,
            stack.catalog.clone(),
            stack.queue.clone(),
            stack.storage.clone(),
        )
        .with_shutdown(cancel.clone()),
    );
    read_intake(&processor, &cancel).await;

    cancel.cancelled().await;
    info!("shutting down");
    if let Err(e) = transport.disconnect().await {
        warn!(error = %e, "socket disconnect failed");
    }
    drain_tasks(handles, DRAIN_TIMEOUT).await;
    stack.close().await?;

    if *exit_rx.borrow() == Some(DispatchExit::TransportLost) {
        return Err(RelayError::transport(
            "socket connection lost and reconnection attempts exhausted",
        ));
    }
    info!("payrelay serve shutdown complete");
    Ok(())
}

/// Feed stdin lines to the processor until EOF or cancellation.
async fn read_intake(processor: &Arc<SmsProcessor>, cancel: &CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("stdin closed, intake stopped");
                return;
            }
            Err(e) => {
                error!(error = %e, "failed to read intake");
                return;
            }
        };

        match parse_intake_line(&line) {
            Ok(Some(intake)) => {
                let handle = processor.on_sms_received(intake.pdus, intake.sim_slot);
                tokio::spawn(async move {
                    match handle.await {
                        Ok(outcomes) => outcomes.iter().for_each(log_outcome),
                        Err(e) => error!(error = %e, "intake task failed"),
                    }
                });
            }
            Ok(None) => {}
            Err(reason) => error!(reason = %reason, "malformed intake line"),
        }
    }
}

fn log_outcome(outcome: &ProcessOutcome) {
    match outcome {
        ProcessOutcome::Admitted { id, status } => {
            info!(transaction_id = %id, status = %status, "payment queued");
        }
        ProcessOutcome::Rejected(reason) => debug!(reason = %reason, "message dropped"),
        ProcessOutcome::RecommendationTimedOut { phone } => {
            debug!(phone = %phone, "recommendation timeout handled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_is_skipped() {
        assert_eq!(parse_intake_line("   "), Ok(None));
    }

    #[test]
    fn parses_sim_slot_and_pdus() {
        let line = parse_intake_line("sim=1 0A0B 0C").unwrap().unwrap();
        assert_eq!(line.sim_slot, Some(1));
        assert_eq!(line.pdus, vec![vec![0x0a, 0x0b], vec![0x0c]]);
    }

    #[test]
    fn sim_slot_is_optional() {
        let line = parse_intake_line("0A0B").unwrap().unwrap();
        assert_eq!(line.sim_slot, None);
        assert_eq!(line.pdus.len(), 1);
    }

    #[test]
    fn bad_lines_are_rejected() {
        assert!(parse_intake_line("sim=x 0A0B").is_err());
        assert!(parse_intake_line("sim=1").is_err());
        assert!(parse_intake_line("zz").is_err());
    }
}
