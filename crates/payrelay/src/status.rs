// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `payrelay status` command implementation.
//!
//! Reads queue depth, app presence and today's commission straight from the
//! store, so it works whether or not a relay is running.

use std::io::IsTerminal;

use chrono::Local;
use serde::Serialize;

use payrelay_config::model::PayrelayConfig;
use payrelay_core::types::TransactionStatus;
use payrelay_core::{RelayError, StorageAdapter};

use crate::store::Stack;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub queued: u64,
    pub unmatched: usize,
    pub apps_online: usize,
    pub apps_total: usize,
    pub offers: usize,
    pub commission_date: String,
    pub commission_today: f64,
}

pub async fn run_status(config: &PayrelayConfig, json: bool, plain: bool) -> Result<(), RelayError> {
    let stack = Stack::open(config).await?;
    let status = collect(&stack).await?;
    stack.close().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&status, use_color);
    }
    Ok(())
}

async fn collect(stack: &Stack) -> Result<StatusResponse, RelayError> {
    let transactions = stack.queue.list().await?;
    let apps = stack.registry.apps().await;
    let date = Local::now().format("%Y-%m-%d").to_string();
    let commission = stack.storage.get_commission(&date).await?;

    Ok(StatusResponse {
        queued: transactions.len() as u64,
        unmatched: transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Unmatched)
            .count(),
        apps_online: apps.iter().filter(|a| a.is_online).count(),
        apps_total: apps.len(),
        offers: stack.catalog.all().await.len(),
        commission_date: date,
        commission_today: commission.map_or(0.0, |c| c.amount),
    })
}

fn print_status(status: &StatusResponse, use_color: bool) {
    println!();
    println!("  payrelay status");
    println!("  {}", "-".repeat(35));

    let queue = format!("{} queued ({} unmatched)", status.queued, status.unmatched);
    if use_color {
        use colored::Colorize;
        if status.unmatched > 0 {
            println!("    Queue:      {}", queue.yellow());
        } else {
            println!("    Queue:      {}", queue.green());
        }
    } else {
        println!("    Queue:      {queue}");
    }

    println!(
        "    Apps:       {}/{} online",
        status.apps_online, status.apps_total
    );
    println!("    Offers:     {}", status.offers);
    println!(
        "    Commission: {:.2} ({})",
        status.commission_today, status.commission_date
    );
    println!();
}
