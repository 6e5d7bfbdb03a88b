// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `payrelay queue` subcommands.

use chrono::{Local, TimeZone};

use payrelay_config::model::PayrelayConfig;
use payrelay_core::types::{RescheduleMode, Transaction};
use payrelay_core::{RelayError, now_millis};

use crate::QueueCommands;
use crate::store::Stack;

pub async fn run(config: &PayrelayConfig, action: QueueCommands) -> Result<(), RelayError> {
    let stack = Stack::open(config).await?;
    let result = execute(&stack, action).await;
    stack.close().await?;
    result
}

async fn execute(stack: &Stack, action: QueueCommands) -> Result<(), RelayError> {
    match action {
        QueueCommands::List { json } => {
            let transactions = stack.queue.list().await?;
            if json {
                let out = serde_json::to_string_pretty(&transactions)
                    .map_err(|e| RelayError::Internal(e.to_string()))?;
                println!("{out}");
            } else if transactions.is_empty() {
                println!("queue is empty");
            } else {
                for tx in &transactions {
                    println!("{}", format_transaction(tx));
                }
            }
        }
        QueueCommands::Retry { id } => {
            let tx = stack.queue.retry(id).await?;
            println!("{id} retry {} scheduled ({})", tx.retries, tx.status);
        }
        QueueCommands::Reschedule { id, at } => {
            let time = at.unwrap_or_else(now_millis);
            let tx = stack.queue.reschedule(id, time, RescheduleMode::Manual).await?;
            println!("{id} rescheduled to {} ({})", format_time(tx.time), tx.status);
        }
        QueueCommands::Assign { id, offer_id } => {
            let offer = stack.catalog.get(offer_id).await.ok_or_else(|| RelayError::NotFound {
                entity: "offer",
                id: offer_id.to_string(),
            })?;
            let tx = stack.queue.assign_offer(id, offer).await?;
            println!("{id} assigned, now {}", tx.status);
        }
        QueueCommands::Delete { id } => {
            if stack.queue.delete(id).await? {
                println!("deleted {id}");
            } else {
                println!("{id} was not queued");
            }
        }
    }
    Ok(())
}

fn format_time(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .earliest()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn format_transaction(tx: &Transaction) -> String {
    let offer = tx
        .offer
        .as_ref()
        .map_or("-", |o| o.name.as_str());
    format!(
        "{}  {}  {:<11} {:>6}  {:<12} {}",
        tx.id,
        format_time(tx.time),
        tx.status.to_string(),
        tx.amount,
        tx.customer.phone,
        offer
    )
}
