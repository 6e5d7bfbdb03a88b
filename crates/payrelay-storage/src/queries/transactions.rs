// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transaction queue operations.
//!
//! Queue order is `time` ascending with `rowid` as the tie-breaker, so two
//! transactions stamped with the same minute leave in arrival order.

use std::str::FromStr;

use payrelay_core::types::{Transaction, TransactionStatus, TransactionType};
use payrelay_core::RelayError;
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use crate::database::Database;
use crate::queries::customers::adjust_balance;
use crate::queries::{text_conversion_error, to_json};

const TX_COLUMNS: &str = "id, amount, time, mpesa_message, response_message, status, customer, \
                          offer, transaction_type, retries, created_at, reschedule_info, payment_code";

fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| text_conversion_error(idx, e))
}

fn optional_json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| serde_json::from_str(&r).map_err(|e| text_conversion_error(idx, e)))
        .transpose()
}

fn transaction_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    let id: String = row.get(0)?;
    let status: String = row.get(5)?;
    let tx_type: String = row.get(8)?;
    Ok(Transaction {
        id: Uuid::parse_str(&id).map_err(|e| text_conversion_error(0, e))?,
        amount: row.get(1)?,
        time: row.get(2)?,
        mpesa_message: row.get(3)?,
        response_message: row.get(4)?,
        status: TransactionStatus::from_str(&status).map_err(|e| text_conversion_error(5, e))?,
        customer: json_column(row, 6)?,
        offer: optional_json_column(row, 7)?,
        transaction_type: TransactionType::from_str(&tx_type)
            .map_err(|e| text_conversion_error(8, e))?,
        retries: row.get(9)?,
        created_at: row.get(10)?,
        reschedule_info: optional_json_column(row, 11)?,
        payment_code: row.get(12)?,
    })
}

fn insert_row(conn: &rusqlite::Connection, tx: &Transaction) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO transactions ({TX_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            tx.id.to_string(),
            tx.amount,
            tx.time,
            tx.mpesa_message,
            tx.response_message,
            tx.status.to_string(),
            to_json(&tx.customer)?,
            tx.offer.as_ref().map(to_json).transpose()?,
            tx.transaction_type.to_string(),
            tx.retries,
            tx.created_at,
            tx.reschedule_info.as_ref().map(to_json).transpose()?,
            tx.payment_code,
        ],
    )?;
    Ok(())
}

fn update_row(conn: &rusqlite::Connection, tx: &Transaction) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE transactions SET time = ?2, response_message = ?3, status = ?4,
         customer = ?5, offer = ?6, retries = ?7, reschedule_info = ?8
         WHERE id = ?1",
        params![
            tx.id.to_string(),
            tx.time,
            tx.response_message,
            tx.status.to_string(),
            to_json(&tx.customer)?,
            tx.offer.as_ref().map(to_json).transpose()?,
            tx.retries,
            tx.reschedule_info.as_ref().map(to_json).transpose()?,
        ],
    )?;
    Ok(changed > 0)
}

/// Persist a new transaction. Returns its id.
pub async fn insert_transaction(db: &Database, tx: &Transaction) -> Result<Uuid, RelayError> {
    let tx = tx.clone();
    db.connection()
        .call(move |conn| {
            insert_row(conn, &tx)?;
            Ok(tx.id)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Persist a new transaction and add `balance_delta` to its customer's
/// balance. Both writes commit together or not at all.
pub async fn insert_transaction_with_balance(
    db: &Database,
    tx: &Transaction,
    balance_delta: i64,
) -> Result<Uuid, RelayError> {
    let tx = tx.clone();
    db.connection()
        .call(move |conn| {
            let sql_tx = conn.transaction()?;
            insert_row(&sql_tx, &tx)?;
            adjust_balance(&sql_tx, &tx.customer.phone, balance_delta)?;
            sql_tx.commit()?;
            Ok(tx.id)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_transaction(db: &Database, id: Uuid) -> Result<Option<Transaction>, RelayError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {TX_COLUMNS} FROM transactions WHERE id = ?1"),
                params![id.to_string()],
                transaction_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Head of the queue. With `skip_unmatched`, `UNMATCHED` rows are passed over.
pub async fn oldest_transaction(
    db: &Database,
    skip_unmatched: bool,
) -> Result<Option<Transaction>, RelayError> {
    db.connection()
        .call(move |conn| {
            let filter = if skip_unmatched {
                "WHERE status <> 'UNMATCHED'"
            } else {
                ""
            };
            conn.query_row(
                &format!(
                    "SELECT {TX_COLUMNS} FROM transactions {filter}
                     ORDER BY time ASC, rowid ASC LIMIT 1"
                ),
                [],
                transaction_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Rewrite the mutable fields of an existing transaction.
pub async fn update_transaction(db: &Database, tx: &Transaction) -> Result<bool, RelayError> {
    let tx = tx.clone();
    db.connection()
        .call(move |conn| update_row(conn, &tx))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Rewrite an existing transaction and add `balance_delta` to its customer's
/// balance in one commit. Nothing is written when the transaction is absent.
pub async fn update_transaction_with_balance(
    db: &Database,
    tx: &Transaction,
    balance_delta: i64,
) -> Result<bool, RelayError> {
    let tx = tx.clone();
    db.connection()
        .call(move |conn| {
            let sql_tx = conn.transaction()?;
            if !update_row(&sql_tx, &tx)? {
                return Ok(false);
            }
            adjust_balance(&sql_tx, &tx.customer.phone, balance_delta)?;
            sql_tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn delete_transaction(db: &Database, id: Uuid) -> Result<bool, RelayError> {
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM transactions WHERE id = ?1",
                params![id.to_string()],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn count_transactions(db: &Database) -> Result<u64, RelayError> {
    db.connection()
        .call(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Every transaction in queue order.
pub async fn list_transactions(db: &Database) -> Result<Vec<Transaction>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TX_COLUMNS} FROM transactions ORDER BY time ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map([], transaction_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
