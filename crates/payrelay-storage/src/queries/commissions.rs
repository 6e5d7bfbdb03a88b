// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily agent commission totals.

use payrelay_core::types::AgentCommission;
use payrelay_core::RelayError;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;

/// Add `amount` to the running total for `date` (`YYYY-MM-DD`).
pub async fn add_commission(db: &Database, date: &str, amount: f64) -> Result<(), RelayError> {
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO agent_commissions (date, amount) VALUES (?1, ?2)
                 ON CONFLICT(date) DO UPDATE SET amount = amount + excluded.amount",
                params![date, amount],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_commission(db: &Database, date: &str) -> Result<Option<AgentCommission>, RelayError> {
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT date, amount FROM agent_commissions WHERE date = ?1",
                params![date],
                |row| {
                    Ok(AgentCommission {
                        date: row.get(0)?,
                        amount: row.get(1)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All daily totals, newest first.
pub async fn list_commissions(db: &Database) -> Result<Vec<AgentCommission>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare("SELECT date, amount FROM agent_commissions ORDER BY date DESC")?;
            let rows = stmt.query_map([], |row| {
                Ok(AgentCommission {
                    date: row.get(0)?,
                    amount: row.get(1)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
