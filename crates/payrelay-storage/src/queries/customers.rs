// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer records keyed by phone number.

use payrelay_core::types::Customer;
use payrelay_core::RelayError;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;

fn customer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        account_balance: row.get(3)?,
        last_purchase_time: row.get(4)?,
    })
}

pub async fn get_customer_by_phone(db: &Database, phone: &str) -> Result<Option<Customer>, RelayError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, phone, account_balance, last_purchase_time
                 FROM customers WHERE phone = ?1",
                params![phone],
                customer_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a customer, or refresh name and last purchase time when the phone
/// is already known. The stored id and balance of an existing row win.
pub async fn upsert_customer(db: &Database, customer: &Customer) -> Result<Customer, RelayError> {
    let customer = customer.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO customers (id, name, phone, account_balance, last_purchase_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(phone) DO UPDATE SET name = excluded.name,
                 last_purchase_time = MAX(last_purchase_time, excluded.last_purchase_time)",
                params![
                    customer.id,
                    customer.name,
                    customer.phone,
                    customer.account_balance,
                    customer.last_purchase_time,
                ],
            )?;
            let stored = tx.query_row(
                "SELECT id, name, phone, account_balance, last_purchase_time
                 FROM customers WHERE phone = ?1",
                params![customer.phone],
                customer_from_row,
            )?;
            tx.commit()?;
            Ok(stored)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Add `delta` to the balance of the customer with `phone` on an open connection.
pub(crate) fn adjust_balance(
    conn: &rusqlite::Connection,
    phone: &str,
    delta: i64,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE customers SET account_balance = account_balance + ?2 WHERE phone = ?1",
        params![phone, delta],
    )?;
    Ok(changed > 0)
}

pub async fn adjust_customer_balance(db: &Database, phone: &str, delta: i64) -> Result<bool, RelayError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| adjust_balance(conn, &phone, delta))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Customers, most recent purchase first.
pub async fn list_customers(db: &Database) -> Result<Vec<Customer>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, phone, account_balance, last_purchase_time
                 FROM customers ORDER BY last_purchase_time DESC",
            )?;
            let rows = stmt.query_map([], customer_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn upsert_keeps_original_id_and_balance() {
        let (db, _dir) = setup_db().await;
        let first = upsert_customer(&db, &Customer::new("JANE", "0711000000", 100))
            .await
            .unwrap();
        assert!(adjust_customer_balance(&db, "0711000000", 50).await.unwrap());

        let second = upsert_customer(&db, &Customer::new("JANE W", "0711000000", 200))
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "JANE W");
        assert_eq!(second.account_balance, 50);
        assert_eq!(second.last_purchase_time, 200);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn older_purchase_does_not_rewind_time() {
        let (db, _dir) = setup_db().await;
        upsert_customer(&db, &Customer::new("A", "0700000001", 500)).await.unwrap();
        let stored = upsert_customer(&db, &Customer::new("A", "0700000001", 100))
            .await
            .unwrap();
        assert_eq!(stored.last_purchase_time, 500);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn lookup_and_balance_of_unknown_phone() {
        let (db, _dir) = setup_db().await;
        assert!(get_customer_by_phone(&db, "0799999999").await.unwrap().is_none());
        assert!(!adjust_customer_balance(&db, "0799999999", 10).await.unwrap());
        assert!(list_customers(&db).await.unwrap().is_empty());
        db.close().await.unwrap();
    }
}
