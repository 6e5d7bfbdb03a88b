// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connected app records and their offer bindings.

use payrelay_core::types::ConnectedApp;
use payrelay_core::RelayError;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::queries::text_conversion_error;

/// Insert an app or refresh its name and online flag. `messages_sent` is kept.
pub async fn upsert_app(db: &Database, app: &ConnectedApp) -> Result<(), RelayError> {
    let app = app.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO connected_apps (connect_id, app_name, is_online, messages_sent)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(connect_id) DO UPDATE SET app_name = excluded.app_name,
                 is_online = excluded.is_online",
                params![app.connect_id, app.app_name, app.is_online, app.messages_sent as i64],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn delete_app(db: &Database, connect_id: &str) -> Result<bool, RelayError> {
    let connect_id = connect_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM connected_apps WHERE connect_id = ?1",
                params![connect_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All apps in registration order.
pub async fn list_apps(db: &Database) -> Result<Vec<ConnectedApp>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT connect_id, app_name, is_online, messages_sent
                 FROM connected_apps ORDER BY rowid ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let sent: i64 = row.get(3)?;
                Ok(ConnectedApp {
                    connect_id: row.get(0)?,
                    app_name: row.get(1)?,
                    is_online: row.get(2)?,
                    messages_sent: sent.max(0) as u64,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn set_app_online(db: &Database, connect_id: &str, online: bool) -> Result<bool, RelayError> {
    let connect_id = connect_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE connected_apps SET is_online = ?2 WHERE connect_id = ?1",
                params![connect_id, online],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn set_all_apps_offline(db: &Database) -> Result<(), RelayError> {
    db.connection()
        .call(|conn| {
            conn.execute("UPDATE connected_apps SET is_online = 0", [])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn increment_messages_sent(db: &Database, connect_id: &str) -> Result<(), RelayError> {
    let connect_id = connect_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE connected_apps SET messages_sent = messages_sent + 1 WHERE connect_id = ?1",
                params![connect_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Bind an app to an offer. Binding twice is a no-op.
pub async fn bind_app_offer(db: &Database, connect_id: &str, offer_id: Uuid) -> Result<(), RelayError> {
    let connect_id = connect_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO app_offers (connect_id, offer_id) VALUES (?1, ?2)",
                params![connect_id, offer_id.to_string()],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn unbind_app_offer(
    db: &Database,
    connect_id: &str,
    offer_id: Uuid,
) -> Result<bool, RelayError> {
    let connect_id = connect_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM app_offers WHERE connect_id = ?1 AND offer_id = ?2",
                params![connect_id, offer_id.to_string()],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn list_app_offers(db: &Database) -> Result<Vec<(String, Uuid)>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT connect_id, offer_id FROM app_offers ORDER BY rowid ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let offer_id: String = row.get(1)?;
                Ok((
                    row.get::<_, String>(0)?,
                    Uuid::parse_str(&offer_id).map_err(|e| text_conversion_error(1, e))?,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
