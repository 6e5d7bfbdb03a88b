// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offer CRUD operations.

use std::str::FromStr;

use payrelay_core::types::{Offer, OfferTag, OfferType};
use payrelay_core::RelayError;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::queries::text_conversion_error;

const OFFER_COLUMNS: &str = "id, name, ussd_code, price, offer_type, tag, is_site_linked";

pub(crate) fn offer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Offer> {
    let id: String = row.get(0)?;
    let offer_type: String = row.get(4)?;
    let tag: Option<String> = row.get(5)?;
    Ok(Offer {
        id: Uuid::parse_str(&id).map_err(|e| text_conversion_error(0, e))?,
        name: row.get(1)?,
        ussd_code: row.get(2)?,
        price: row.get(3)?,
        offer_type: OfferType::from_str(&offer_type).map_err(|e| text_conversion_error(4, e))?,
        tag: tag
            .map(|t| OfferTag::from_str(&t))
            .transpose()
            .map_err(|e| text_conversion_error(5, e))?,
        is_site_linked: row.get(6)?,
    })
}

/// Insert a new offer.
pub async fn insert_offer(db: &Database, offer: &Offer) -> Result<(), RelayError> {
    let offer = offer.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO offers (id, name, ussd_code, price, offer_type, tag, is_site_linked)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    offer.id.to_string(),
                    offer.name,
                    offer.ussd_code,
                    offer.price,
                    offer.offer_type.to_string(),
                    offer.tag.map(|t| t.to_string()),
                    offer.is_site_linked,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Overwrite an existing offer. Returns `false` if no row matched.
pub async fn update_offer(db: &Database, offer: &Offer) -> Result<bool, RelayError> {
    let offer = offer.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE offers SET name = ?2, ussd_code = ?3, price = ?4, offer_type = ?5,
                 tag = ?6, is_site_linked = ?7
                 WHERE id = ?1",
                params![
                    offer.id.to_string(),
                    offer.name,
                    offer.ussd_code,
                    offer.price,
                    offer.offer_type.to_string(),
                    offer.tag.map(|t| t.to_string()),
                    offer.is_site_linked,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete an offer and, through the foreign key, its app bindings.
pub async fn delete_offer(db: &Database, id: Uuid) -> Result<bool, RelayError> {
    db.connection()
        .call(move |conn| {
            let changed = conn.execute("DELETE FROM offers WHERE id = ?1", params![id.to_string()])?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All offers ordered by price, then name.
pub async fn list_offers(db: &Database) -> Result<Vec<Offer>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {OFFER_COLUMNS} FROM offers ORDER BY price ASC, name ASC"
            ))?;
            let rows = stmt.query_map([], offer_from_row)?;
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
    async fn insert_and_list_round_trips_enums() {
        let (db, _dir) = setup_db().await;
        let mut offer = Offer::new("1GB 24hrs", "*180*5*2*1#", 99);
        offer.offer_type = OfferType::Data;
        offer.tag = Some(OfferTag::NoExpiry);
        insert_offer(&db, &offer).await.unwrap();

        let offers = list_offers(&db).await.unwrap();
        assert_eq!(offers, vec![offer]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_is_sorted_by_price() {
        let (db, _dir) = setup_db().await;
        insert_offer(&db, &Offer::new("big", "*1#", 250)).await.unwrap();
        insert_offer(&db, &Offer::new("small", "*2#", 20)).await.unwrap();

        let prices: Vec<i64> = list_offers(&db).await.unwrap().iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![20, 250]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let (db, _dir) = setup_db().await;
        let mut offer = Offer::new("sms 200", "*3#", 10);
        assert!(!update_offer(&db, &offer).await.unwrap());

        insert_offer(&db, &offer).await.unwrap();
        offer.price = 15;
        assert!(update_offer(&db, &offer).await.unwrap());
        assert_eq!(list_offers(&db).await.unwrap()[0].price, 15);

        assert!(delete_offer(&db, offer.id).await.unwrap());
        assert!(!delete_offer(&db, offer.id).await.unwrap());
        db.close().await.unwrap();
    }
}
