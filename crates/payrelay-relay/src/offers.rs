// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory offer catalog with write-through persistence.
//!
//! The cache is loaded once from the store and kept in price order. Every
//! mutation hits the store first, so a failed write never leaves the cache
//! ahead of the durable copy.

use std::sync::Arc;

use payrelay_core::types::{Offer, SmsMessage};
use payrelay_core::{RelayError, StorageAdapter};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

pub struct OfferCatalog {
    storage: Arc<dyn StorageAdapter>,
    offers: RwLock<Vec<Offer>>,
}

impl OfferCatalog {
    /// Build the catalog from every offer in the store.
    pub async fn load(storage: Arc<dyn StorageAdapter>) -> Result<Self, RelayError> {
        let mut offers = storage.list_offers().await?;
        sort(&mut offers);
        info!(count = offers.len(), "offer catalog loaded");
        Ok(Self {
            storage,
            offers: RwLock::new(offers),
        })
    }

    pub async fn add(&self, offer: Offer) -> Result<(), RelayError> {
        self.storage.insert_offer(&offer).await?;
        debug!(offer_id = %offer.id, price = offer.price, "offer added");
        let mut offers = self.offers.write().await;
        offers.push(offer);
        sort(&mut offers);
        Ok(())
    }

    pub async fn update(&self, offer: Offer) -> Result<(), RelayError> {
        if !self.storage.update_offer(&offer).await? {
            return Err(RelayError::NotFound {
                entity: "offer",
                id: offer.id.to_string(),
            });
        }
        let mut offers = self.offers.write().await;
        offers.retain(|o| o.id != offer.id);
        offers.push(offer);
        sort(&mut offers);
        Ok(())
    }

    /// Returns `false` when the offer did not exist.
    pub async fn delete(&self, id: Uuid) -> Result<bool, RelayError> {
        let removed = self.storage.delete_offer(id).await?;
        self.offers.write().await.retain(|o| o.id != id);
        Ok(removed)
    }

    pub async fn get(&self, id: Uuid) -> Option<Offer> {
        self.offers.read().await.iter().find(|o| o.id == id).cloned()
    }

    /// Exact-price lookup among ordinary offers.
    pub async fn find_offer_by_price(&self, amount: i64) -> Option<Offer> {
        self.find(amount, false).await
    }

    /// Exact-price lookup for a payment. Site-linked offers are only
    /// candidates for site-linked payments, and the reverse.
    pub async fn match_payment(&self, sms: &SmsMessage) -> Option<Offer> {
        self.find(sms.amount(), sms.is_site_linked()).await
    }

    pub async fn all(&self) -> Vec<Offer> {
        self.offers.read().await.clone()
    }

    async fn find(&self, amount: i64, site_linked: bool) -> Option<Offer> {
        self.offers
            .read()
            .await
            .iter()
            .find(|o| o.price == amount && o.is_site_linked == site_linked)
            .cloned()
    }
}

/// Price, then name, then id. The first match for a price is deterministic.
fn sort(offers: &mut [Offer]) {
    offers.sort_by(|a, b| {
        a.price
            .cmp(&b.price)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use payrelay_config::model::StorageConfig;
    use payrelay_core::types::PaymentDetails;
    use payrelay_storage::SqliteStorage;

    async fn storage() -> (tempfile::TempDir, Arc<dyn StorageAdapter>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("offers.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        (dir, Arc::new(storage))
    }

    fn payment(amount: i64, site_linked: bool) -> SmsMessage {
        let details = PaymentDetails {
            sender_name: "John Doe".into(),
            sender_phone: "0712345678".into(),
            amount,
            message: "text".into(),
            time: 0,
            payment_code: Some("QWE123XR".into()),
        };
        if site_linked {
            SmsMessage::SiteLinkPayment(details)
        } else {
            SmsMessage::StandardPayment(details)
        }
    }

    #[tokio::test]
    async fn exact_price_only() {
        let (_dir, storage) = storage().await;
        let catalog = OfferCatalog::load(storage).await.unwrap();
        catalog.add(Offer::new("1GB", "*544*1#", 50)).await.unwrap();
        catalog.add(Offer::new("2GB", "*544*2#", 100)).await.unwrap();

        assert_eq!(catalog.find_offer_by_price(50).await.unwrap().name, "1GB");
        assert!(catalog.find_offer_by_price(49).await.is_none());
        assert!(catalog.find_offer_by_price(51).await.is_none());
    }

    #[tokio::test]
    async fn ties_resolve_by_name() {
        let (_dir, storage) = storage().await;
        let catalog = OfferCatalog::load(storage).await.unwrap();
        catalog.add(Offer::new("Zed", "*1#", 20)).await.unwrap();
        catalog.add(Offer::new("Alpha", "*2#", 20)).await.unwrap();
        assert_eq!(catalog.find_offer_by_price(20).await.unwrap().name, "Alpha");
    }

    #[tokio::test]
    async fn site_linked_offers_match_site_linked_payments_only() {
        let (_dir, storage) = storage().await;
        let catalog = OfferCatalog::load(storage).await.unwrap();
        let mut linked = Offer::new("Site 250", "*250#", 250);
        linked.is_site_linked = true;
        catalog.add(linked).await.unwrap();

        assert!(catalog.match_payment(&payment(250, false)).await.is_none());
        assert_eq!(
            catalog.match_payment(&payment(250, true)).await.unwrap().name,
            "Site 250"
        );
    }

    #[tokio::test]
    async fn reload_sees_persisted_offers() {
        let (_dir, storage) = storage().await;
        let catalog = OfferCatalog::load(storage.clone()).await.unwrap();
        let offer = Offer::new("1GB", "*544*1#", 50);
        let id = offer.id;
        catalog.add(offer).await.unwrap();

        let reloaded = OfferCatalog::load(storage).await.unwrap();
        assert_eq!(reloaded.get(id).await.unwrap().price, 50);
    }

    #[tokio::test]
    async fn update_and_delete_write_through() {
        let (_dir, storage) = storage().await;
        let catalog = OfferCatalog::load(storage.clone()).await.unwrap();
        let mut offer = Offer::new("1GB", "*544*1#", 50);
        catalog.add(offer.clone()).await.unwrap();

        offer.price = 55;
        catalog.update(offer.clone()).await.unwrap();
        assert!(catalog.find_offer_by_price(50).await.is_none());
        assert_eq!(storage.list_offers().await.unwrap()[0].price, 55);

        assert!(catalog.delete(offer.id).await.unwrap());
        assert!(!catalog.delete(offer.id).await.unwrap());
        assert!(catalog.all().await.is_empty());
    }

    #[tokio::test]
    async fn update_of_unknown_offer_is_not_found() {
        let (_dir, storage) = storage().await;
        let catalog = OfferCatalog::load(storage).await.unwrap();
        let err = catalog.update(Offer::new("ghost", "*0#", 1)).await.unwrap_err();
        assert!(matches!(err, RelayError::NotFound { entity: "offer", .. }));
    }
}
