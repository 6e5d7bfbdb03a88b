// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `payrelay offers` subcommands.

use std::str::FromStr;

use payrelay_config::model::PayrelayConfig;
use payrelay_core::RelayError;
use payrelay_core::types::{Offer, OfferTag, OfferType};

use crate::OffersCommands;
use crate::store::Stack;

pub async fn run(config: &PayrelayConfig, action: OffersCommands) -> Result<(), RelayError> {
    let stack = Stack::open(config).await?;
    let result = match action {
        OffersCommands::List => {
            let offers = stack.catalog.all().await;
            if offers.is_empty() {
                println!("no offers configured");
            }
            for offer in &offers {
                println!("{}", format_offer(offer));
            }
            Ok(())
        }
        OffersCommands::Add {
            name,
            ussd,
            price,
            offer_type,
            tag,
            site_linked,
        } => {
            let offer = build_offer(name, ussd, price, &offer_type, tag.as_deref(), site_linked)?;
            stack.catalog.add(offer.clone()).await?;
            println!("added {}", offer.id);
            Ok(())
        }
        OffersCommands::Remove { id } => {
            if stack.catalog.delete(id).await? {
                println!("removed {id}");
                Ok(())
            } else {
                Err(RelayError::NotFound {
                    entity: "offer",
                    id: id.to_string(),
                })
            }
        }
    };
    stack.close().await?;
    result
}

fn build_offer(
    name: String,
    ussd: String,
    price: i64,
    offer_type: &str,
    tag: Option<&str>,
    site_linked: bool,
) -> Result<Offer, RelayError> {
    if price <= 0 {
        return Err(RelayError::Config(format!("price must be positive, got {price}")));
    }
    let mut offer = Offer::new(name, ussd, price);
    offer.offer_type = OfferType::from_str(offer_type)
        .map_err(|_| RelayError::Config(format!("unknown offer type: {offer_type}")))?;
    offer.tag = tag
        .map(|t| OfferTag::from_str(t).map_err(|_| RelayError::Config(format!("unknown tag: {t}"))))
        .transpose()?;
    offer.is_site_linked = site_linked;
    Ok(offer)
}

fn format_offer(offer: &Offer) -> String {
    let tag = offer.tag.map(|t| format!(" [{t}]")).unwrap_or_default();
    let site = if offer.is_site_linked { " (site link)" } else { "" };
    format!(
        "{}  {:>6}  {:<24} {:<6} {}{tag}{site}",
        offer.id, offer.price, offer.name, offer.offer_type, offer.ussd_code
    )
}
