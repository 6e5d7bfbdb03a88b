// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `payrelay apps` subcommands.

use payrelay_config::model::PayrelayConfig;
use payrelay_core::RelayError;

use crate::AppsCommands;
use crate::store::Stack;

pub async fn run(config: &PayrelayConfig, action: AppsCommands) -> Result<(), RelayError> {
    let stack = Stack::open(config).await?;
    let result = match action {
        AppsCommands::List => {
            let apps = stack.registry.apps().await;
            if apps.is_empty() {
                println!("no apps have connected yet");
            }
            for app in apps {
                let presence = if app.is_online { "online" } else { "offline" };
                println!(
                    "{:<20} {:<24} {:<8} sent={}",
                    app.connect_id, app.app_name, presence, app.messages_sent
                );
            }
            Ok(())
        }
        AppsCommands::Bind {
            connect_id,
            offer_id,
        } => {
            if stack.catalog.get(offer_id).await.is_none() {
                Err(RelayError::NotFound {
                    entity: "offer",
                    id: offer_id.to_string(),
                })
            } else {
                stack.registry.bind_offer(&connect_id, offer_id).await?;
                println!("bound {offer_id} to {connect_id}");
                Ok(())
            }
        }
        AppsCommands::Unbind {
            connect_id,
            offer_id,
        } => {
            if stack.registry.unbind_offer(&connect_id, offer_id).await? {
                println!("unbound {offer_id} from {connect_id}");
            } else {
                println!("{connect_id} was not bound to {offer_id}");
            }
            Ok(())
        }
        AppsCommands::Remove { connect_id } => {
            if stack.registry.remove(&connect_id).await? {
                println!("removed {connect_id}");
                Ok(())
            } else {
                Err(RelayError::NotFound {
                    entity: "app",
                    id: connect_id,
                })
            }
        }
    };
    stack.close().await?;
    result
}
