// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payrelay - forwards SMS payment confirmations to connected apps.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod apps;
mod ingest;
mod offers;
mod queue;
mod serve;
mod status;
mod store;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Payrelay - forwards SMS payment confirmations to connected apps.
#[derive(Parser, Debug)]
#[command(name = "payrelay", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the relay: read PDU batches from stdin and forward payments.
    Serve,
    /// Admit a single text message and report the outcome.
    Ingest {
        /// Sender address as reported by the modem.
        #[arg(long)]
        sender: String,
        /// Full message body.
        #[arg(long)]
        text: String,
        /// SIM slot the message arrived on.
        #[arg(long)]
        sim: Option<i32>,
    },
    /// Show queue, app and commission totals.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Manage the offer catalog.
    Offers {
        #[command(subcommand)]
        action: OffersCommands,
    },
    /// Manage connected apps and their offer bindings.
    Apps {
        #[command(subcommand)]
        action: AppsCommands,
    },
    /// Inspect and repair the delivery queue.
    Queue {
        #[command(subcommand)]
        action: QueueCommands,
    },
}

#[derive(Subcommand, Debug)]
enum OffersCommands {
    List,
    Add {
        #[arg(long)]
        name: String,
        /// USSD code dialled to buy the bundle.
        #[arg(long)]
        ussd: String,
        /// Exact payment amount that selects this offer.
        #[arg(long)]
        price: i64,
        /// DATA, VOICE, SMS or NONE.
        #[arg(long, default_value = "DATA")]
        offer_type: String,
        /// HOURLY, DAILY, WEEKLY, MONTHLY or NO_EXPIRY.
        #[arg(long)]
        tag: Option<String>,
        /// Only match payments made through the site link.
        #[arg(long)]
        site_linked: bool,
    },
    Remove {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
enum AppsCommands {
    List,
    /// Route an offer's payments to an app.
    Bind { connect_id: String, offer_id: Uuid },
    Unbind { connect_id: String, offer_id: Uuid },
    Remove { connect_id: String },
}

#[derive(Subcommand, Debug)]
enum QueueCommands {
    List {
        #[arg(long)]
        json: bool,
    },
    /// Schedule a transaction for another attempt.
    Retry { id: Uuid },
    /// Move a transaction to a new delivery time.
    Reschedule {
        id: Uuid,
        /// Delivery time as epoch milliseconds; defaults to now.
        #[arg(long)]
        at: Option<i64>,
    },
    /// Attach an offer to an unmatched transaction.
    Assign { id: Uuid, offer_id: Uuid },
    Delete { id: Uuid },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match payrelay_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            payrelay_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.agent.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Ingest { sender, text, sim }) => {
            ingest::run_ingest(&config, &sender, &text, sim).await
        }
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Offers { action }) => offers::run(&config, action).await,
        Some(Commands::Apps { action }) => apps::run(&config, action).await,
        Some(Commands::Queue { action }) => queue::run(&config, action).await,
        None => {
            println!("payrelay: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Installs the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("payrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ingest() {
        let cli = Cli::try_parse_from([
            "payrelay", "ingest", "--sender", "MPESA", "--text", "hello", "--sim", "1",
        ])
        .unwrap();
        let Some(Commands::Ingest { sender, sim, .. }) = cli.command else {
            panic!("expected ingest");
        };
        assert_eq!(sender, "MPESA");
        assert_eq!(sim, Some(1));
    }

    #[test]
    fn parses_queue_reschedule() {
        let id = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "payrelay",
            "queue",
            "reschedule",
            &id.to_string(),
            "--at",
            "1717594200000",
        ])
        .unwrap();
        let Some(Commands::Queue {
            action: QueueCommands::Reschedule { id: parsed, at },
        }) = cli.command
        else {
            panic!("expected queue reschedule");
        };
        assert_eq!(parsed, id);
        assert_eq!(at, Some(1_717_594_200_000));
    }

    #[test]
    fn rejects_bad_uuid() {
        assert!(Cli::try_parse_from(["payrelay", "offers", "remove", "not-a-uuid"]).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn binary_loads_config_defaults() {
        let config = payrelay_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.agent.name, "payrelay");
    }
}
