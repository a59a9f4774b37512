//! `alertledger` - ingest bank alert emails into a per-user ledger
//!
//! Drives the ingestion pipeline from a JSON spool of extracted messages and
//! exposes the dead-letter queue, balances and sync sources to operators.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod commands;
mod config;
mod spool;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;

/// Ingest bank alert emails into a per-user ledger.
#[derive(Parser, Debug)]
#[command(name = "alertledger", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run sync cycles against a JSON spool of extracted messages.
    Ingest {
        /// Spool file.
        #[arg(long)]
        spool: PathBuf,
        /// Only sync this source.
        #[arg(long)]
        source: Option<i64>,
    },
    /// Inspect and resolve quarantined messages.
    #[command(subcommand)]
    Dlq(DlqCommand),
    /// Manage monitored mailboxes.
    #[command(subcommand)]
    Source(SourceCommand),
    /// Show the current balance of an account.
    Balance {
        /// Account id.
        #[arg(long)]
        account: i64,
        /// `available` or `current`.
        #[arg(long, default_value = "available")]
        kind: String,
    },
    /// List recent transactions of an account.
    Transactions {
        /// Account id.
        #[arg(long)]
        account: i64,
        /// Maximum rows.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// List registered parsers in evaluation order.
    Parsers,
}

/// Dead-letter queue subcommands.
#[derive(Subcommand, Debug)]
enum DlqCommand {
    /// List a user's entries, newest first.
    List {
        /// Owner.
        #[arg(long)]
        user: i64,
        /// Maximum rows.
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Show one entry with its message snapshot.
    Show {
        /// Owner.
        #[arg(long)]
        user: i64,
        /// Entry id.
        id: i64,
    },
    /// Delete an entry so the message can be processed again.
    Delete {
        /// Owner.
        #[arg(long)]
        user: i64,
        /// Entry id.
        id: i64,
    },
    /// Dispatch a quarantined message again.
    Replay {
        /// Owner.
        #[arg(long)]
        user: i64,
        /// Entry id.
        id: i64,
    },
}

/// Sync source subcommands.
#[derive(Subcommand, Debug)]
enum SourceCommand {
    /// Register a mailbox.
    Add {
        /// Owner.
        #[arg(long)]
        user: i64,
        /// Account the alerts belong to.
        #[arg(long)]
        account: i64,
        /// `chase`, `wells_fargo` or `capital_one`.
        #[arg(long)]
        bank: String,
        /// `credit_card` or `checking`.
        #[arg(long)]
        account_type: String,
        /// Monitored address.
        #[arg(long)]
        email: String,
    },
    /// List active sources.
    List {
        /// Only this user's sources.
        #[arg(long)]
        user: Option<i64>,
    },
    /// Check the mailbox again and clear the error state.
    Reconnect {
        /// Source id.
        id: i64,
        /// Spool file standing in for the mailbox.
        #[arg(long)]
        spool: PathBuf,
    },
    /// Stop syncing a source, keeping its history.
    Deactivate {
        /// Source id.
        id: i64,
    },
    /// Remove a source with its ledger and dead-letter entries.
    Delete {
        /// Source id.
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).await?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting alertledger");

    commands::run(cli.command, &config).await
}
