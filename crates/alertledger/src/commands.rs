//! Subcommand handlers.

use std::sync::Arc;

use alertledger_core::{
    AccountId, AccountType, Bank, BalanceType, CycleReport, Database, Dispatcher, Ingestor,
    NewSyncSource, ParserRegistry, SyncSourceId, UserId,
};
use anyhow::{Context, bail};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::spool::JsonSpool;
use crate::{Commands, DlqCommand, SourceCommand};

/// Execute one subcommand.
pub async fn run(command: Commands, config: &Config) -> anyhow::Result<()> {
    if matches!(command, Commands::Parsers) {
        list_parsers(config);
        return Ok(());
    }

    let path = config.database_path().await?;
    let path = path
        .to_str()
        .with_context(|| format!("database path {} is not valid UTF-8", path.display()))?;
    let db = Database::new(path).await.context("opening ledger database")?;

    match command {
        Commands::Ingest { spool, source } => {
            let ingestor = Ingestor::new(db, dispatcher(config));
            let spool = JsonSpool::new(spool);
            info!(spool = %spool.path().display(), "Ingesting spool");
            match source {
                Some(id) => {
                    let report = ingestor.run_cycle(SyncSourceId(id), &spool).await?;
                    print_report(SyncSourceId(id), &report);
                }
                None => {
                    for (id, result) in ingestor.sync_all(Arc::new(spool)).await? {
                        match result {
                            Ok(report) => print_report(id, &report),
                            Err(e) => println!("source {id}: failed: {e}"),
                        }
                    }
                }
            }
        }
        Commands::Dlq(command) => run_dlq(command, db, config).await?,
        Commands::Source(command) => run_source(command, db, config).await?,
        Commands::Balance { account, kind } => {
            let balance_type = match kind.to_lowercase().as_str() {
                "available" | "available_balance" => BalanceType::AvailableBalance,
                "current" | "current_balance" => BalanceType::CurrentBalance,
                other => bail!("unknown balance kind {other:?}"),
            };
            match db
                .balance_updates()
                .latest(AccountId(account), balance_type)
                .await?
            {
                Some(update) => print_json(&update)?,
                None => println!("no {} recorded for account {account}", balance_type.as_str()),
            }
        }
        Commands::Transactions { account, limit } => {
            let transactions = db
                .transactions()
                .list_for_account(AccountId(account), limit)
                .await?;
            print_json(&transactions)?;
        }
        Commands::Parsers => {}
    }
    Ok(())
}

async fn run_dlq(command: DlqCommand, db: Database, config: &Config) -> anyhow::Result<()> {
    let dead_letters = db.dead_letters();
    match command {
        DlqCommand::List { user, limit } => {
            print_json(&dead_letters.list_for_user(UserId(user), limit).await?)?;
        }
        DlqCommand::Show { user, id } => {
            let entry = dead_letters
                .get_for_user(UserId(user), id)
                .await?
                .ok_or(alertledger_core::Error::DeadLetterNotFound(id))?;
            print_json(&entry)?;
        }
        DlqCommand::Delete { user, id } => {
            if !dead_letters.delete_for_user(UserId(user), id).await? {
                return Err(alertledger_core::Error::DeadLetterNotFound(id).into());
            }
            info!(dead_letter = id, "Deleted dead-letter entry");
            println!("deleted {id}");
        }
        DlqCommand::Replay { user, id } => {
            let ingestor = Ingestor::new(db, dispatcher(config));
            let outcome = ingestor.replay_dead_letter(UserId(user), id).await?;
            println!("{id}: {outcome:?}");
        }
    }
    Ok(())
}

async fn run_source(command: SourceCommand, db: Database, config: &Config) -> anyhow::Result<()> {
    let sources = db.sync_sources();
    match command {
        SourceCommand::Add {
            user,
            account,
            bank,
            account_type,
            email,
        } => {
            let source = sources
                .create(&NewSyncSource::new(
                    UserId(user),
                    AccountId(account),
                    Bank::parse(&bank)?,
                    AccountType::parse(&account_type)?,
                    email,
                ))
                .await?;
            print_json(&source)?;
        }
        SourceCommand::List { user } => {
            let listed = match user {
                Some(user) => sources.list_active_for_user(UserId(user)).await?,
                None => sources.list_active().await?,
            };
            print_json(&listed)?;
        }
        SourceCommand::Reconnect { id, spool } => {
            let ingestor = Ingestor::new(db, dispatcher(config));
            ingestor
                .reconnect(SyncSourceId(id), &JsonSpool::new(spool))
                .await?;
            println!("source {id}: active");
        }
        SourceCommand::Deactivate { id } => {
            sources.deactivate(SyncSourceId(id)).await?;
            println!("source {id}: deactivated");
        }
        SourceCommand::Delete { id } => {
            if !sources.delete(SyncSourceId(id)).await? {
                return Err(alertledger_core::Error::SyncSourceNotFound(SyncSourceId(id)).into());
            }
            println!("source {id}: deleted");
        }
    }
    Ok(())
}

fn dispatcher(config: &Config) -> Dispatcher {
    Dispatcher::new(ParserRegistry::with_defaults())
        .with_handled_kinds(config.handled_alert_kinds.iter().copied())
}

fn list_parsers(config: &Config) {
    let dispatcher = dispatcher(config);
    for parser in dispatcher.registry().iter() {
        let caps = parser.capabilities();
        let handled = if dispatcher.handled_kinds().contains(&caps.alert_kind) {
            ""
        } else {
            " (unhandled)"
        };
        println!(
            "{:<32} {:<12} {:<12} {}{handled}",
            parser.name(),
            caps.bank.as_str(),
            caps.account_type.as_str(),
            caps.alert_kind.as_str()
        );
    }
}

fn print_report(id: SyncSourceId, report: &CycleReport) {
    println!(
        "source {id}: fetched {} skipped {} persisted {} quarantined {} already handled {} mismatched {}",
        report.fetched,
        report.skipped,
        report.persisted,
        report.quarantined,
        report.already_handled,
        report.mismatched
    );
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
