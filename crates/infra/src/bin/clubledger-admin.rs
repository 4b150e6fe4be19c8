//! Administrative commands for a Postgres-backed club ledger.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use clubledger_accounting::TrialBalance;
use clubledger_core::money::format_minor_units;
use clubledger_infra::{Ledger, LedgerConfig, PostgresLedgerStore};

#[derive(Parser)]
#[command(name = "clubledger-admin", about = "Club ledger administration", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or update the ledger tables
    Migrate,
    /// Insert the default chart of accounts (existing codes are kept)
    SeedAccounts,
    /// Print the trial balance
    TrialBalance {
        /// Only count entries dated on or before this day (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    clubledger_observability::init();

    let cli = Cli::parse();
    let config = LedgerConfig::from_env().context("invalid ledger configuration")?;
    let database_url = config.require_database_url()?;

    let store = PostgresLedgerStore::connect(database_url)
        .await
        .context("failed to connect to the ledger database")?;

    match cli.command {
        Command::Migrate => {
            store.migrate().await.context("migration failed")?;
            tracing::info!("ledger schema is up to date");
        }
        Command::SeedAccounts => {
            let ledger = Ledger::from_config(store, &config);
            let created = ledger.accounts().seed_default_chart().await?;
            println!("{created} account(s) created");
        }
        Command::TrialBalance { as_of, format } => {
            let ledger = Ledger::from_config(store, &config);
            let tb = ledger.query().trial_balance(as_of).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tb)?),
                OutputFormat::Text => print_trial_balance(&tb, config.currency_scale),
            }
        }
    }

    Ok(())
}

fn print_trial_balance(tb: &TrialBalance, scale: u32) {
    let money = |v: u64| format_minor_units(v, scale);
    let signed = |v: i128| {
        let magnitude = u64::try_from(v.unsigned_abs()).map_or_else(|_| v.unsigned_abs().to_string(), money);
        if v < 0 { format!("-{magnitude}") } else { magnitude }
    };

    match tb.as_of {
        Some(date) => println!("Trial balance as of {date}"),
        None => println!("Trial balance"),
    }
    println!("{:<6} {:<28} {:>14} {:>14} {:>14}", "code", "account", "debits", "credits", "balance");
    for row in &tb.rows {
        println!(
            "{:<6} {:<28} {:>14} {:>14} {:>14}",
            row.account.code,
            row.account.name,
            money(row.debits),
            money(row.credits),
            signed(row.balance)
        );
    }
    println!(
        "{:<35} {:>14} {:>14} {}",
        "total",
        money(tb.total_debits),
        money(tb.total_credits),
        if tb.is_balanced() { "balanced" } else { "OUT OF BALANCE" }
    );
}
