//! Ledgerline CLI - ledger operations and audit trail for operators

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use commands::{account, audit, ledger, status, tx, Invocation};
use ledgerline_core::config::Config;

/// Ledgerline - ledger transactions and audit trail
#[derive(Parser)]
#[command(name = "ledger", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Email recorded as the actor in the audit trail
    #[arg(long, global = true, env = "LEDGERLINE_ACTOR_EMAIL")]
    actor_email: Option<String>,

    /// User id recorded as the actor in the audit trail
    #[arg(long, global = true, env = "LEDGERLINE_ACTOR_ID")]
    actor_id: Option<i64>,

    /// Role recorded as the actor in the audit trail
    #[arg(long, global = true, env = "LEDGERLINE_ACTOR_ROLE", default_value = "OPERATOR")]
    actor_role: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Deposit money into an account
    Deposit {
        /// Account ID
        account_id: i64,
        /// Amount, at most two decimal places
        amount: Decimal,
        /// Free-text description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Withdraw money from an account
    Withdraw {
        /// Account ID
        account_id: i64,
        /// Amount, at most two decimal places
        amount: Decimal,
        /// Free-text description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Move money between two accounts
    Transfer {
        /// Source account ID
        from: i64,
        /// Destination account ID
        to: i64,
        /// Amount, at most two decimal places
        amount: Decimal,
        /// Free-text description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Reverse a completed transaction
    Reverse {
        /// Transaction ID
        transaction_id: i64,
        /// Why the transaction is reversed
        #[arg(long)]
        reason: String,
    },

    /// Inspect transactions
    Tx {
        #[command(subcommand)]
        command: tx::TxCommands,
    },

    /// Search, report on and clean up the audit trail
    Audit {
        #[command(subcommand)]
        command: audit::AuditCommands,
    },

    /// Show ledger statistics
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::failure(&e, json);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let dir = commands::get_ledger_dir()?;
    let config = Config::load(&dir)?;
    init_logging(if cli.verbose { "debug" } else { config.log_level.as_str() });

    let inv = Invocation::new(cli.json, cli.actor_id, cli.actor_email, cli.actor_role);

    match cli.command {
        Commands::Account { command } => account::run(&inv, command),
        Commands::Deposit { account_id, amount, description } => {
            ledger::deposit(&inv, account_id, amount, description.as_deref())
        }
        Commands::Withdraw { account_id, amount, description } => {
            ledger::withdraw(&inv, account_id, amount, description.as_deref())
        }
        Commands::Transfer { from, to, amount, description } => {
            ledger::transfer(&inv, from, to, amount, description.as_deref())
        }
        Commands::Reverse { transaction_id, reason } => ledger::reverse(&inv, transaction_id, &reason),
        Commands::Tx { command } => tx::run(&inv, command),
        Commands::Audit { command } => audit::run(&inv, command),
        Commands::Status => status::run(&inv),
    }
}
