//! Transaction inspection commands

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::Subcommand;

use super::{get_context, Invocation};
use crate::output;
use ledgerline_core::{Transaction, TransactionType};

#[derive(Subcommand)]
pub enum TxCommands {
    /// Show one transaction by ID or reference number
    Show {
        /// Transaction ID or reference number
        transaction: String,
    },
    /// List transactions of an account, a client, a type, or a date window
    List {
        /// Account ID
        #[arg(long, conflicts_with_all = ["client_id", "tx_type"])]
        account_id: Option<i64>,
        /// Client ID
        #[arg(long, conflicts_with = "tx_type")]
        client_id: Option<i64>,
        /// DEPOSIT, WITHDRAWAL, TRANSFER or REFUND
        #[arg(long = "type", conflicts_with_all = ["from", "to"])]
        tx_type: Option<TransactionType>,
        /// Only transactions on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Only transactions on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Total amount moved by completed transactions of one type
    Total {
        /// DEPOSIT, WITHDRAWAL, TRANSFER or REFUND
        #[arg(long = "type")]
        tx_type: TransactionType,
    },
}

pub fn run(inv: &Invocation, command: TxCommands) -> Result<()> {
    let ctx = get_context()?;
    let processor = &ctx.processor;

    match command {
        TxCommands::Show { transaction } => {
            let tx = match transaction.parse::<i64>() {
                Ok(id) => processor.get_transaction(id)?,
                Err(_) => processor.get_transaction_by_reference(&transaction)?,
            };
            if inv.json {
                return output::json(&tx);
            }
            print_transactions(&[tx]);
        }
        TxCommands::List { account_id, client_id, tx_type, from, to } => {
            let window = match (from, to) {
                (None, None) => None,
                _ => Some(window(from, to)?),
            };
            let list = match (account_id, client_id, tx_type, window) {
                (Some(account_id), _, _, Some((start, end))) => {
                    processor.transactions_between(account_id, start, end)?
                }
                (Some(account_id), _, _, None) => processor.account_transactions(account_id)?,
                (None, Some(client_id), _, Some((start, end))) => {
                    processor.client_transactions_between(client_id, start, end)?
                }
                (None, Some(client_id), _, None) => processor.client_transactions(client_id)?,
                (None, None, Some(tx_type), _) => processor.transactions_by_type(tx_type)?,
                (None, None, None, Some((start, end))) => processor.transactions_in_range(start, end)?,
                (None, None, None, None) => {
                    bail!("Pass --account-id, --client-id, --type, or a --from/--to window")
                }
            };

            if inv.json {
                return output::json(&list);
            }
            if list.is_empty() {
                println!("No transactions found.");
                return Ok(());
            }
            print_transactions(&list);
        }
        TxCommands::Total { tx_type } => {
            let total = processor.total_amount_by_type(tx_type)?;
            if inv.json {
                return output::json(&serde_json::json!({
                    "transaction_type": tx_type,
                    "completed_amount": total,
                }));
            }
            println!("{}: {}", tx_type, total);
        }
    }

    Ok(())
}

/// Inclusive window from `from` 00:00 to the last millisecond of `to`, or now
fn window(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = day_start(from.unwrap_or_default())?;
    let end = match to {
        Some(day) => day_start(day)? + Duration::days(1) - Duration::milliseconds(1),
        None => Utc::now(),
    };
    Ok((start, end))
}

fn day_start(day: NaiveDate) -> Result<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0)
        .map(|at| at.and_utc())
        .with_context(|| format!("Invalid date: {}", day))
}

fn print_transactions(transactions: &[Transaction]) {
    let mut table = output::create_table();
    table.set_header(vec![
        "ID", "Reference", "Account", "Type", "Amount", "Balance", "Status", "Related", "Created",
    ]);
    for tx in transactions {
        table.add_row(vec![
            tx.id.to_string(),
            tx.reference_number.clone(),
            tx.account_id.to_string(),
            tx.transaction_type.to_string(),
            tx.amount.to_string(),
            tx.balance_after.to_string(),
            tx.status.to_string(),
            output::or_dash(&tx.related_reference),
            output::format_time(&tx.created_at),
        ]);
    }
    println!("{}", table);
}
