//! Status command - show ledger statistics

use anyhow::Result;
use colored::Colorize;

use super::{get_context, Invocation};
use crate::output;

pub fn run(inv: &Invocation) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if inv.json {
        return output::json(&status);
    }

    println!("{}", "Ledger Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Accounts".to_string(), status.total_accounts.to_string()]);
    table.add_row(vec!["Active accounts".to_string(), status.active_accounts.to_string()]);
    table.add_row(vec!["Transactions".to_string(), status.total_transactions.to_string()]);
    table.add_row(vec!["Audit events".to_string(), status.audit_events.to_string()]);
    println!("{}", table);
    println!();

    let mut accounts = output::create_table();
    accounts.set_header(vec!["Account type", "Count"]);
    for count in &status.accounts_by_type {
        accounts.add_row(vec![count.kind.to_string(), count.count.to_string()]);
    }
    println!("{}", accounts);
    println!();

    let mut volume = output::create_table();
    volume.set_header(vec!["Transaction type", "Count", "Completed amount"]);
    for row in &status.transactions_by_type {
        volume.add_row(vec![
            row.kind.to_string(),
            row.count.to_string(),
            row.completed_amount.to_string(),
        ]);
    }
    println!("{}", volume);

    Ok(())
}
