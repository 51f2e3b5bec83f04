//! Money movement commands - deposit, withdraw, transfer, reverse

use anyhow::Result;
use colored::Colorize;
use rust_decimal::Decimal;

use super::{get_context, Invocation};
use crate::output;
use ledgerline_core::Transaction;

pub fn deposit(inv: &Invocation, account_id: i64, amount: Decimal, description: Option<&str>) -> Result<()> {
    let ctx = get_context()?;
    let tx = ctx
        .processor
        .process_deposit(&inv.request, account_id, amount, description)?;
    report(inv, "Deposited", &tx)
}

pub fn withdraw(inv: &Invocation, account_id: i64, amount: Decimal, description: Option<&str>) -> Result<()> {
    let ctx = get_context()?;
    let tx = ctx
        .processor
        .process_withdrawal(&inv.request, account_id, amount, description)?;
    report(inv, "Withdrew", &tx)
}

pub fn transfer(inv: &Invocation, from: i64, to: i64, amount: Decimal, description: Option<&str>) -> Result<()> {
    let ctx = get_context()?;
    let receipt = ctx
        .processor
        .process_transfer(&inv.request, from, to, amount, description)?;

    if inv.json {
        return output::json(&receipt);
    }

    output::success(&format!(
        "Transferred {} from account {} to account {}",
        receipt.debit.amount, from, to
    ));
    println!(
        "  debit  {}  balance {}",
        receipt.debit.reference_number.bold(),
        receipt.debit.balance_after
    );
    println!(
        "  credit {}  balance {}",
        receipt.credit.reference_number.bold(),
        receipt.credit.balance_after
    );
    Ok(())
}

pub fn reverse(inv: &Invocation, transaction_id: i64, reason: &str) -> Result<()> {
    let ctx = get_context()?;
    let receipt = ctx
        .processor
        .reverse_transaction(&inv.request, transaction_id, reason)?;

    if inv.json {
        return output::json(&receipt);
    }

    output::success(&format!("Reversed {}", receipt.original_reference));
    for refund in &receipt.refunds {
        println!(
            "  {} account {}  {}  balance {}",
            refund.reference_number.bold(),
            refund.account_id,
            refund.amount,
            refund.balance_after
        );
    }
    Ok(())
}

fn report(inv: &Invocation, verb: &str, tx: &Transaction) -> Result<()> {
    if inv.json {
        return output::json(tx);
    }
    output::success(&format!("{} {} on account {}", verb, tx.amount, tx.account_id));
    println!("  reference {}", tx.reference_number.bold());
    println!("  balance   {}", tx.balance_after);
    Ok(())
}
