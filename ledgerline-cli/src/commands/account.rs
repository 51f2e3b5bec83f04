//! Account commands - open, show, list, status, close, balance

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::{get_context, Invocation};
use crate::output;
use ledgerline_core::{Account, AccountStatus, AccountType};

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account for a client
    Open {
        /// Owning client ID
        #[arg(long)]
        client_id: i64,
        /// SAVINGS, CHECKING or BUSINESS
        #[arg(long = "type", default_value = "SAVINGS")]
        account_type: AccountType,
    },
    /// Show one account by ID or account number
    Show {
        /// Account ID or ACC number
        account: String,
    },
    /// List accounts of a client, or every account in a status or of a type
    List {
        #[arg(long, required_unless_present_any = ["status", "account_type"], conflicts_with_all = ["status", "account_type"])]
        client_id: Option<i64>,
        /// ACTIVE, SUSPENDED or CLOSED
        #[arg(long, conflicts_with = "account_type")]
        status: Option<AccountStatus>,
        /// SAVINGS, CHECKING or BUSINESS
        #[arg(long = "type")]
        account_type: Option<AccountType>,
    },
    /// Change the status of an account
    Status {
        account_id: i64,
        /// ACTIVE, SUSPENDED or CLOSED
        status: AccountStatus,
    },
    /// Close an account (cannot be undone)
    Close {
        account_id: i64,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
    /// Show the balance of an account
    Balance { account_id: i64 },
}

pub fn run(inv: &Invocation, command: AccountCommands) -> Result<()> {
    let ctx = get_context()?;
    let accounts = &ctx.account_service;

    match command {
        AccountCommands::Open { client_id, account_type } => {
            let account = accounts.open_account(&inv.request, client_id, account_type)?;
            if inv.json {
                return output::json(&account);
            }
            output::success(&format!(
                "Opened {} account {} (id {})",
                account.account_type, account.account_number, account.id
            ));
        }
        AccountCommands::Show { account } => {
            let account = match account.parse::<i64>() {
                Ok(id) => accounts.get_account(id)?,
                Err(_) => accounts.get_account_by_number(&account)?,
            };
            if inv.json {
                return output::json(&account);
            }
            print_accounts(&[account]);
        }
        AccountCommands::List { client_id, status, account_type } => {
            let list = match (client_id, status, account_type) {
                (Some(client_id), _, _) => accounts.accounts_for_client(client_id)?,
                (None, Some(status), _) => accounts.accounts_by_status(status)?,
                (None, None, Some(account_type)) => accounts.accounts_by_type(account_type)?,
                (None, None, None) => Vec::new(),
            };
            if inv.json {
                return output::json(&list);
            }
            if list.is_empty() {
                println!("No accounts found.");
                return Ok(());
            }
            print_accounts(&list);
        }
        AccountCommands::Status { account_id, status } => {
            let account = accounts.update_account_status(&inv.request, account_id, status)?;
            if inv.json {
                return output::json(&account);
            }
            output::success(&format!("Account {} is now {}", account.account_number, account.status));
        }
        AccountCommands::Close { account_id, force } => {
            if !force && !inv.json {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Close account {}? This cannot be undone", account_id))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            let account = accounts.close_account(&inv.request, account_id)?;
            if inv.json {
                return output::json(&account);
            }
            output::success(&format!("Closed account {}", account.account_number));
            if !account.balance.is_zero() {
                output::warning(&format!("Account still holds {}", account.balance));
            }
        }
        AccountCommands::Balance { account_id } => {
            let balance = accounts.balance(account_id)?;
            let can_transact = accounts.can_transact(account_id)?;
            if inv.json {
                return output::json(&serde_json::json!({
                    "account_id": account_id,
                    "balance": balance,
                    "can_transact": can_transact,
                }));
            }
            println!("{}", balance.to_string().bold());
            if !can_transact {
                output::warning("Account cannot transact right now");
            }
        }
    }

    Ok(())
}

fn print_accounts(accounts: &[Account]) {
    let mut table = output::create_table();
    table.set_header(vec!["ID", "Number", "Client", "Type", "Status", "Balance", "Updated"]);
    for a in accounts {
        table.add_row(vec![
            a.id.to_string(),
            a.account_number.clone(),
            a.client_id.to_string(),
            a.account_type.to_string(),
            a.status.to_string(),
            a.balance.to_string(),
            output::format_time(&a.updated_at),
        ]);
    }
    println!("{}", table);
}
