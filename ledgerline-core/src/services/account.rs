//! Account service - opening, lookups and status changes

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use super::audit::{ops, AuditInterceptor};
use super::client_validation::ClientValidation;
use super::locks::AccountLocks;
use super::reference::generate_account_number;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountStatus, AccountType, RequestContext};
use crate::ports::{atomically, LedgerStore};

/// Account lifecycle operations
pub struct AccountService {
    ledger: Arc<dyn LedgerStore>,
    validation: Arc<ClientValidation>,
    audit: Arc<AuditInterceptor>,
    locks: Arc<AccountLocks>,
}

impl AccountService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        validation: Arc<ClientValidation>,
        audit: Arc<AuditInterceptor>,
        locks: Arc<AccountLocks>,
    ) -> Self {
        Self {
            ledger,
            validation,
            audit,
            locks,
        }
    }

    /// Open a new empty account for `client_id`
    pub fn open_account(
        &self,
        ctx: &RequestContext,
        client_id: i64,
        account_type: AccountType,
    ) -> Result<Account> {
        self.audit
            .call(&ops::OPEN_ACCOUNT, ctx)
            .client(client_id)
            .run(|| {
                self.validation.validate_client_can_transact(client_id)?;

                atomically(&*self.ledger, |unit| {
                    let number = generate_account_number(|n| unit.account_number_exists(n))?;
                    let mut account = Account::new(client_id, number, account_type);
                    account.id = unit.insert_account(&account)?;
                    info!(
                        account_id = account.id,
                        client_id,
                        account_number = %account.account_number,
                        "account opened"
                    );
                    Ok(account)
                })
            })
    }

    /// Move an account to `status`. CLOSED is terminal.
    pub fn update_account_status(
        &self,
        ctx: &RequestContext,
        account_id: i64,
        status: AccountStatus,
    ) -> Result<Account> {
        let before = self.ledger.find_account(account_id);
        let mut call = self.audit.call(&ops::UPDATE_ACCOUNT_STATUS, ctx).entity(account_id);
        if let Ok(Some(account)) = &before {
            call = call.before(account).client(account.client_id);
        }
        call.run(|| self.change_status(before?, account_id, status))
    }

    pub fn close_account(&self, ctx: &RequestContext, account_id: i64) -> Result<Account> {
        let before = self.ledger.find_account(account_id);
        let mut call = self.audit.call(&ops::CLOSE_ACCOUNT, ctx).entity(account_id);
        if let Ok(Some(account)) = &before {
            call = call.before(account).client(account.client_id);
        }
        call.run(|| self.change_status(before?, account_id, AccountStatus::Closed))
    }

    pub fn get_account(&self, account_id: i64) -> Result<Account> {
        let account = self.require_account(account_id)?;
        self.validation.ensure_not_blacklisted(account.client_id)?;
        Ok(account)
    }

    pub fn get_account_by_number(&self, account_number: &str) -> Result<Account> {
        let account = self
            .ledger
            .find_account_by_number(account_number)?
            .ok_or_else(|| Error::not_found(format!("Account not found: {}", account_number)))?;
        self.validation.ensure_not_blacklisted(account.client_id)?;
        Ok(account)
    }

    /// Accounts owned by `client_id`, newest first
    pub fn accounts_for_client(&self, client_id: i64) -> Result<Vec<Account>> {
        self.validation.ensure_not_blacklisted(client_id)?;
        self.ledger.accounts_by_client(client_id)
    }

    pub fn accounts_by_status(&self, status: AccountStatus) -> Result<Vec<Account>> {
        self.ledger.accounts_by_status(status)
    }

    pub fn accounts_by_type(&self, account_type: AccountType) -> Result<Vec<Account>> {
        self.ledger.accounts_by_type(account_type)
    }

    pub fn balance(&self, account_id: i64) -> Result<Decimal> {
        Ok(self.get_account(account_id)?.balance)
    }

    /// Whether the account is active and its owner is cleared by the gate.
    /// Never fails closed with an error, a gate failure reads as `false`.
    pub fn can_transact(&self, account_id: i64) -> Result<bool> {
        let account = self.require_account(account_id)?;
        if !account.is_active() {
            return Ok(false);
        }
        Ok(self.validation.validate_client_can_transact(account.client_id).is_ok())
    }

    fn change_status(
        &self,
        loaded: Option<Account>,
        account_id: i64,
        status: AccountStatus,
    ) -> Result<Account> {
        let account = loaded.ok_or_else(|| Error::not_found(format!("Account not found: {}", account_id)))?;
        self.validation.validate_client_can_transact(account.client_id)?;

        let _locks = self.locks.acquire(&[account_id])?;
        atomically(&*self.ledger, |unit| {
            let mut account = unit
                .load_account(account_id)?
                .ok_or_else(|| Error::not_found(format!("Account not found: {}", account_id)))?;
            let previous = account.status;
            account.change_status(status)?;
            unit.save_account(&account)?;
            info!(account_id, from = %previous, to = %status, "account status changed");
            Ok(account)
        })
    }

    fn require_account(&self, account_id: i64) -> Result<Account> {
        self.ledger
            .find_account(account_id)?
            .ok_or_else(|| Error::not_found(format!("Account not found: {}", account_id)))
    }
}
