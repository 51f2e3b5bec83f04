//! Ledger store port - accounts and transactions
//!
//! Reads go straight to the store. Every write happens inside a unit of work:
//! the store hands a [`LedgerUnit`] to the caller's closure and commits only
//! if the closure returns `Ok`. Any error rolls the whole unit back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountStatus, AccountType, Transaction, TransactionStatus, TransactionType,
};

/// Durable storage for accounts and transactions
pub trait LedgerStore: Send + Sync {
    // === Accounts ===

    fn find_account(&self, id: i64) -> Result<Option<Account>>;

    fn find_account_by_number(&self, account_number: &str) -> Result<Option<Account>>;

    /// Accounts owned by a client, newest first
    fn accounts_by_client(&self, client_id: i64) -> Result<Vec<Account>>;

    /// Accounts in `status`, newest first
    fn accounts_by_status(&self, status: AccountStatus) -> Result<Vec<Account>>;

    /// Accounts of `account_type`, newest first
    fn accounts_by_type(&self, account_type: AccountType) -> Result<Vec<Account>>;

    fn count_accounts(&self) -> Result<i64>;

    fn count_accounts_by_status(&self, status: AccountStatus) -> Result<i64>;

    fn count_accounts_by_type(&self, account_type: AccountType) -> Result<i64>;

    // === Transactions ===

    fn find_transaction(&self, id: i64) -> Result<Option<Transaction>>;

    fn find_transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>>;

    /// Transactions posted to an account, newest first
    fn transactions_by_account(&self, account_id: i64) -> Result<Vec<Transaction>>;

    /// Transactions of all accounts owned by a client, newest first
    fn transactions_by_client(&self, client_id: i64) -> Result<Vec<Transaction>>;

    /// Transactions of an account created in `[start, end]`, newest first
    fn transactions_between(
        &self,
        account_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;

    /// Transactions of every account owned by a client created in `[start, end]`
    fn client_transactions_between(
        &self,
        client_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;

    /// Transactions of all accounts created in `[start, end]`, newest first
    fn transactions_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Transaction>>;

    fn transactions_by_type(&self, transaction_type: TransactionType) -> Result<Vec<Transaction>>;

    fn count_transactions_by_type(&self, transaction_type: TransactionType) -> Result<i64>;

    /// Sum of the amounts of COMPLETED transactions of one type, zero if none
    fn total_amount_by_type(&self, transaction_type: TransactionType) -> Result<Decimal>;

    fn reference_exists(&self, reference: &str) -> Result<bool>;

    // === Units of work ===

    /// Run `work` inside one atomic unit. Commits on `Ok`, rolls back on `Err`.
    fn in_unit_of_work(&self, work: &mut dyn FnMut(&mut dyn LedgerUnit) -> Result<()>) -> Result<()>;
}

/// Run `work` in a unit of work on `store` and hand back what it produced
pub fn atomically<T, F>(store: &dyn LedgerStore, mut work: F) -> Result<T>
where
    F: FnMut(&mut dyn LedgerUnit) -> Result<T>,
{
    let mut output = None;
    store.in_unit_of_work(&mut |unit| {
        output = Some(work(unit)?);
        Ok(())
    })?;
    output.ok_or_else(|| Error::database("Unit of work committed without producing a result"))
}

/// Operations available inside a unit of work
///
/// Nothing written through a unit is visible to other readers until the
/// unit commits.
pub trait LedgerUnit {
    fn load_account(&mut self, id: i64) -> Result<Option<Account>>;

    /// Insert a new account and return its id
    fn insert_account(&mut self, account: &Account) -> Result<i64>;

    /// Persist balance, status and `updated_at` of an existing account
    fn save_account(&mut self, account: &Account) -> Result<()>;

    fn account_number_exists(&mut self, account_number: &str) -> Result<bool>;

    fn load_transaction(&mut self, id: i64) -> Result<Option<Transaction>>;

    fn load_transaction_by_reference(&mut self, reference: &str) -> Result<Option<Transaction>>;

    /// Insert a transaction and return its id
    fn insert_transaction(&mut self, tx: &Transaction) -> Result<i64>;

    fn update_transaction_status(
        &mut self,
        id: i64,
        status: TransactionStatus,
        failure_reason: Option<&str>,
    ) -> Result<()>;

    fn reference_exists(&mut self, reference: &str) -> Result<bool>;
}
