//! DuckDB ledger store implementation
//!
//! One connection behind a mutex. Reads lock the connection for a single
//! statement. A unit of work holds the lock for its whole duration and runs
//! inside a DuckDB transaction, so writers are serialized and nothing a unit
//! writes is visible before commit.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use tracing::warn;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountStatus, AccountType, Transaction, TransactionStatus, TransactionType,
};
use crate::migrations::MIGRATIONS;
use crate::ports::{LedgerStore, LedgerUnit};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

/// Open a DuckDB file, retrying with exponential backoff while another
/// process holds the file lock.
pub(crate) fn open_with_retry(db_path: &Path) -> Result<Connection> {
    let mut attempt = 0;
    loop {
        match try_open_connection(db_path) {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                let err_msg = e.to_string();
                if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    warn!(
                        path = %db_path.display(),
                        delay_ms = delay.as_millis() as u64,
                        attempt = attempt + 1,
                        max = MAX_RETRIES,
                        "database busy, retrying: {}",
                        err_msg
                    );
                    thread::sleep(delay);
                    attempt += 1;
                    continue;
                }
                return Err(e.into());
            }
        }
    }
}

fn try_open_connection(db_path: &Path) -> std::result::Result<Connection, duckdb::Error> {
    // Extension autoloading stays off, the schema needs nothing beyond core DuckDB
    let config = duckdb::Config::default().enable_autoload_extension(false)?;
    Connection::open_with_flags(db_path, config)
}

pub(crate) fn lock_connection<'a>(conn: &'a Mutex<Connection>) -> Result<MutexGuard<'a, Connection>> {
    conn.lock()
        .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
}

/// DuckDB-backed ledger store
pub struct DuckDbLedger {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbLedger {
    /// Open (or create) the ledger database at `db_path`
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = open_with_retry(db_path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        })
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = lock_connection(&self.conn)?;
        Ok(MigrationService::new(&conn, MIGRATIONS).run_pending()?)
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        lock_connection(&self.conn)
    }
}

impl LedgerStore for DuckDbLedger {
    fn find_account(&self, id: i64) -> Result<Option<Account>> {
        select_account(&*self.lock()?, "id = ?", &id)
    }

    fn find_account_by_number(&self, account_number: &str) -> Result<Option<Account>> {
        select_account(&*self.lock()?, "account_number = ?", &account_number)
    }

    fn accounts_by_client(&self, client_id: i64) -> Result<Vec<Account>> {
        select_accounts(&*self.lock()?, "client_id = ?", &client_id)
    }

    fn accounts_by_status(&self, status: AccountStatus) -> Result<Vec<Account>> {
        select_accounts(&*self.lock()?, "status = ?", &status.as_str())
    }

    fn accounts_by_type(&self, account_type: AccountType) -> Result<Vec<Account>> {
        select_accounts(&*self.lock()?, "account_type = ?", &account_type.as_str())
    }

    fn count_accounts(&self) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?)
    }

    fn count_accounts_by_status(&self, status: AccountStatus) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE status = ?",
            [status.as_str()],
            |row| row.get(0),
        )?)
    }

    fn count_accounts_by_type(&self, account_type: AccountType) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE account_type = ?",
            [account_type.as_str()],
            |row| row.get(0),
        )?)
    }

    fn find_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        select_transaction(&*self.lock()?, "id = ?", &id)
    }

    fn find_transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        select_transaction(&*self.lock()?, "reference_number = ?", &reference)
    }

    fn transactions_by_account(&self, account_id: i64) -> Result<Vec<Transaction>> {
        select_transactions(&*self.lock()?, "account_id = ?", &[&account_id])
    }

    fn transactions_by_client(&self, client_id: i64) -> Result<Vec<Transaction>> {
        select_transactions(&*self.lock()?, "client_id = ?", &[&client_id])
    }

    fn transactions_between(
        &self,
        account_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let start = format_timestamp(&start);
        let end = format_timestamp(&end);
        select_transactions(
            &*self.lock()?,
            "account_id = ? AND created_at >= ? AND created_at <= ?",
            &[&account_id, &start, &end],
        )
    }

    fn client_transactions_between(
        &self,
        client_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let start = format_timestamp(&start);
        let end = format_timestamp(&end);
        select_transactions(
            &*self.lock()?,
            "client_id = ? AND created_at >= ? AND created_at <= ?",
            &[&client_id, &start, &end],
        )
    }

    fn transactions_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Transaction>> {
        let start = format_timestamp(&start);
        let end = format_timestamp(&end);
        select_transactions(
            &*self.lock()?,
            "created_at >= ? AND created_at <= ?",
            &[&start, &end],
        )
    }

    fn transactions_by_type(&self, transaction_type: TransactionType) -> Result<Vec<Transaction>> {
        select_transactions(&*self.lock()?, "transaction_type = ?", &[&transaction_type.as_str()])
    }

    fn total_amount_by_type(&self, transaction_type: TransactionType) -> Result<Decimal> {
        let conn = self.lock()?;
        let total: String = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0)::VARCHAR FROM transactions
             WHERE transaction_type = ? AND status = ?",
            [transaction_type.as_str(), TransactionStatus::Completed.as_str()],
            |row| row.get(0),
        )?;
        Ok(parse_decimal(0, &total)?)
    }

    fn count_transactions_by_type(&self, transaction_type: TransactionType) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE transaction_type = ?",
            [transaction_type.as_str()],
            |row| row.get(0),
        )?)
    }

    fn reference_exists(&self, reference: &str) -> Result<bool> {
        reference_taken(&*self.lock()?, reference)
    }

    fn in_unit_of_work(&self, work: &mut dyn FnMut(&mut dyn LedgerUnit) -> Result<()>) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let outcome = {
            let mut unit = DuckDbUnit { conn: &tx };
            work(&mut unit)
        };

        match outcome {
            Ok(()) => {
                tx.commit()?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("rollback failed after {}: {}", e, rollback_err);
                }
                Err(e)
            }
        }
    }
}

/// Unit of work bound to an open DuckDB transaction
struct DuckDbUnit<'c> {
    conn: &'c Connection,
}

impl LedgerUnit for DuckDbUnit<'_> {
    fn load_account(&mut self, id: i64) -> Result<Option<Account>> {
        select_account(self.conn, "id = ?", &id)
    }

    fn insert_account(&mut self, account: &Account) -> Result<i64> {
        let id = self.conn.query_row(
            "INSERT INTO accounts (client_id, account_number, balance, status, account_type, created_at, updated_at)
             VALUES (?, ?, CAST(? AS DECIMAL(19, 2)), ?, ?, ?, ?)
             RETURNING id",
            params![
                account.client_id,
                &account.account_number,
                account.balance.to_string(),
                account.status.as_str(),
                account.account_type.as_str(),
                format_timestamp(&account.created_at),
                format_timestamp(&account.updated_at),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn save_account(&mut self, account: &Account) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE accounts
             SET balance = CAST(? AS DECIMAL(19, 2)), status = ?, updated_at = ?
             WHERE id = ?",
            params![
                account.balance.to_string(),
                account.status.as_str(),
                format_timestamp(&account.updated_at),
                account.id,
            ],
        )?;
        if updated != 1 {
            return Err(Error::database(format!(
                "Expected to update account {}, updated {} rows",
                account.id, updated
            )));
        }
        Ok(())
    }

    fn account_number_exists(&mut self, account_number: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE account_number = ?",
            [account_number],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn load_transaction(&mut self, id: i64) -> Result<Option<Transaction>> {
        select_transaction(self.conn, "id = ?", &id)
    }

    fn load_transaction_by_reference(&mut self, reference: &str) -> Result<Option<Transaction>> {
        select_transaction(self.conn, "reference_number = ?", &reference)
    }

    fn insert_transaction(&mut self, tx: &Transaction) -> Result<i64> {
        let id = self.conn.query_row(
            "INSERT INTO transactions (account_id, client_id, transaction_type, amount, balance_after,
                                       reference_number, description, source_account_id,
                                       destination_account_id, related_reference, status,
                                       failure_reason, created_at)
             VALUES (?, ?, ?, CAST(? AS DECIMAL(19, 2)), CAST(? AS DECIMAL(19, 2)),
                     ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
            params![
                tx.account_id,
                tx.client_id,
                tx.transaction_type.as_str(),
                tx.amount.to_string(),
                tx.balance_after.to_string(),
                &tx.reference_number,
                &tx.description,
                tx.source_account_id,
                tx.destination_account_id,
                &tx.related_reference,
                tx.status.as_str(),
                &tx.failure_reason,
                format_timestamp(&tx.created_at),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn update_transaction_status(
        &mut self,
        id: i64,
        status: TransactionStatus,
        failure_reason: Option<&str>,
    ) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE transactions SET status = ?, failure_reason = COALESCE(?, failure_reason) WHERE id = ?",
            params![status.as_str(), failure_reason, id],
        )?;
        if updated != 1 {
            return Err(Error::not_found(format!("Transaction not found with ID: {}", id)));
        }
        Ok(())
    }

    fn reference_exists(&mut self, reference: &str) -> Result<bool> {
        reference_taken(self.conn, reference)
    }
}

// ============================================================================
// Shared SQL
// ============================================================================

const ACCOUNT_COLUMNS: &str =
    "id, client_id, account_number, balance::VARCHAR, status, account_type, created_at, updated_at";

const TRANSACTION_COLUMNS: &str =
    "id, account_id, client_id, transaction_type, amount::VARCHAR, balance_after::VARCHAR,
     reference_number, description, source_account_id, destination_account_id,
     related_reference, status, failure_reason, created_at";

fn select_account(
    conn: &Connection,
    condition: &str,
    param: &dyn duckdb::ToSql,
) -> Result<Option<Account>> {
    let sql = format!("SELECT {} FROM accounts WHERE {}", ACCOUNT_COLUMNS, condition);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(&[param][..], row_to_account)?;
    Ok(rows.next().transpose()?)
}

fn select_accounts(
    conn: &Connection,
    condition: &str,
    param: &dyn duckdb::ToSql,
) -> Result<Vec<Account>> {
    let sql = format!(
        "SELECT {} FROM accounts WHERE {} ORDER BY created_at DESC, id DESC",
        ACCOUNT_COLUMNS, condition
    );
    let mut stmt = conn.prepare(&sql)?;
    let accounts = stmt
        .query_map(&[param][..], row_to_account)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(accounts)
}

fn select_transaction(
    conn: &Connection,
    condition: &str,
    param: &dyn duckdb::ToSql,
) -> Result<Option<Transaction>> {
    let sql = format!("SELECT {} FROM transactions WHERE {}", TRANSACTION_COLUMNS, condition);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(&[param][..], row_to_transaction)?;
    Ok(rows.next().transpose()?)
}

fn select_transactions(
    conn: &Connection,
    condition: &str,
    params: &[&dyn duckdb::ToSql],
) -> Result<Vec<Transaction>> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE {} ORDER BY created_at DESC, id DESC",
        TRANSACTION_COLUMNS, condition
    );
    let mut stmt = conn.prepare(&sql)?;
    let transactions = stmt
        .query_map(params, row_to_transaction)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(transactions)
}

fn reference_taken(conn: &Connection, reference: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE reference_number = ?",
        [reference],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn row_to_account(row: &duckdb::Row) -> duckdb::Result<Account> {
    let balance: String = row.get(3)?;
    let status: String = row.get(4)?;
    let account_type: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;

    Ok(Account {
        id: row.get(0)?,
        client_id: row.get(1)?,
        account_number: row.get(2)?,
        balance: parse_decimal(3, &balance)?,
        status: AccountStatus::from_str(&status).map_err(|e| conversion_error(4, e))?,
        account_type: AccountType::from_str(&account_type).map_err(|e| conversion_error(5, e))?,
        created_at: parse_timestamp(6, &created_at)?,
        updated_at: parse_timestamp(7, &updated_at)?,
    })
}

fn row_to_transaction(row: &duckdb::Row) -> duckdb::Result<Transaction> {
    let transaction_type: String = row.get(3)?;
    let amount: String = row.get(4)?;
    let balance_after: String = row.get(5)?;
    let status: String = row.get(11)?;
    let created_at: String = row.get(13)?;

    Ok(Transaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        client_id: row.get(2)?,
        transaction_type: TransactionType::from_str(&transaction_type)
            .map_err(|e| conversion_error(3, e))?,
        amount: parse_decimal(4, &amount)?,
        balance_after: parse_decimal(5, &balance_after)?,
        reference_number: row.get(6)?,
        description: row.get(7)?,
        source_account_id: row.get(8)?,
        destination_account_id: row.get(9)?,
        related_reference: row.get(10)?,
        status: TransactionStatus::from_str(&status).map_err(|e| conversion_error(11, e))?,
        failure_reason: row.get(12)?,
        created_at: parse_timestamp(13, &created_at)?,
    })
}

// Helper functions

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically
pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, s: &str) -> duckdb::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_decimal(idx: usize, s: &str) -> duckdb::Result<Decimal> {
    Decimal::from_str(s).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn conversion_error<E>(idx: usize, e: E) -> duckdb::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn open_ledger(dir: &Path) -> DuckDbLedger {
        let ledger = DuckDbLedger::new(&dir.join("ledger.duckdb")).unwrap();
        ledger.ensure_schema().unwrap();
        ledger
    }

    fn insert_account(ledger: &DuckDbLedger, number: &str, balance: Decimal) -> i64 {
        let mut account = Account::new(10, number, AccountType::Checking);
        account.balance = balance;
        let mut id = 0;
        ledger
            .in_unit_of_work(&mut |unit| {
                id = unit.insert_account(&account)?;
                Ok(())
            })
            .unwrap();
        id
    }

    #[test]
    fn test_account_round_trip() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());

        let id = insert_account(&ledger, "ACC00000001", dec!(12.34));
        let account = ledger.find_account(id).unwrap().unwrap();

        assert_eq!(account.account_number, "ACC00000001");
        assert_eq!(account.balance, dec!(12.34));
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.account_type, AccountType::Checking);
        assert!(ledger.find_account(id + 100).unwrap().is_none());
        assert_eq!(
            ledger.find_account_by_number("ACC00000001").unwrap().unwrap().id,
            id
        );
    }

    #[test]
    fn test_failed_unit_rolls_back() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let id = insert_account(&ledger, "ACC00000002", dec!(50.00));

        let result = ledger.in_unit_of_work(&mut |unit| {
            let mut account = unit.load_account(id)?.unwrap();
            account.balance = dec!(0.00);
            unit.save_account(&account)?;
            Err(Error::database("simulated failure"))
        });

        assert!(result.is_err());
        assert_eq!(ledger.find_account(id).unwrap().unwrap().balance, dec!(50.00));
    }

    #[test]
    fn test_reference_numbers_are_unique() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let id = insert_account(&ledger, "ACC00000003", dec!(0));

        let tx = Transaction::new(id, 10, TransactionType::Deposit, dec!(1.00), dec!(1.00), "TXN0001");
        ledger
            .in_unit_of_work(&mut |unit| unit.insert_transaction(&tx).map(|_| ()))
            .unwrap();
        assert!(ledger.reference_exists("TXN0001").unwrap());

        let duplicate = ledger.in_unit_of_work(&mut |unit| unit.insert_transaction(&tx).map(|_| ()));
        assert!(duplicate.is_err());
        assert_eq!(ledger.transactions_by_account(id).unwrap().len(), 1);
    }

    #[test]
    fn test_transaction_round_trip_and_status_update() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let id = insert_account(&ledger, "ACC00000004", dec!(0));

        let mut tx = Transaction::new(id, 10, TransactionType::Transfer, dec!(7.50), dec!(2.50), "TXN0002")
            .with_description(Some("Transfer to ACC00000009: rent".to_string()))
            .with_related_reference("TXN0003");
        tx.destination_account_id = Some(9);

        let mut tx_id = 0;
        ledger
            .in_unit_of_work(&mut |unit| {
                tx_id = unit.insert_transaction(&tx)?;
                unit.update_transaction_status(tx_id, TransactionStatus::Reversed, None)
            })
            .unwrap();

        let stored = ledger.find_transaction_by_reference("TXN0002").unwrap().unwrap();
        assert_eq!(stored.id, tx_id);
        assert_eq!(stored.amount, dec!(7.50));
        assert_eq!(stored.balance_after, dec!(2.50));
        assert_eq!(stored.destination_account_id, Some(9));
        assert_eq!(stored.related_reference.as_deref(), Some("TXN0003"));
        assert_eq!(stored.status, TransactionStatus::Reversed);
        assert!(stored.is_debit_leg());
    }

    #[test]
    fn test_negative_balance_is_rejected_by_schema() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let id = insert_account(&ledger, "ACC00000005", dec!(1.00));

        let result = ledger.in_unit_of_work(&mut |unit| {
            let mut account = unit.load_account(id)?.unwrap();
            account.balance = dec!(-1.00);
            unit.save_account(&account)
        });
        assert!(result.is_err());
        assert_eq!(ledger.find_account(id).unwrap().unwrap().balance, dec!(1.00));
    }

    #[test]
    fn test_counts() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        insert_account(&ledger, "ACC00000006", dec!(0));
        insert_account(&ledger, "ACC00000007", dec!(0));

        assert_eq!(ledger.count_accounts().unwrap(), 2);
        assert_eq!(ledger.count_accounts_by_status(AccountStatus::Active).unwrap(), 2);
        assert_eq!(ledger.count_accounts_by_type(AccountType::Savings).unwrap(), 0);
        assert_eq!(ledger.count_transactions_by_type(TransactionType::Deposit).unwrap(), 0);
        assert_eq!(ledger.accounts_by_client(10).unwrap().len(), 2);
    }

    #[test]
    fn test_accounts_by_status_and_type() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let first = insert_account(&ledger, "ACC00000008", dec!(0));
        let second = insert_account(&ledger, "ACC00000009", dec!(0));
        ledger
            .in_unit_of_work(&mut |unit| {
                let mut account = unit.load_account(first)?.unwrap();
                account.status = AccountStatus::Suspended;
                unit.save_account(&account)
            })
            .unwrap();

        let suspended = ledger.accounts_by_status(AccountStatus::Suspended).unwrap();
        assert_eq!(suspended.len(), 1);
        assert_eq!(suspended[0].id, first);
        assert_eq!(ledger.accounts_by_status(AccountStatus::Active).unwrap()[0].id, second);
        assert!(ledger.accounts_by_status(AccountStatus::Closed).unwrap().is_empty());

        let checking = ledger.accounts_by_type(AccountType::Checking).unwrap();
        assert_eq!(checking.iter().map(|a| a.id).collect::<Vec<_>>(), vec![second, first]);
        assert!(ledger.accounts_by_type(AccountType::Business).unwrap().is_empty());
    }

    #[test]
    fn test_type_queries_and_completed_totals() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let id = insert_account(&ledger, "ACC00000010", dec!(0));

        let deposit = Transaction::new(id, 10, TransactionType::Deposit, dec!(10.25), dec!(10.25), "TXN0101");
        let second = Transaction::new(id, 10, TransactionType::Deposit, dec!(4.75), dec!(15.00), "TXN0102");
        let reversed = Transaction::new(id, 10, TransactionType::Deposit, dec!(100.00), dec!(115.00), "TXN0103");
        let withdrawal = Transaction::new(id, 10, TransactionType::Withdrawal, dec!(1.00), dec!(14.00), "TXN0104");
        ledger
            .in_unit_of_work(&mut |unit| {
                unit.insert_transaction(&deposit)?;
                unit.insert_transaction(&second)?;
                let reversed_id = unit.insert_transaction(&reversed)?;
                unit.update_transaction_status(reversed_id, TransactionStatus::Reversed, None)?;
                unit.insert_transaction(&withdrawal).map(|_| ())
            })
            .unwrap();

        assert_eq!(ledger.transactions_by_type(TransactionType::Deposit).unwrap().len(), 3);
        assert_eq!(ledger.transactions_by_type(TransactionType::Transfer).unwrap().len(), 0);
        assert_eq!(ledger.total_amount_by_type(TransactionType::Deposit).unwrap(), dec!(15.00));
        assert_eq!(ledger.total_amount_by_type(TransactionType::Withdrawal).unwrap(), dec!(1.00));
        assert_eq!(ledger.total_amount_by_type(TransactionType::Refund).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_range_queries_are_inclusive() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let mine = insert_account(&ledger, "ACC00000011", dec!(0));
        let theirs_id = insert_account(&ledger, "ACC00000012", dec!(0));

        let at = Utc::now() - chrono::Duration::hours(2);
        let mut early = Transaction::new(mine, 10, TransactionType::Deposit, dec!(1.00), dec!(1.00), "TXN0201");
        early.created_at = at;
        let mut theirs = Transaction::new(theirs_id, 20, TransactionType::Deposit, dec!(2.00), dec!(2.00), "TXN0202");
        theirs.created_at = at;
        let mut late = Transaction::new(mine, 10, TransactionType::Deposit, dec!(3.00), dec!(4.00), "TXN0203");
        late.created_at = at + chrono::Duration::hours(1);
        ledger
            .in_unit_of_work(&mut |unit| {
                unit.insert_transaction(&early)?;
                unit.insert_transaction(&theirs)?;
                unit.insert_transaction(&late).map(|_| ())
            })
            .unwrap();

        assert_eq!(ledger.transactions_in_range(at, at).unwrap().len(), 2);
        assert_eq!(
            ledger
                .transactions_in_range(at, at + chrono::Duration::hours(1))
                .unwrap()
                .len(),
            3
        );

        let client = ledger
            .client_transactions_between(10, at, at + chrono::Duration::hours(1))
            .unwrap();
        assert_eq!(
            client.iter().map(|t| t.reference_number.as_str()).collect::<Vec<_>>(),
            vec!["TXN0203", "TXN0201"]
        );
        assert!(ledger
            .client_transactions_between(20, at + chrono::Duration::minutes(1), Utc::now())
            .unwrap()
            .is_empty());
    }
}
