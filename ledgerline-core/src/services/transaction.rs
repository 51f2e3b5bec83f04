//! Transaction processor - deposits, withdrawals, transfers and reversals
//!
//! Every money movement follows the same order:
//! 1. validate the amount and load the account(s) read-only
//! 2. ask the client gate about every owning client (fail closed)
//! 3. take the per-account locks, lowest id first
//! 4. reload inside one unit of work, re-check, mutate, persist, commit
//!
//! The gate is consulted before any lock is taken so network latency never
//! extends a lock hold. Audit records are written by the interceptor after
//! the unit has committed or rolled back.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::audit::{ops, AuditInterceptor};
use super::client_validation::ClientValidation;
use super::locks::AccountLocks;
use super::reference::{ReferenceGenerator, DEFAULT_REFERENCE_PREFIX};
use crate::domain::result::{Error, Result};
use crate::domain::{
    validate_amount, Account, RequestContext, ReversalReceipt, Transaction, TransactionStatus,
    TransactionType, TransferReceipt,
};
use crate::ports::{atomically, LedgerStore, LedgerUnit};

/// How many times a transaction may be reversed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReversalPolicy {
    /// The original is marked REVERSED and cannot be reversed again
    #[default]
    Once,
    /// The original stays COMPLETED
    Unlimited,
}

impl fmt::Display for ReversalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once => write!(f, "once"),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

impl FromStr for ReversalPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "once" => Ok(Self::Once),
            "unlimited" => Ok(Self::Unlimited),
            _ => Err(Error::config(format!("Unknown reversal policy: {}", s))),
        }
    }
}

/// Lifecycle of one processor operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Requested,
    Authorizing,
    Mutating,
    Persisting,
    Completed,
    /// Validation or authorization failed, nothing was touched
    Rejected,
    /// Failed after mutation started, the unit of work was rolled back
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Authorizing => "AUTHORIZING",
            Self::Mutating => "MUTATING",
            Self::Persisting => "PERSISTING",
            Self::Completed => "COMPLETED",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
        }
    }
}

struct PhaseTracker {
    operation: &'static str,
    phase: Phase,
}

impl PhaseTracker {
    fn new(operation: &'static str) -> Self {
        debug!(operation, phase = Phase::Requested.as_str(), "transaction phase");
        Self {
            operation,
            phase: Phase::Requested,
        }
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase = phase;
            debug!(operation = self.operation, phase = phase.as_str(), "transaction phase");
        }
    }

    fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.enter(Phase::Completed),
            Err(e) => {
                let exit = if self.phase >= Phase::Mutating {
                    Phase::Failed
                } else {
                    Phase::Rejected
                };
                self.phase = exit;
                if e.is_business() {
                    info!(operation = self.operation, phase = exit.as_str(), code = e.code(), error = %e, "transaction not applied");
                } else {
                    warn!(operation = self.operation, phase = exit.as_str(), error = %e, "transaction not applied");
                }
            }
        }
        result
    }
}

fn tracked<T, F>(operation: &'static str, work: F) -> Result<T>
where
    F: FnOnce(&mut PhaseTracker) -> Result<T>,
{
    let mut phase = PhaseTracker::new(operation);
    let result = work(&mut phase);
    phase.finish(result)
}

/// Applies ledger mutations atomically
pub struct TransactionProcessor {
    ledger: Arc<dyn LedgerStore>,
    validation: Arc<ClientValidation>,
    audit: Arc<AuditInterceptor>,
    locks: Arc<AccountLocks>,
    references: ReferenceGenerator,
    reversal_policy: ReversalPolicy,
}

impl TransactionProcessor {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        validation: Arc<ClientValidation>,
        audit: Arc<AuditInterceptor>,
        locks: Arc<AccountLocks>,
    ) -> Result<Self> {
        Ok(Self {
            ledger,
            validation,
            audit,
            locks,
            references: ReferenceGenerator::new(DEFAULT_REFERENCE_PREFIX)?,
            reversal_policy: ReversalPolicy::default(),
        })
    }

    pub fn with_reference_generator(mut self, references: ReferenceGenerator) -> Self {
        self.references = references;
        self
    }

    pub fn with_reversal_policy(mut self, policy: ReversalPolicy) -> Self {
        self.reversal_policy = policy;
        self
    }

    pub fn reversal_policy(&self) -> ReversalPolicy {
        self.reversal_policy
    }

    // =========================================================================
    // Audited operations
    // =========================================================================

    pub fn process_deposit(
        &self,
        ctx: &RequestContext,
        account_id: i64,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<Transaction> {
        self.audit
            .call(&ops::PROCESS_DEPOSIT, ctx)
            .entity(account_id)
            .run(|| self.deposit(account_id, amount, description))
    }

    pub fn process_withdrawal(
        &self,
        ctx: &RequestContext,
        account_id: i64,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<Transaction> {
        self.audit
            .call(&ops::PROCESS_WITHDRAWAL, ctx)
            .entity(account_id)
            .run(|| self.withdraw(account_id, amount, description))
    }

    pub fn process_transfer(
        &self,
        ctx: &RequestContext,
        source_account_id: i64,
        destination_account_id: i64,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<TransferReceipt> {
        self.audit
            .call(&ops::PROCESS_TRANSFER, ctx)
            .entity(source_account_id)
            .run(|| self.transfer(source_account_id, destination_account_id, amount, description))
    }

    pub fn reverse_transaction(
        &self,
        ctx: &RequestContext,
        transaction_id: i64,
        reason: &str,
    ) -> Result<ReversalReceipt> {
        self.audit
            .call(&ops::REVERSE_TRANSACTION, ctx)
            .entity(transaction_id)
            .run(|| self.reverse(transaction_id, reason))
    }

    // =========================================================================
    // Read paths
    // =========================================================================

    pub fn get_transaction(&self, transaction_id: i64) -> Result<Transaction> {
        let tx = self.require_transaction(transaction_id)?;
        self.validation.ensure_not_blacklisted(tx.client_id)?;
        Ok(tx)
    }

    pub fn get_transaction_by_reference(&self, reference: &str) -> Result<Transaction> {
        let tx = self
            .ledger
            .find_transaction_by_reference(reference)?
            .ok_or_else(|| Error::not_found(format!("Transaction not found: {}", reference)))?;
        self.validation.ensure_not_blacklisted(tx.client_id)?;
        Ok(tx)
    }

    /// Transactions posted to an account, newest first
    pub fn account_transactions(&self, account_id: i64) -> Result<Vec<Transaction>> {
        let account = self.require_account(account_id)?;
        self.validation.ensure_not_blacklisted(account.client_id)?;
        self.ledger.transactions_by_account(account_id)
    }

    /// Transactions across all accounts of a client, newest first
    pub fn client_transactions(&self, client_id: i64) -> Result<Vec<Transaction>> {
        self.validation.ensure_not_blacklisted(client_id)?;
        self.ledger.transactions_by_client(client_id)
    }

    /// Transactions of an account created within `[start, end]`
    pub fn transactions_between(
        &self,
        account_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let account = self.require_account(account_id)?;
        self.validation.ensure_not_blacklisted(account.client_id)?;
        self.ledger.transactions_between(account_id, start, end)
    }

    /// Transactions of every account owned by `client_id` within `[start, end]`
    pub fn client_transactions_between(
        &self,
        client_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        self.validation.ensure_not_blacklisted(client_id)?;
        self.ledger.client_transactions_between(client_id, start, end)
    }

    /// Ledger-wide transactions within `[start, end]`, newest first
    pub fn transactions_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Transaction>> {
        self.ledger.transactions_in_range(start, end)
    }

    pub fn transactions_by_type(&self, transaction_type: TransactionType) -> Result<Vec<Transaction>> {
        self.ledger.transactions_by_type(transaction_type)
    }

    /// Money moved by COMPLETED transactions of one type
    pub fn total_amount_by_type(&self, transaction_type: TransactionType) -> Result<Decimal> {
        self.ledger.total_amount_by_type(transaction_type)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    fn deposit(&self, account_id: i64, amount: Decimal, description: Option<&str>) -> Result<Transaction> {
        tracked("deposit", |phase| {
            let amount = validate_amount(amount)?;
            let account = self.require_account(account_id)?;
            require_active(&account)?;

            phase.enter(Phase::Authorizing);
            self.authorize(&[account.client_id])?;

            let _locks = self.locks.acquire(&[account_id])?;
            phase.enter(Phase::Mutating);
            atomically(&*self.ledger, |unit| {
                let mut account = reload_account(unit, account_id)?;
                account.deposit(amount)?;

                phase.enter(Phase::Persisting);
                unit.save_account(&account)?;
                let reference = self.references.generate(|r| unit.reference_exists(r))?;
                let mut tx = Transaction::new(
                    account.id,
                    account.client_id,
                    TransactionType::Deposit,
                    amount,
                    account.balance,
                    reference,
                )
                .with_description(description.map(str::to_string));
                tx.id = unit.insert_transaction(&tx)?;

                info!(account_id, reference = %tx.reference_number, %amount, "deposit applied");
                Ok(tx)
            })
        })
    }

    fn withdraw(&self, account_id: i64, amount: Decimal, description: Option<&str>) -> Result<Transaction> {
        tracked("withdrawal", |phase| {
            let amount = validate_amount(amount)?;
            let account = self.require_account(account_id)?;
            require_active(&account)?;
            require_funds(&account, amount)?;

            phase.enter(Phase::Authorizing);
            self.authorize(&[account.client_id])?;

            let _locks = self.locks.acquire(&[account_id])?;
            phase.enter(Phase::Mutating);
            atomically(&*self.ledger, |unit| {
                let mut account = reload_account(unit, account_id)?;
                require_active(&account)?;
                account.withdraw(amount)?;

                phase.enter(Phase::Persisting);
                unit.save_account(&account)?;
                let reference = self.references.generate(|r| unit.reference_exists(r))?;
                let mut tx = Transaction::new(
                    account.id,
                    account.client_id,
                    TransactionType::Withdrawal,
                    amount,
                    account.balance,
                    reference,
                )
                .with_description(description.map(str::to_string));
                tx.id = unit.insert_transaction(&tx)?;

                info!(account_id, reference = %tx.reference_number, %amount, "withdrawal applied");
                Ok(tx)
            })
        })
    }

    fn transfer(
        &self,
        source_id: i64,
        destination_id: i64,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<TransferReceipt> {
        tracked("transfer", |phase| {
            let amount = validate_amount(amount)?;
            if source_id == destination_id {
                return Err(Error::SameAccount);
            }

            let source = self.require_account(source_id)?;
            let destination = self.require_account(destination_id)?;
            require_active(&source)?;
            require_active(&destination)?;
            require_funds(&source, amount)?;

            phase.enter(Phase::Authorizing);
            self.authorize(&[source.client_id, destination.client_id])?;

            let _locks = self.locks.acquire(&[source_id, destination_id])?;
            phase.enter(Phase::Mutating);
            atomically(&*self.ledger, |unit| {
                let mut source = reload_account(unit, source_id)?;
                let mut destination = reload_account(unit, destination_id)?;
                require_active(&source)?;
                require_active(&destination)?;
                source.withdraw(amount)?;
                destination.deposit(amount)?;

                phase.enter(Phase::Persisting);
                unit.save_account(&source)?;
                unit.save_account(&destination)?;

                let debit_ref = self.references.generate(|r| unit.reference_exists(r))?;
                let credit_ref = self
                    .references
                    .generate(|r| Ok(r == debit_ref || unit.reference_exists(r)?))?;

                let mut debit = Transaction::new(
                    source.id,
                    source.client_id,
                    TransactionType::Transfer,
                    amount,
                    source.balance,
                    debit_ref.clone(),
                )
                .with_description(Some(leg_description("Transfer to", &destination, description)))
                .with_related_reference(credit_ref.clone());
                debit.destination_account_id = Some(destination.id);

                let mut credit = Transaction::new(
                    destination.id,
                    destination.client_id,
                    TransactionType::Transfer,
                    amount,
                    destination.balance,
                    credit_ref.clone(),
                )
                .with_description(Some(leg_description("Transfer from", &source, description)))
                .with_related_reference(debit_ref.clone());
                credit.source_account_id = Some(source.id);

                debit.id = unit.insert_transaction(&debit)?;
                credit.id = unit.insert_transaction(&credit)?;

                info!(
                    source_account_id = source_id,
                    destination_account_id = destination_id,
                    debit_reference = %debit.reference_number,
                    credit_reference = %credit.reference_number,
                    %amount,
                    "transfer applied"
                );
                Ok(TransferReceipt { debit, credit })
            })
        })
    }

    fn reverse(&self, transaction_id: i64, reason: &str) -> Result<ReversalReceipt> {
        tracked("reversal", |phase| {
            let original = self.require_transaction(transaction_id)?;
            let legs = self.reversible_legs(&original)?;

            let mut accounts = Vec::with_capacity(legs.len());
            for leg in &legs {
                let account = self.require_account(leg.account_id)?;
                require_active(&account)?;
                if compensation_debits(leg)? {
                    require_funds(&account, leg.amount)?;
                }
                accounts.push(account);
            }

            phase.enter(Phase::Authorizing);
            let clients: Vec<i64> = accounts.iter().map(|a| a.client_id).collect();
            self.authorize(&clients)?;

            let account_ids: Vec<i64> = legs.iter().map(|leg| leg.account_id).collect();
            let _locks = self.locks.acquire(&account_ids)?;
            phase.enter(Phase::Mutating);
            atomically(&*self.ledger, |unit| {
                let mut refunds = Vec::with_capacity(legs.len());
                for leg in &legs {
                    let current = unit
                        .load_transaction(leg.id)?
                        .ok_or_else(|| Error::not_found(format!("Transaction not found: {}", leg.id)))?;
                    require_reversible_status(&current)?;

                    let mut account = reload_account(unit, current.account_id)?;
                    require_active(&account)?;
                    if compensation_debits(&current)? {
                        account.withdraw(current.amount)?;
                    } else {
                        account.deposit(current.amount)?;
                    }

                    phase.enter(Phase::Persisting);
                    let reference = self.references.generate(|r| unit.reference_exists(r))?;
                    let mut refund = Transaction::new(
                        account.id,
                        account.client_id,
                        TransactionType::Refund,
                        current.amount,
                        account.balance,
                        reference,
                    )
                    .with_status(TransactionStatus::Pending)
                    .with_description(Some(format!(
                        "Reversal of transaction {}. Reason: {}",
                        current.reference_number, reason
                    )))
                    .with_related_reference(current.reference_number.clone());
                    refund.id = unit.insert_transaction(&refund)?;

                    unit.save_account(&account)?;
                    unit.update_transaction_status(refund.id, TransactionStatus::Completed, None)?;
                    refund.status = TransactionStatus::Completed;

                    if self.reversal_policy == ReversalPolicy::Once {
                        unit.update_transaction_status(current.id, TransactionStatus::Reversed, None)?;
                    }

                    info!(
                        account_id = account.id,
                        reference = %refund.reference_number,
                        original = %current.reference_number,
                        "reversal applied"
                    );
                    refunds.push(refund);
                }

                Ok(ReversalReceipt {
                    original_reference: original.reference_number.clone(),
                    refunds,
                })
            })
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// The original plus, for a transfer, its other leg
    fn reversible_legs(&self, original: &Transaction) -> Result<Vec<Transaction>> {
        require_reversible_status(original)?;
        if original.transaction_type != TransactionType::Transfer {
            return Ok(vec![original.clone()]);
        }

        let other_ref = original.related_reference.as_deref().ok_or_else(|| {
            Error::not_reversible(format!(
                "Transfer {} has no linked leg",
                original.reference_number
            ))
        })?;
        let other = self
            .ledger
            .find_transaction_by_reference(other_ref)?
            .ok_or_else(|| Error::not_reversible(format!("Linked transfer leg {} not found", other_ref)))?;
        require_reversible_status(&other)?;

        // Debit leg first so refunds come back in a stable order
        if original.is_debit_leg() {
            Ok(vec![original.clone(), other])
        } else {
            Ok(vec![other, original.clone()])
        }
    }

    fn authorize(&self, client_ids: &[i64]) -> Result<()> {
        let unique: BTreeSet<i64> = client_ids.iter().copied().collect();
        for client_id in unique {
            self.validation.validate_client_can_transact(client_id)?;
        }
        Ok(())
    }

    fn require_account(&self, account_id: i64) -> Result<Account> {
        self.ledger
            .find_account(account_id)?
            .ok_or_else(|| Error::not_found(format!("Account not found: {}", account_id)))
    }

    fn require_transaction(&self, transaction_id: i64) -> Result<Transaction> {
        self.ledger
            .find_transaction(transaction_id)?
            .ok_or_else(|| Error::not_found(format!("Transaction not found: {}", transaction_id)))
    }
}

fn reload_account(unit: &mut dyn LedgerUnit, account_id: i64) -> Result<Account> {
    unit.load_account(account_id)?
        .ok_or_else(|| Error::not_found(format!("Account not found: {}", account_id)))
}

fn require_active(account: &Account) -> Result<()> {
    if !account.is_active() {
        return Err(Error::invalid_state(format!(
            "Account {} is {}",
            account.account_number, account.status
        )));
    }
    Ok(())
}

fn require_funds(account: &Account, amount: Decimal) -> Result<()> {
    if !account.can_withdraw(amount) {
        return Err(Error::insufficient_funds(format!(
            "Insufficient funds in account {}",
            account.account_number
        )));
    }
    Ok(())
}

fn require_reversible_status(tx: &Transaction) -> Result<()> {
    if tx.transaction_type == TransactionType::Refund {
        return Err(Error::not_reversible(format!(
            "Transaction {} is a refund and cannot be reversed",
            tx.reference_number
        )));
    }
    if tx.status != TransactionStatus::Completed {
        return Err(Error::not_reversible(format!(
            "Transaction {} is {} and cannot be reversed",
            tx.reference_number, tx.status
        )));
    }
    Ok(())
}

/// True when compensating `leg` takes money out of its account
fn compensation_debits(leg: &Transaction) -> Result<bool> {
    leg.signed_amount()
        .map(|effect| effect > Decimal::ZERO)
        .ok_or_else(|| Error::not_reversible(format!("Transaction {} cannot be reversed", leg.reference_number)))
}

fn leg_description(direction: &str, counterparty: &Account, description: Option<&str>) -> String {
    match description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(text) => format!("{} {}: {}", direction, counterparty.account_number, text),
        None => format!("{} {}", direction, counterparty.account_number),
    }
}
