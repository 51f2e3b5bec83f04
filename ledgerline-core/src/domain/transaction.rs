//! Transaction domain model
//!
//! A transaction row is written once per ledger mutation. Completed rows are
//! never edited in place, a reversal adds new REFUND rows instead.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdrawal => "WITHDRAWAL",
            Self::Transfer => "TRANSFER",
            Self::Refund => "REFUND",
        }
    }

    pub fn all() -> [TransactionType; 4] {
        [Self::Deposit, Self::Withdrawal, Self::Transfer, Self::Refund]
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DEPOSIT" => Ok(Self::Deposit),
            "WITHDRAWAL" => Ok(Self::Withdrawal),
            "TRANSFER" => Ok(Self::Transfer),
            "REFUND" | "REVERSAL" => Ok(Self::Refund),
            other => Err(Error::Other(format!("Unknown transaction type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Reversed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Reversed => "REVERSED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            "REVERSED" => Ok(Self::Reversed),
            other => Err(Error::Other(format!("Unknown transaction status: {}", other))),
        }
    }
}

/// One ledger movement against one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Assigned by the ledger store, 0 until persisted
    pub id: i64,
    pub account_id: i64,
    pub client_id: i64,
    pub transaction_type: TransactionType,
    /// Always positive, the type says which way the money moved
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub reference_number: String,
    pub description: Option<String>,
    /// Set on the credit leg of a transfer
    pub source_account_id: Option<i64>,
    /// Set on the debit leg of a transfer
    pub destination_account_id: Option<i64>,
    /// Other leg of a transfer, or the transaction a refund compensates
    pub related_reference: Option<String>,
    pub status: TransactionStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a completed transaction for an account movement
    pub fn new(
        account_id: i64,
        client_id: i64,
        transaction_type: TransactionType,
        amount: Decimal,
        balance_after: Decimal,
        reference_number: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            account_id,
            client_id,
            transaction_type,
            amount,
            balance_after,
            reference_number: reference_number.into(),
            description: None,
            source_account_id: None,
            destination_account_id: None,
            related_reference: None,
            status: TransactionStatus::Completed,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_related_reference(mut self, reference: impl Into<String>) -> Self {
        self.related_reference = Some(reference.into());
        self
    }

    /// True for the outgoing leg of a transfer
    pub fn is_debit_leg(&self) -> bool {
        self.transaction_type == TransactionType::Transfer && self.destination_account_id.is_some()
    }

    /// Signed effect of this row on its account balance
    ///
    /// `None` for refunds, whose direction depends on what they compensate.
    pub fn signed_amount(&self) -> Option<Decimal> {
        match self.transaction_type {
            TransactionType::Deposit => Some(self.amount),
            TransactionType::Withdrawal => Some(-self.amount),
            TransactionType::Transfer if self.is_debit_leg() => Some(-self.amount),
            TransactionType::Transfer => Some(self.amount),
            TransactionType::Refund => None,
        }
    }
}

/// Both legs of a completed transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub debit: Transaction,
    pub credit: Transaction,
}

/// Result of reversing a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalReceipt {
    pub original_reference: String,
    /// One refund per compensated account
    pub refunds: Vec<Transaction>,
}
