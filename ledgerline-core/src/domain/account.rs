//! Account aggregate
//!
//! The only place balances change. The transaction processor works on a
//! locked copy loaded inside a unit of work and persists it afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Suspended,
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "SUSPENDED" => Ok(Self::Suspended),
            "CLOSED" => Ok(Self::Closed),
            other => Err(Error::Other(format!("Unknown account status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    #[default]
    Savings,
    Checking,
    Business,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Savings => "SAVINGS",
            Self::Checking => "CHECKING",
            Self::Business => "BUSINESS",
        }
    }

    pub fn all() -> [AccountType; 3] {
        [Self::Savings, Self::Checking, Self::Business]
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SAVINGS" => Ok(Self::Savings),
            "CHECKING" => Ok(Self::Checking),
            "BUSINESS" => Ok(Self::Business),
            other => Err(Error::Other(format!("Unknown account type: {}", other))),
        }
    }
}

/// Largest value a `DECIMAL(19,2)` column holds: 99,999,999,999,999,999.99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_313_682_943, 2_328_306_436, 0, false, 2);

/// A client account held in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Assigned by the ledger store, 0 until persisted
    pub id: i64,
    pub client_id: i64,
    pub account_number: String,
    pub balance: Decimal,
    pub status: AccountStatus,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new, empty, active account
    pub fn new(client_id: i64, account_number: impl Into<String>, account_type: AccountType) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            client_id,
            account_number: account_number.into(),
            balance: Decimal::ZERO,
            status: AccountStatus::Active,
            account_type,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// True iff the account is active and holds at least `amount`
    pub fn can_withdraw(&self, amount: Decimal) -> bool {
        self.is_active() && self.balance >= amount
    }

    pub fn deposit(&mut self, amount: Decimal) -> Result<()> {
        if !self.is_active() {
            return Err(Error::invalid_state(format!(
                "Account {} is {}, deposits require an ACTIVE account",
                self.account_number, self.status
            )));
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .filter(|balance| *balance <= MAX_AMOUNT)
            .ok_or_else(|| {
                Error::invalid_amount(format!(
                    "Deposit of {} would take account {} above the maximum balance",
                    amount, self.account_number
                ))
            })?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn withdraw(&mut self, amount: Decimal) -> Result<()> {
        if !self.can_withdraw(amount) {
            return Err(Error::insufficient_funds(format!(
                "Insufficient funds or account inactive: {}",
                self.account_number
            )));
        }
        self.balance -= amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move the account to a new status. CLOSED is terminal.
    pub fn change_status(&mut self, status: AccountStatus) -> Result<()> {
        if self.status == AccountStatus::Closed && status != AccountStatus::Closed {
            return Err(Error::invalid_state(format!(
                "Account {} is closed and cannot become {}",
                self.account_number, status
            )));
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Validate a money amount at the processor boundary
///
/// Amounts must be strictly positive, no larger than [`MAX_AMOUNT`], and
/// carry at most two fractional digits.
pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(Error::invalid_amount(format!(
            "Amount must be greater than zero, got {}",
            amount
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(Error::invalid_amount(format!(
            "Amount {} exceeds the maximum of {}",
            amount, MAX_AMOUNT
        )));
    }
    let normalized = amount.normalize();
    if normalized.scale() > 2 {
        return Err(Error::invalid_amount(format!(
            "Amount {} has more than two decimal places",
            amount
        )));
    }
    let mut scaled = normalized;
    scaled.rescale(2);
    Ok(scaled)
}
