//! Status service - ledger and audit summaries

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::adapters::audit_store::DuckDbAuditStore;
use crate::domain::result::Result;
use crate::domain::{AccountStatus, AccountType, TransactionType};
use crate::ports::LedgerStore;

/// Status service for ledger statistics
pub struct StatusService {
    ledger: Arc<dyn LedgerStore>,
    audit_store: Arc<DuckDbAuditStore>,
}

impl StatusService {
    pub fn new(ledger: Arc<dyn LedgerStore>, audit_store: Arc<DuckDbAuditStore>) -> Self {
        Self { ledger, audit_store }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        let accounts_by_type = AccountType::all()
            .into_iter()
            .map(|t| Ok(KindCount::new(t.as_str(), self.ledger.count_accounts_by_type(t)?)))
            .collect::<Result<Vec<_>>>()?;

        let transactions_by_type = TransactionType::all()
            .into_iter()
            .map(|t| {
                Ok(TypeVolume {
                    kind: t.as_str(),
                    count: self.ledger.count_transactions_by_type(t)?,
                    completed_amount: self.ledger.total_amount_by_type(t)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(StatusSummary {
            total_accounts: self.ledger.count_accounts()?,
            active_accounts: self.ledger.count_accounts_by_status(AccountStatus::Active)?,
            total_transactions: transactions_by_type.iter().map(|c| c.count).sum(),
            accounts_by_type,
            transactions_by_type,
            audit_events: self.audit_store.count()?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_accounts: i64,
    pub active_accounts: i64,
    pub total_transactions: i64,
    pub accounts_by_type: Vec<KindCount>,
    pub transactions_by_type: Vec<TypeVolume>,
    pub audit_events: i64,
}

#[derive(Debug, Serialize)]
pub struct KindCount {
    pub kind: &'static str,
    pub count: i64,
}

/// Transaction count of one type plus the money its COMPLETED rows moved
#[derive(Debug, Serialize)]
pub struct TypeVolume {
    pub kind: &'static str,
    pub count: i64,
    pub completed_amount: Decimal,
}

impl KindCount {
    fn new(kind: &'static str, count: i64) -> Self {
        Self { kind, count }
    }
}
