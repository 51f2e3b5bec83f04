//! Core domain entities
//!
//! Ledger and audit types live here. These are plain data structures with
//! their own validation rules - no I/O or external dependencies.

mod account;
mod transaction;
mod audit;
mod client;
mod context;
pub mod result;

pub use account::{validate_amount, Account, AccountStatus, AccountType, MAX_AMOUNT};
pub use transaction::{
    ReversalReceipt, Transaction, TransactionStatus, TransactionType, TransferReceipt,
};
pub use audit::{
    AuditAction, AuditEntityType, AuditOutcome, AuditQuery, AuditRecord, DateRange, Page,
    PageResult, SYSTEM_ACTOR,
};
pub use client::{BlacklistStatus, ClientStatus, DenialReason};
pub use context::{Actor, RequestContext};
