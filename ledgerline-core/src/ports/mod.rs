//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The services
//! depend only on these traits, not on concrete implementations.

mod ledger_store;
mod audit_sink;
mod client_gate;

pub use ledger_store::{atomically, LedgerStore, LedgerUnit};
pub use audit_sink::AuditSink;
pub use client_gate::{ClientGate, GateError};
