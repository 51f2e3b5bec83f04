//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the LedgerStore port (`ledger.duckdb`)
//! - DuckDB for the AuditSink port (`audit.duckdb`)
//! - HTTP client for the ClientGate port, plus an in-memory gate

pub mod audit_store;
pub mod client_gate;
pub mod duckdb;

#[cfg(test)]
pub mod client_gate_mock;
