//! Ledgerline Core - ledger transaction engine and audit trail
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Transaction, AuditRecord, etc.)
//! - **ports**: Trait definitions for external dependencies (LedgerStore, AuditSink, ClientGate)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, HTTP client gate, etc.)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod audit_migrations;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use adapters::audit_store::DuckDbAuditStore;
use adapters::client_gate::{HttpClientGate, StaticClientGate};
use adapters::duckdb::DuckDbLedger;
use config::{Config, GateSettings};
use ports::ClientGate;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{
    Account, AccountStatus, AccountType, Actor, AuditAction, AuditEntityType, AuditRecord,
    RequestContext, Transaction, TransactionStatus, TransactionType,
};
pub use domain::result::{Error, ErrorResponse, OperationResult};

pub const LEDGER_DB_FILE: &str = "ledger.duckdb";
pub const AUDIT_DB_FILE: &str = "audit.duckdb";

/// Main context for Ledgerline operations
///
/// This is the primary entry point for all business logic. It holds
/// both database connections, configuration, and all services.
pub struct LedgerlineContext {
    pub config: Config,
    pub ledger: Arc<DuckDbLedger>,
    pub audit_store: Arc<DuckDbAuditStore>,
    pub audit: Arc<AuditInterceptor>,
    pub validation: Arc<ClientValidation>,
    pub account_service: AccountService,
    pub processor: TransactionProcessor,
    pub reporting: Arc<AuditReportingService>,
    pub status_service: StatusService,
}

impl LedgerlineContext {
    /// Open the ledger in `ledger_dir` with the configured client gate
    pub fn new(ledger_dir: &Path) -> Result<Self> {
        let config = Config::load(ledger_dir)?;
        let gate = build_gate(&config.client_gate)?;
        Self::with_gate(ledger_dir, config, gate)
    }

    /// Open the ledger in `ledger_dir` consulting `gate` for client checks
    pub fn with_gate(ledger_dir: &Path, config: Config, gate: Arc<dyn ClientGate>) -> Result<Self> {
        std::fs::create_dir_all(ledger_dir)
            .with_context(|| format!("Failed to create {}", ledger_dir.display()))?;

        let ledger = Arc::new(DuckDbLedger::new(&ledger_dir.join(LEDGER_DB_FILE))?);
        ledger.ensure_schema()?;
        let audit_store = Arc::new(DuckDbAuditStore::new(&ledger_dir.join(AUDIT_DB_FILE))?);

        // Services
        let audit = Arc::new(AuditInterceptor::new(audit_store.clone()));
        let validation = Arc::new(ClientValidation::new(gate));
        let locks = Arc::new(AccountLocks::new());

        let account_service = AccountService::new(
            ledger.clone(),
            validation.clone(),
            audit.clone(),
            locks.clone(),
        );
        let processor = TransactionProcessor::new(ledger.clone(), validation.clone(), audit.clone(), locks)?
            .with_reference_generator(ReferenceGenerator::new(&config.ledger.reference_prefix)?)
            .with_reversal_policy(config.ledger.reversal_policy);
        let reporting = Arc::new(AuditReportingService::new(audit_store.clone(), audit.clone()));
        let status_service = StatusService::new(ledger.clone(), audit_store.clone());

        info!(dir = %ledger_dir.display(), reversal_policy = %config.ledger.reversal_policy, "ledger opened");

        Ok(Self {
            config,
            ledger,
            audit_store,
            audit,
            validation,
            account_service,
            processor,
            reporting,
            status_service,
        })
    }

    /// Start the daily audit retention job with the configured schedule
    pub fn start_retention(&self) -> Result<RetentionScheduler> {
        Ok(RetentionScheduler::start(
            self.reporting.clone(),
            self.config.audit.retention_days,
            self.config.audit.cleanup_hour_utc,
        )?)
    }
}

/// HTTP gate when a URL is configured, otherwise a gate that refuses everything
pub fn build_gate(settings: &GateSettings) -> Result<Arc<dyn ClientGate>> {
    match settings.base_url.as_deref() {
        Some(url) => {
            let gate = HttpClientGate::new(url, settings.timeout(), settings.api_token.clone())?;
            Ok(Arc::new(gate))
        }
        None => {
            warn!("no client gate configured, mutating operations will be denied");
            Ok(Arc::new(StaticClientGate::unavailable("no client gate configured")))
        }
    }
}
