//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
pub mod audit;
mod audit_report;
mod client_validation;
pub mod locks;
pub mod migration;
pub mod reference;
mod retention;
mod status;
mod transaction;

pub use account::AccountService;
pub use audit::{ops, AuditCall, AuditInterceptor, AuditSubject, AuditedOperation};
pub use audit_report::{retention_cutoff, AuditReportingService, DEFAULT_RETENTION_DAYS};
pub use client_validation::ClientValidation;
pub use locks::{AccountLockGuard, AccountLocks};
pub use migration::{MigrationResult, MigrationService};
pub use reference::{generate_account_number, ReferenceGenerator, DEFAULT_REFERENCE_PREFIX};
pub use retention::{next_run, RetentionScheduler};
pub use status::{KindCount, StatusService, StatusSummary, TypeVolume};
pub use transaction::{Phase, ReversalPolicy, TransactionProcessor};
