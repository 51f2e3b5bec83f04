//! Audit interceptor - wraps audited operations and records their outcome
//!
//! Every audited operation is declared once in [`ops`] with the entity type
//! and action it is filed under. Call sites wrap the work:
//!
//! ```ignore
//! audit.call(&ops::PROCESS_DEPOSIT, ctx).entity(account_id).run(|| deposit())
//! ```
//!
//! The wrapped closure runs exactly once and its result is handed back
//! untouched. One record is written afterwards, success or failure. A sink
//! error is logged and dropped.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::result::Result;
use crate::domain::{
    Account, AuditAction, AuditEntityType, AuditRecord, RequestContext, ReversalReceipt,
    Transaction, TransferReceipt, SYSTEM_ACTOR,
};
use crate::ports::AuditSink;

/// Static classification of an audited operation
#[derive(Debug, PartialEq, Eq)]
pub struct AuditedOperation {
    /// Owning component, e.g. `TransactionProcessor`
    pub component: &'static str,
    pub name: &'static str,
    pub entity_type: AuditEntityType,
    pub action: AuditAction,
}

/// Table of audited operations
pub mod ops {
    use super::AuditedOperation;
    use crate::domain::{AuditAction, AuditEntityType};

    pub static PROCESS_DEPOSIT: AuditedOperation = AuditedOperation {
        component: "TransactionProcessor",
        name: "process_deposit",
        entity_type: AuditEntityType::Transaction,
        action: AuditAction::Deposit,
    };

    pub static PROCESS_WITHDRAWAL: AuditedOperation = AuditedOperation {
        component: "TransactionProcessor",
        name: "process_withdrawal",
        entity_type: AuditEntityType::Transaction,
        action: AuditAction::Withdrawal,
    };

    pub static PROCESS_TRANSFER: AuditedOperation = AuditedOperation {
        component: "TransactionProcessor",
        name: "process_transfer",
        entity_type: AuditEntityType::Transaction,
        action: AuditAction::Transfer,
    };

    pub static REVERSE_TRANSACTION: AuditedOperation = AuditedOperation {
        component: "TransactionProcessor",
        name: "reverse_transaction",
        entity_type: AuditEntityType::Transaction,
        action: AuditAction::Reversal,
    };

    pub static OPEN_ACCOUNT: AuditedOperation = AuditedOperation {
        component: "AccountService",
        name: "open_account",
        entity_type: AuditEntityType::Account,
        action: AuditAction::Create,
    };

    pub static UPDATE_ACCOUNT_STATUS: AuditedOperation = AuditedOperation {
        component: "AccountService",
        name: "update_account_status",
        entity_type: AuditEntityType::Account,
        action: AuditAction::Update,
    };

    pub static CLOSE_ACCOUNT: AuditedOperation = AuditedOperation {
        component: "AccountService",
        name: "close_account",
        entity_type: AuditEntityType::Account,
        action: AuditAction::AccountClose,
    };

    pub static CLEANUP_AUDIT_LOGS: AuditedOperation = AuditedOperation {
        component: "AuditReportingService",
        name: "cleanup",
        entity_type: AuditEntityType::SystemEvent,
        action: AuditAction::Delete,
    };

    pub fn all() -> [&'static AuditedOperation; 8] {
        [
            &PROCESS_DEPOSIT,
            &PROCESS_WITHDRAWAL,
            &PROCESS_TRANSFER,
            &REVERSE_TRANSACTION,
            &OPEN_ACCOUNT,
            &UPDATE_ACCOUNT_STATUS,
            &CLOSE_ACCOUNT,
            &CLEANUP_AUDIT_LOGS,
        ]
    }
}

/// What a successful result tells the audit record about itself
pub trait AuditSubject {
    fn audit_entity_id(&self) -> Option<i64> {
        None
    }

    fn audit_client_id(&self) -> Option<i64> {
        None
    }

    /// JSON after-snapshot
    fn audit_snapshot(&self) -> Option<String> {
        None
    }
}

impl AuditSubject for () {}

impl AuditSubject for usize {}

impl AuditSubject for Transaction {
    fn audit_entity_id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn audit_client_id(&self) -> Option<i64> {
        Some(self.client_id)
    }

    fn audit_snapshot(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

impl AuditSubject for Account {
    fn audit_entity_id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn audit_client_id(&self) -> Option<i64> {
        Some(self.client_id)
    }

    fn audit_snapshot(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

impl AuditSubject for TransferReceipt {
    fn audit_entity_id(&self) -> Option<i64> {
        Some(self.debit.id)
    }

    fn audit_client_id(&self) -> Option<i64> {
        Some(self.debit.client_id)
    }

    fn audit_snapshot(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

impl AuditSubject for ReversalReceipt {
    fn audit_entity_id(&self) -> Option<i64> {
        self.refunds.first().map(|t| t.id)
    }

    fn audit_client_id(&self) -> Option<i64> {
        self.refunds.first().map(|t| t.client_id)
    }

    fn audit_snapshot(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Records audited operations and security events to an [`AuditSink`]
pub struct AuditInterceptor {
    sink: Arc<dyn AuditSink>,
}

impl AuditInterceptor {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Start wrapping one invocation of `operation`
    pub fn call<'a>(
        &'a self,
        operation: &'static AuditedOperation,
        ctx: &'a RequestContext,
    ) -> AuditCall<'a> {
        AuditCall {
            interceptor: self,
            operation,
            ctx,
            entity_id: None,
            client_id: None,
            before: None,
        }
    }

    /// Persist a record, best effort. Returns the id when it was stored.
    pub fn record(&self, record: AuditRecord) -> Option<i64> {
        match self.sink.append(&record) {
            Ok(id) => {
                debug!(
                    audit_id = id,
                    action = %record.action,
                    entity_type = %record.entity_type,
                    entity_id = ?record.entity_id,
                    "audit event logged"
                );
                Some(id)
            }
            Err(e) => {
                error!(
                    action = %record.action,
                    entity_type = %record.entity_type,
                    request_id = ?record.request_id,
                    error = %e,
                    "failed to write audit record"
                );
                None
            }
        }
    }

    /// Security event attributed to `email`, recorded under the SYSTEM role
    pub fn log_security_event(
        &self,
        ctx: &RequestContext,
        email: &str,
        ip_address: Option<&str>,
        action: AuditAction,
        details: &str,
    ) -> Option<i64> {
        let mut record = AuditRecord::new(ctx, AuditEntityType::SecurityEvent, action, details);
        record.user_id = None;
        record.user_email = email.to_string();
        record.user_role = SYSTEM_ACTOR.to_string();
        if let Some(ip) = ip_address {
            record.ip_address = Some(ip.to_string());
        }
        warn!(%action, email, ip = ?record.ip_address, "security event");
        self.record(record)
    }

    pub fn log_login_success(&self, ctx: &RequestContext, email: &str, ip_address: Option<&str>) -> Option<i64> {
        self.log_security_event(ctx, email, ip_address, AuditAction::Login, "Successful login")
    }

    pub fn log_login_failure(
        &self,
        ctx: &RequestContext,
        email: &str,
        ip_address: Option<&str>,
        reason: &str,
    ) -> Option<i64> {
        self.log_security_event(
            ctx,
            email,
            ip_address,
            AuditAction::LoginFailed,
            &format!("Login failed: {}", reason),
        )
    }

    pub fn log_suspicious_activity(
        &self,
        ctx: &RequestContext,
        email: &str,
        ip_address: Option<&str>,
        details: &str,
    ) -> Option<i64> {
        self.log_security_event(ctx, email, ip_address, AuditAction::SuspiciousActivity, details)
    }

    /// System event under the SYSTEM actor
    pub fn log_system_event(&self, action: AuditAction, details: &str) -> Option<i64> {
        info!(%action, details, "system event");
        let record = AuditRecord::new(
            &RequestContext::system(),
            AuditEntityType::SystemEvent,
            action,
            details,
        );
        self.record(record)
    }
}

/// One pending audited invocation, see [`AuditInterceptor::call`]
pub struct AuditCall<'a> {
    interceptor: &'a AuditInterceptor,
    operation: &'static AuditedOperation,
    ctx: &'a RequestContext,
    entity_id: Option<i64>,
    client_id: Option<i64>,
    before: Option<String>,
}

impl<'a> AuditCall<'a> {
    /// Entity the call targets, used when the result does not name one
    pub fn entity(mut self, id: i64) -> Self {
        self.entity_id = Some(id);
        self
    }

    /// Owning client, used when the result does not name one
    pub fn client(mut self, id: i64) -> Self {
        self.client_id = Some(id);
        self
    }

    /// Snapshot of the entity before the call
    pub fn before<S: Serialize>(mut self, value: &S) -> Self {
        self.before = serde_json::to_string(value).ok();
        self
    }

    /// Run `work` once, record the outcome, and return the result unchanged
    pub fn run<T, F>(self, work: F) -> Result<T>
    where
        T: AuditSubject,
        F: FnOnce() -> Result<T>,
    {
        let started = Instant::now();
        let result = work();
        let elapsed_ms = started.elapsed().as_millis();

        let op = self.operation;
        let details = format!(
            "{}.{} - Execution time: {}ms",
            op.component, op.name, elapsed_ms
        );

        let record = match &result {
            Ok(value) => AuditRecord::new(self.ctx, op.entity_type, op.action, details)
                .with_entity_id(value.audit_entity_id().or(self.entity_id))
                .with_client_id(value.audit_client_id().or(self.client_id))
                .with_changes(self.before, value.audit_snapshot()),
            Err(e) => AuditRecord::new(
                self.ctx,
                op.entity_type,
                op.action,
                format!("{} - Failed: {}", details, e),
            )
            .with_entity_id(self.entity_id)
            .with_client_id(self.client_id)
            .with_changes(self.before, None)
            .failed(e.to_string()),
        };

        self.interceptor.record(record);
        result
    }
}
