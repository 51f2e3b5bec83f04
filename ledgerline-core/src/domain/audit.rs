//! Audit trail records
//!
//! Records are append-only. The only deletion path is the retention sweep.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::RequestContext;
use super::result::{Error, Result};

/// Generates `as_str`, `Display`, `FromStr` and `all()` for a SCREAMING_CASE enum
macro_rules! audit_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn all() -> &'static [$name] {
                &[$(Self::$variant),+]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                let upper = s.to_ascii_uppercase();
                Self::all()
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == upper)
                    .ok_or_else(|| Error::Other(format!(
                        "Unknown {}: {}", stringify!($name), s
                    )))
            }
        }
    };
}

audit_enum!(
    /// Kind of entity an audit record is about
    AuditEntityType {
        Client => "CLIENT",
        Account => "ACCOUNT",
        Transaction => "TRANSACTION",
        UserSession => "USER_SESSION",
        SecurityEvent => "SECURITY_EVENT",
        SystemEvent => "SYSTEM_EVENT",
        AdminAction => "ADMIN_ACTION",
        ConfigurationChange => "CONFIGURATION_CHANGE",
    }
);

audit_enum!(
    /// What happened
    AuditAction {
        Create => "CREATE",
        Read => "READ",
        Update => "UPDATE",
        Delete => "DELETE",
        Login => "LOGIN",
        Logout => "LOGOUT",
        LoginFailed => "LOGIN_FAILED",
        PasswordChange => "PASSWORD_CHANGE",
        RoleChange => "ROLE_CHANGE",
        AccessDenied => "ACCESS_DENIED",
        Deposit => "DEPOSIT",
        Withdrawal => "WITHDRAWAL",
        Transfer => "TRANSFER",
        Reversal => "REVERSAL",
        AccountOpen => "ACCOUNT_OPEN",
        AccountClose => "ACCOUNT_CLOSE",
        AccountSuspend => "ACCOUNT_SUSPEND",
        AccountActivate => "ACCOUNT_ACTIVATE",
        SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
        MultipleFailedLogins => "MULTIPLE_FAILED_LOGINS",
        UnusualTransaction => "UNUSUAL_TRANSACTION",
        BlacklistAdd => "BLACKLIST_ADD",
        BlacklistRemove => "BLACKLIST_REMOVE",
        SystemStartup => "SYSTEM_STARTUP",
        SystemShutdown => "SYSTEM_SHUTDOWN",
        MaintenanceMode => "MAINTENANCE_MODE",
        BackupCreated => "BACKUP_CREATED",
        ConfigurationChanged => "CONFIGURATION_CHANGED",
        AuditReportGenerated => "AUDIT_REPORT_GENERATED",
        ComplianceCheck => "COMPLIANCE_CHECK",
        RegulatoryReport => "REGULATORY_REPORT",
        RetentionCleanup => "RETENTION_CLEANUP",
    }
);

audit_enum!(
    /// Outcome of the audited operation
    AuditOutcome {
        Success => "SUCCESS",
        Failed => "FAILED",
    }
);

/// Actor recorded when no user is attached to the request
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// One immutable audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Assigned by the audit store, 0 until persisted
    pub id: i64,
    pub user_id: Option<i64>,
    pub user_email: String,
    pub user_role: String,
    pub client_id: Option<i64>,
    pub entity_type: AuditEntityType,
    pub entity_id: Option<i64>,
    pub action: AuditAction,
    pub details: String,
    /// JSON snapshot before the change
    pub old_values: Option<String>,
    /// JSON snapshot after the change
    pub new_values: Option<String>,

    // =========================================================================
    // Request context
    // =========================================================================
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,

    pub status: AuditOutcome,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Start a successful record attributed to the request's actor
    pub fn new(
        ctx: &RequestContext,
        entity_type: AuditEntityType,
        action: AuditAction,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            user_id: ctx.actor.user_id,
            user_email: ctx.actor.email.clone(),
            user_role: ctx.actor.role.clone(),
            client_id: None,
            entity_type,
            entity_id: None,
            action,
            details: details.into(),
            old_values: None,
            new_values: None,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            session_id: ctx.session_id.clone(),
            request_id: Some(ctx.correlation_id.clone()),
            status: AuditOutcome::Success,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_entity_id(mut self, id: Option<i64>) -> Self {
        self.entity_id = id;
        self
    }

    pub fn with_client_id(mut self, id: Option<i64>) -> Self {
        self.client_id = id;
        self
    }

    pub fn with_changes(mut self, old_values: Option<String>, new_values: Option<String>) -> Self {
        self.old_values = old_values;
        self.new_values = new_values;
        self
    }

    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.status = AuditOutcome::Failed;
        self.failure_reason = Some(reason.into());
        self
    }

    pub fn is_security_event(&self) -> bool {
        self.entity_type == AuditEntityType::SecurityEvent
    }

    pub fn is_failure(&self) -> bool {
        self.status == AuditOutcome::Failed
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Inclusive time window, either side may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::new(Some(start), Some(end))
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| *at >= s) && self.end.map_or(true, |e| *at <= e)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |d: &Option<DateTime<Utc>>| {
            d.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "*".to_string())
        };
        write!(f, "{} to {}", side(&self.start), side(&self.end))
    }
}

/// Conjunctive audit search filter, unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    /// Case-insensitive substring of the details or the actor email
    pub term: Option<String>,
    pub entity_type: Option<AuditEntityType>,
    pub action: Option<AuditAction>,
    pub range: DateRange,
}

impl AuditQuery {
    pub fn term(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.term = if term.trim().is_empty() { None } else { Some(term) };
        self
    }

    pub fn entity_type(mut self, entity_type: AuditEntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }
}

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Page {
    pub fn new(number: usize, size: usize) -> Self {
        Self {
            number,
            size: size.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        self.number * self.size
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, 20)
    }
}

/// One page of results plus the total match count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: Page,
}

impl<T> PageResult<T> {
    pub fn total_pages(&self) -> i64 {
        let size = self.page.size as i64;
        (self.total + size - 1) / size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_math() {
        let page = Page::new(2, 25);
        assert_eq!(page.offset(), 50);
        assert_eq!(Page::new(0, 0).size, 1);

        let result: PageResult<()> = PageResult {
            items: vec![],
            total: 51,
            page,
        };
        assert_eq!(result.total_pages(), 3);
    }

    #[test]
    fn test_blank_term_is_ignored() {
        assert_eq!(AuditQuery::default().term("   ").term, None);
        assert_eq!(AuditQuery::default().term("bob").term.as_deref(), Some("bob"));
    }

    #[test]
    fn test_enum_text_round_trip() {
        for action in AuditAction::all() {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), *action);
        }
        for entity in AuditEntityType::all() {
            assert_eq!(entity.to_string().parse::<AuditEntityType>().unwrap(), *entity);
        }
        assert_eq!("login_failed".parse::<AuditAction>().unwrap(), AuditAction::LoginFailed);
        assert!("EXPLODE".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_system_context_record() {
        let record = AuditRecord::new(
            &RequestContext::system(),
            AuditEntityType::SystemEvent,
            AuditAction::MaintenanceMode,
            "entering maintenance",
        );
        assert_eq!(record.user_email, SYSTEM_ACTOR);
        assert_eq!(record.user_role, SYSTEM_ACTOR);
        assert!(record.user_id.is_none());
        assert!(!record.is_failure());

        let failed = record.failed("boom");
        assert!(failed.is_failure());
        assert_eq!(failed.failure_reason.as_deref(), Some("boom"));
    }
}
