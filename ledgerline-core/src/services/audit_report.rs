//! Audit reporting - search, history, compliance reports, CSV export and
//! retention cleanup over the audit store

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::audit::{ops, AuditInterceptor};
use crate::adapters::audit_store::{AuditStatistics, DuckDbAuditStore};
use crate::domain::result::{Error, Result};
use crate::domain::{
    AuditAction, AuditEntityType, AuditQuery, AuditRecord, DateRange, Page, PageResult,
    RequestContext,
};

/// Default audit retention
pub const DEFAULT_RETENTION_DAYS: u32 = 365;

/// Security events listed at the end of a compliance report
const REPORT_SECURITY_EVENTS: usize = 10;

const CSV_HEADER: [&str; 18] = [
    "ID",
    "User ID",
    "User Email",
    "User Role",
    "Client ID",
    "Entity Type",
    "Entity ID",
    "Action",
    "Action Details",
    "Old Values",
    "New Values",
    "IP Address",
    "User Agent",
    "Session ID",
    "Request ID",
    "Status",
    "Failure Reason",
    "Created At",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Millisecond precision, the resolution the audit store keeps
const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Read side of the audit trail plus retention
pub struct AuditReportingService {
    store: Arc<DuckDbAuditStore>,
    audit: Arc<AuditInterceptor>,
}

impl AuditReportingService {
    pub fn new(store: Arc<DuckDbAuditStore>, audit: Arc<AuditInterceptor>) -> Self {
        Self { store, audit }
    }

    pub fn search(&self, query: &AuditQuery, page: Page) -> Result<PageResult<AuditRecord>> {
        self.store.search(query, page)
    }

    pub fn entity_history(&self, entity_type: AuditEntityType, entity_id: i64) -> Result<Vec<AuditRecord>> {
        self.store.for_entity(entity_type, entity_id)
    }

    pub fn user_history(&self, user_id: i64) -> Result<Vec<AuditRecord>> {
        self.store.for_user(user_id)
    }

    pub fn client_history(&self, client_id: i64) -> Result<Vec<AuditRecord>> {
        self.store.for_client(client_id)
    }

    pub fn by_action(&self, action: AuditAction) -> Result<Vec<AuditRecord>> {
        self.store.by_action(action)
    }

    pub fn between(&self, range: &DateRange) -> Result<Vec<AuditRecord>> {
        self.store.between(range)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        self.store.recent(limit)
    }

    pub fn statistics(&self, range: &DateRange) -> Result<AuditStatistics> {
        self.store.statistics(range)
    }

    /// Plain-text compliance report for `range`
    pub fn generate_compliance_report(&self, ctx: &RequestContext, range: &DateRange) -> Result<String> {
        let stats = self.store.statistics(range)?;
        let by_action = self.store.counts_by_action(range)?;
        let by_entity = self.store.counts_by_entity_type(range)?;
        let security = self.store.recent_security_events(range, REPORT_SECURITY_EVENTS)?;

        let report = render_report(range, Utc::now(), &stats, &by_action, &by_entity, &security)
            .map_err(|e| Error::Other(format!("Failed to render report: {}", e)))?;

        self.audit.record(AuditRecord::new(
            ctx,
            AuditEntityType::SystemEvent,
            AuditAction::AuditReportGenerated,
            format!("Compliance report generated for {}", range),
        ));
        Ok(report)
    }

    /// CSV of every record in `range`, header first, newest first
    pub fn export_to_csv(&self, range: &DateRange) -> Result<String> {
        let records = self.store.between(range)?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for record in &records {
            writer.write_record(csv_row(record))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Other(format!("Failed to flush CSV: {}", e)))?;
        let csv = String::from_utf8(bytes).map_err(|e| Error::Other(e.to_string()))?;

        info!(rows = records.len(), %range, "audit records exported");
        Ok(csv)
    }

    /// Delete records older than `retention_days` and log how many went
    pub fn cleanup(&self, ctx: &RequestContext, retention_days: u32) -> Result<usize> {
        self.audit
            .call(&ops::CLEANUP_AUDIT_LOGS, ctx)
            .run(|| self.purge(retention_days))
    }

    fn purge(&self, retention_days: u32) -> Result<usize> {
        let cutoff = retention_cutoff(Utc::now(), retention_days)?;
        let deleted = self.store.delete_before(cutoff)?;
        self.audit.log_system_event(
            AuditAction::RetentionCleanup,
            &format!(
                "Cleaned up {} audit records older than {} days",
                deleted, retention_days
            ),
        );
        Ok(deleted)
    }
}

/// Oldest creation time that survives a cleanup run at `now`
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> Result<DateTime<Utc>> {
    Duration::try_days(i64::from(retention_days))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            Error::invalid_input(format!(
                "Retention period of {} days is out of range",
                retention_days
            ))
        })
}

fn render_report(
    range: &DateRange,
    generated_at: DateTime<Utc>,
    stats: &AuditStatistics,
    by_action: &[(String, i64)],
    by_entity: &[(String, i64)],
    security: &[AuditRecord],
) -> std::result::Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "COMPLIANCE AUDIT REPORT")?;
    writeln!(out, "======================")?;
    writeln!(out, "Period: {} to {}", period_bound(range.start), period_bound(range.end))?;
    writeln!(out, "Generated: {}", generated_at.format(TIMESTAMP_FORMAT))?;
    writeln!(out)?;

    section(&mut out, "SUMMARY STATISTICS")?;
    writeln!(out, "Total Events: {}", stats.total_events)?;
    writeln!(out, "Security Events: {}", stats.security_events)?;
    writeln!(out, "Failed Events: {}", stats.failed_events)?;
    writeln!(out, "Success Rate: {:.2}%", stats.success_rate)?;
    writeln!(out)?;

    section(&mut out, "ACTION BREAKDOWN")?;
    for (action, count) in by_action {
        writeln!(out, "{}: {}", action, count)?;
    }
    writeln!(out)?;

    section(&mut out, "ENTITY TYPE BREAKDOWN")?;
    for (entity_type, count) in by_entity {
        writeln!(out, "{}: {}", entity_type, count)?;
    }
    writeln!(out)?;

    section(&mut out, "RECENT SECURITY EVENTS")?;
    for event in security {
        writeln!(
            out,
            "{} - {} - {} - {}",
            event.created_at.format(TIMESTAMP_FORMAT),
            event.action,
            event.user_email,
            event.details
        )?;
    }
    Ok(out)
}

fn section(out: &mut String, title: &str) -> std::fmt::Result {
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", "-".repeat(title.len()))
}

fn period_bound(bound: Option<DateTime<Utc>>) -> String {
    bound
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "*".to_string())
}

fn csv_row(record: &AuditRecord) -> [String; 18] {
    fn opt<T: ToString>(value: &Option<T>) -> String {
        value.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    [
        record.id.to_string(),
        opt(&record.user_id),
        record.user_email.clone(),
        record.user_role.clone(),
        opt(&record.client_id),
        record.entity_type.to_string(),
        opt(&record.entity_id),
        record.action.to_string(),
        record.details.clone(),
        opt(&record.old_values),
        opt(&record.new_values),
        opt(&record.ip_address),
        opt(&record.user_agent),
        opt(&record.session_id),
        opt(&record.request_id),
        record.status.to_string(),
        opt(&record.failure_reason),
        record.created_at.format(CSV_TIMESTAMP_FORMAT).to_string(),
    ]
}
