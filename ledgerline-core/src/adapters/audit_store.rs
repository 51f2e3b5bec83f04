//! DuckDB audit store
//!
//! The audit trail lives in its own `audit.duckdb` with its own connection,
//! so an audit write never shares a transaction (or a lock) with the ledger.
//! Rows are only ever inserted, and only `delete_before` removes them.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use duckdb::{params, Connection, ToSql};
use serde::{Deserialize, Serialize};

use super::duckdb::{conversion_error, lock_connection, open_with_retry};
use crate::audit_migrations::AUDIT_MIGRATIONS;
use crate::domain::result::{Error, Result};
use crate::domain::{
    AuditAction, AuditEntityType, AuditOutcome, AuditQuery, AuditRecord, DateRange, Page,
    PageResult,
};
use crate::ports::AuditSink;
use crate::services::{MigrationResult, MigrationService};

const RECORD_COLUMNS: &str = "id, user_id, user_email, user_role, client_id, entity_type, \
     entity_id, action, action_details, old_values, new_values, ip_address, user_agent, \
     session_id, request_id, status, failure_reason, created_at";

/// Event counts over a time window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuditStatistics {
    pub total_events: i64,
    pub security_events: i64,
    pub failed_events: i64,
    /// Percentage of non-failed events, 0 when there are no events
    pub success_rate: f64,
}

impl AuditStatistics {
    pub fn from_counts(total_events: i64, security_events: i64, failed_events: i64) -> Self {
        let success_rate = if total_events > 0 {
            (total_events - failed_events) as f64 / total_events as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_events,
            security_events,
            failed_events,
            success_rate,
        }
    }
}

/// DuckDB-backed audit trail
pub struct DuckDbAuditStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbAuditStore {
    /// Open (or create) the audit database and run its migrations
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = open_with_retry(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        Ok(MigrationService::new(&conn, AUDIT_MIGRATIONS).run_pending()?)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        lock_connection(&self.conn)
    }

    /// Filtered, paged search, newest first
    pub fn search(&self, query: &AuditQuery, page: Page) -> Result<PageResult<AuditRecord>> {
        let mut conditions = Conditions::default();
        if let Some(term) = &query.term {
            let pattern = format!("%{}%", escape_like(term.trim()));
            conditions.clause(r"(action_details ILIKE ? ESCAPE '\' OR user_email ILIKE ? ESCAPE '\')");
            conditions.bind(pattern.clone());
            conditions.bind(pattern);
        }
        if let Some(entity_type) = query.entity_type {
            conditions.push("entity_type = ?", entity_type.as_str());
        }
        if let Some(action) = query.action {
            conditions.push("action = ?", action.as_str());
        }
        conditions.range(&query.range);

        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM audit_logs{}", conditions.where_sql()),
            conditions.refs().as_slice(),
            |row| row.get(0),
        )?;

        let items = select_records(
            &conn,
            &conditions,
            Some((page.size as i64, page.offset() as i64)),
        )?;

        Ok(PageResult { items, total, page })
    }

    /// Full history of one entity
    pub fn for_entity(&self, entity_type: AuditEntityType, entity_id: i64) -> Result<Vec<AuditRecord>> {
        let mut conditions = Conditions::default();
        conditions.push("entity_type = ?", entity_type.as_str());
        conditions.push("entity_id = ?", entity_id);
        select_records(&*self.lock()?, &conditions, None)
    }

    pub fn for_user(&self, user_id: i64) -> Result<Vec<AuditRecord>> {
        let mut conditions = Conditions::default();
        conditions.push("user_id = ?", user_id);
        select_records(&*self.lock()?, &conditions, None)
    }

    pub fn for_client(&self, client_id: i64) -> Result<Vec<AuditRecord>> {
        let mut conditions = Conditions::default();
        conditions.push("client_id = ?", client_id);
        select_records(&*self.lock()?, &conditions, None)
    }

    pub fn by_action(&self, action: AuditAction) -> Result<Vec<AuditRecord>> {
        let mut conditions = Conditions::default();
        conditions.push("action = ?", action.as_str());
        select_records(&*self.lock()?, &conditions, None)
    }

    pub fn between(&self, range: &DateRange) -> Result<Vec<AuditRecord>> {
        let mut conditions = Conditions::default();
        conditions.range(range);
        select_records(&*self.lock()?, &conditions, None)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        select_records(&*self.lock()?, &Conditions::default(), Some((limit as i64, 0)))
    }

    /// Most recent SECURITY_EVENT records in the window
    pub fn recent_security_events(&self, range: &DateRange, limit: usize) -> Result<Vec<AuditRecord>> {
        let mut conditions = Conditions::default();
        conditions.push("entity_type = ?", AuditEntityType::SecurityEvent.as_str());
        conditions.range(range);
        select_records(&*self.lock()?, &conditions, Some((limit as i64, 0)))
    }

    /// Total number of stored records
    pub fn count(&self) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM audit_logs", [], |row| row.get(0))?)
    }

    pub fn statistics(&self, range: &DateRange) -> Result<AuditStatistics> {
        let mut conditions = Conditions::default();
        conditions.range(range);

        let sql = format!(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE entity_type = 'SECURITY_EVENT'),
                COUNT(*) FILTER (WHERE status = 'FAILED')
            FROM audit_logs{}
            "#,
            conditions.where_sql()
        );

        let conn = self.lock()?;
        let (total, security, failed): (i64, i64, i64) =
            conn.query_row(&sql, conditions.refs().as_slice(), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;
        Ok(AuditStatistics::from_counts(total, security, failed))
    }

    /// Record counts per action, sorted by action name
    pub fn counts_by_action(&self, range: &DateRange) -> Result<Vec<(String, i64)>> {
        self.counts_by("action", range)
    }

    /// Record counts per entity type, sorted by entity type name
    pub fn counts_by_entity_type(&self, range: &DateRange) -> Result<Vec<(String, i64)>> {
        self.counts_by("entity_type", range)
    }

    fn counts_by(&self, column: &'static str, range: &DateRange) -> Result<Vec<(String, i64)>> {
        let mut conditions = Conditions::default();
        conditions.range(range);

        let sql = format!(
            "SELECT {col}, COUNT(*) FROM audit_logs{cond} GROUP BY {col} ORDER BY {col}",
            col = column,
            cond = conditions.where_sql()
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let counts = stmt
            .query_map(conditions.refs().as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    /// Delete records created before `cutoff`, returning how many went
    pub fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM audit_logs WHERE created_at < ?",
            [cutoff.timestamp_millis()],
        )?;
        Ok(deleted)
    }
}

impl AuditSink for DuckDbAuditStore {
    fn append(&self, record: &AuditRecord) -> Result<i64> {
        let conn = self.lock()?;
        let id = conn.query_row(
            r#"
            INSERT INTO audit_logs (
                user_id, user_email, user_role, client_id, entity_type, entity_id,
                action, action_details, old_values, new_values, ip_address, user_agent,
                session_id, request_id, status, failure_reason, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
            params![
                record.user_id,
                &record.user_email,
                &record.user_role,
                record.client_id,
                record.entity_type.as_str(),
                record.entity_id,
                record.action.as_str(),
                &record.details,
                &record.old_values,
                &record.new_values,
                &record.ip_address,
                &record.user_agent,
                &record.session_id,
                &record.request_id,
                record.status.as_str(),
                &record.failure_reason,
                record.created_at.timestamp_millis(),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }
}

// =============================================================================
// Query building
// =============================================================================

/// WHERE clauses joined with AND, plus their bound values in order
#[derive(Default)]
struct Conditions {
    clauses: Vec<&'static str>,
    values: Vec<Box<dyn ToSql>>,
}

impl Conditions {
    fn clause(&mut self, clause: &'static str) {
        self.clauses.push(clause);
    }

    fn bind<T: ToSql + 'static>(&mut self, value: T) {
        self.values.push(Box::new(value));
    }

    fn push<T: ToSql + 'static>(&mut self, clause: &'static str, value: T) {
        self.clause(clause);
        self.bind(value);
    }

    fn range(&mut self, range: &DateRange) {
        if let Some(start) = range.start {
            self.push("created_at >= ?", start.timestamp_millis());
        }
        if let Some(end) = range.end {
            self.push("created_at <= ?", end.timestamp_millis());
        }
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn refs(&self) -> Vec<&dyn ToSql> {
        self.values.iter().map(|b| b.as_ref()).collect()
    }
}

/// Escape `%`, `_` and the escape character itself for an `ESCAPE '\'` pattern
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn select_records(
    conn: &Connection,
    conditions: &Conditions,
    limit_offset: Option<(i64, i64)>,
) -> Result<Vec<AuditRecord>> {
    let mut sql = format!(
        "SELECT {} FROM audit_logs{} ORDER BY created_at DESC, id DESC",
        RECORD_COLUMNS,
        conditions.where_sql()
    );
    let mut refs = conditions.refs();
    if let Some((limit, offset)) = &limit_offset {
        sql.push_str(" LIMIT ? OFFSET ?");
        refs.push(limit);
        refs.push(offset);
    }

    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(refs.as_slice(), row_to_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

fn row_to_record(row: &duckdb::Row) -> duckdb::Result<AuditRecord> {
    let entity_type: String = row.get(5)?;
    let action: String = row.get(7)?;
    let status: String = row.get(15)?;
    let created_at: i64 = row.get(17)?;

    Ok(AuditRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_email: row.get(2)?,
        user_role: row.get(3)?,
        client_id: row.get(4)?,
        entity_type: AuditEntityType::from_str(&entity_type).map_err(|e| conversion_error(5, e))?,
        entity_id: row.get(6)?,
        action: AuditAction::from_str(&action).map_err(|e| conversion_error(7, e))?,
        details: row.get(8)?,
        old_values: row.get(9)?,
        new_values: row.get(10)?,
        ip_address: row.get(11)?,
        user_agent: row.get(12)?,
        session_id: row.get(13)?,
        request_id: row.get(14)?,
        status: AuditOutcome::from_str(&status).map_err(|e| conversion_error(15, e))?,
        failure_reason: row.get(16)?,
        created_at: DateTime::from_timestamp_millis(created_at).ok_or_else(|| {
            conversion_error(17, Error::Other(format!("timestamp out of range: {}", created_at)))
        })?,
    })
}
