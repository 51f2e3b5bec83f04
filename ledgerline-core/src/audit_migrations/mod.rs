//! Audit database migrations - embedded SQL files
//!
//! Kept apart from the ledger migrations: the audit trail lives in its own
//! database file with its own migration history.

/// All audit migrations, embedded at compile time.
/// Format: (filename, sql_content)
pub const AUDIT_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_audit_schema.sql", include_str!("001_audit_schema.sql")),
];
