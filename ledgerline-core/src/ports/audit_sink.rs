//! Audit sink port

use crate::domain::result::Result;
use crate::domain::AuditRecord;

/// Destination for audit records
///
/// `append` must persist the whole record or nothing. Callers treat every
/// error as best-effort loss and never retry.
pub trait AuditSink: Send + Sync {
    /// Persist one record and return its assigned id
    fn append(&self, record: &AuditRecord) -> Result<i64>;
}
