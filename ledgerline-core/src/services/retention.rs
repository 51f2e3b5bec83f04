//! Daily audit retention job
//!
//! A named background thread sleeps until the configured hour (UTC), runs
//! the audit cleanup, and goes back to sleep. Dropping the scheduler or
//! calling `stop` wakes the thread and joins it.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::{error, info};

use super::audit_report::AuditReportingService;
use crate::domain::result::{Error, Result};
use crate::domain::RequestContext;

/// Background retention cleanup
pub struct RetentionScheduler {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RetentionScheduler {
    /// Spawn the job. `hour_utc` must be 0..=23.
    pub fn start(
        reporting: Arc<AuditReportingService>,
        retention_days: u32,
        hour_utc: u32,
    ) -> Result<Self> {
        let run_at = NaiveTime::from_hms_opt(hour_utc, 0, 0)
            .ok_or_else(|| Error::config(format!("Cleanup hour must be 0-23, got {}", hour_utc)))?;

        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("audit-retention".to_string())
            .spawn(move || loop {
                let now = Utc::now();
                let next = next_run(now, run_at);
                let wait = (next - now).to_std().unwrap_or_default();
                info!(next_run = %next, retention_days, "audit retention scheduled");

                match stopped.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {
                        match reporting.cleanup(&RequestContext::system(), retention_days) {
                            Ok(deleted) => info!(deleted, retention_days, "scheduled audit cleanup finished"),
                            Err(e) => error!(error = %e, "scheduled audit cleanup failed"),
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Signal the job and wait for it to exit
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("audit retention thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RetentionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Next instant strictly after `now` whose UTC time of day is `at`
pub fn next_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::audit_store::DuckDbAuditStore;
    use crate::services::audit::AuditInterceptor;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_next_run_later_today() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 1, 30, 0).unwrap();
        let at = NaiveTime::from_hms_opt(2, 0, 0).unwrap();
        assert_eq!(next_run(now, at), Utc.with_ymd_and_hms(2025, 3, 10, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        let at = NaiveTime::from_hms_opt(2, 0, 0).unwrap();
        let exactly = Utc.with_ymd_and_hms(2025, 12, 31, 2, 0, 0).unwrap();
        assert_eq!(next_run(exactly, at), Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_start_and_stop() {
        let dir = tempdir().unwrap();
        let store = Arc::new(DuckDbAuditStore::new(&dir.path().join("audit.duckdb")).unwrap());
        let reporting = Arc::new(AuditReportingService::new(
            store.clone(),
            Arc::new(AuditInterceptor::new(store)),
        ));

        assert!(RetentionScheduler::start(reporting.clone(), 365, 24).is_err());

        let mut scheduler = RetentionScheduler::start(reporting, 365, 3).unwrap();
        assert!(scheduler.is_running());
        scheduler.stop();
        assert!(!scheduler.is_running());
    }
}
