//! Audit trail end to end: interception, reporting, export and retention
//!
//! Run with: cargo test --test audit_trail_test -- --nocapture

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use tempfile::TempDir;

use ledgerline_core::adapters::audit_store::DuckDbAuditStore;
use ledgerline_core::adapters::client_gate::{ClientProfile, StaticClientGate};
use ledgerline_core::adapters::duckdb::DuckDbLedger;
use ledgerline_core::config::Config;
use ledgerline_core::domain::result::{Error, Result};
use ledgerline_core::domain::{AuditOutcome, AuditQuery, DateRange, Page};
use ledgerline_core::ports::{AuditSink, LedgerStore};
use ledgerline_core::services::{
    AccountLocks, AccountService, AuditInterceptor, ClientValidation, TransactionProcessor,
};
use ledgerline_core::{
    AccountType, Actor, AuditAction, AuditEntityType, AuditRecord, LedgerlineContext,
    RequestContext,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn open_with_gate(dir: &TempDir, gate: Arc<StaticClientGate>) -> LedgerlineContext {
    LedgerlineContext::with_gate(dir.path(), Config::default(), gate).expect("Failed to open ledger")
}

fn operator() -> RequestContext {
    RequestContext::new(Actor::new(Some(12), "teller@bank.test", "OPERATOR"))
        .with_ip("10.1.2.3")
        .with_user_agent("ledger-cli/test")
}

fn records(ctx: &LedgerlineContext) -> Vec<AuditRecord> {
    ctx.reporting.recent(1000).unwrap()
}

// ============================================================================
// Interception
// ============================================================================

#[test]
fn test_each_operation_writes_one_record() {
    let dir = TempDir::new().unwrap();
    let ctx = open_with_gate(&dir, Arc::new(StaticClientGate::allow_all()));
    let request = operator();

    let a = ctx.account_service.open_account(&request, 1, AccountType::Savings).unwrap();
    let b = ctx.account_service.open_account(&request, 2, AccountType::Checking).unwrap();
    let deposit = ctx.processor.process_deposit(&request, a.id, dec!(100.00), None).unwrap();
    ctx.processor.process_withdrawal(&request, a.id, dec!(10.00), None).unwrap();
    ctx.processor.process_transfer(&request, a.id, b.id, dec!(20.00), None).unwrap();
    ctx.processor.reverse_transaction(&request, deposit.id, "duplicate").unwrap_err();

    let trail = records(&ctx);
    assert_eq!(trail.len(), 6);

    let actions: Vec<AuditAction> = trail.iter().rev().map(|r| r.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::Create,
            AuditAction::Create,
            AuditAction::Deposit,
            AuditAction::Withdrawal,
            AuditAction::Transfer,
            AuditAction::Reversal,
        ]
    );

    for record in &trail {
        assert_eq!(record.user_id, Some(12));
        assert_eq!(record.user_email, "teller@bank.test");
        assert_eq!(record.user_role, "OPERATOR");
        assert_eq!(record.ip_address.as_deref(), Some("10.1.2.3"));
        assert_eq!(record.user_agent.as_deref(), Some("ledger-cli/test"));
        assert_eq!(record.request_id.as_deref(), Some(request.correlation_id.as_str()));
        assert!(record.details.contains("Execution time:"));
    }

    let deposit_record = trail.iter().find(|r| r.action == AuditAction::Deposit).unwrap();
    assert_eq!(deposit_record.entity_type, AuditEntityType::Transaction);
    assert_eq!(deposit_record.entity_id, Some(deposit.id));
    assert_eq!(deposit_record.client_id, Some(1));
    assert!(deposit_record.new_values.as_deref().unwrap().contains(&deposit.reference_number));
}

#[test]
fn test_failed_operation_is_recorded_with_reason() {
    let dir = TempDir::new().unwrap();
    let ctx = open_with_gate(&dir, Arc::new(StaticClientGate::allow_all()));
    let request = operator();
    let account = ctx.account_service.open_account(&request, 1, AccountType::Checking).unwrap();

    let err = ctx
        .processor
        .process_withdrawal(&request, account.id, dec!(5.00), None)
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");

    let failed = ctx
        .reporting
        .by_action(AuditAction::Withdrawal)
        .unwrap()
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(failed.status, AuditOutcome::Failed);
    assert_eq!(failed.entity_id, Some(account.id));
    assert!(failed.failure_reason.is_some());
    assert!(failed.details.contains(" - Failed: "));
    assert!(failed.new_values.is_none());
}

#[test]
fn test_blacklisted_client_is_denied_and_audited() {
    let dir = TempDir::new().unwrap();
    let gate = Arc::new(StaticClientGate::allow_all());
    let ctx = open_with_gate(&dir, gate.clone());
    let request = operator();
    let account = ctx.account_service.open_account(&request, 9, AccountType::Checking).unwrap();

    gate.set_profile(9, ClientProfile::blacklisted("sanctions list"));
    let err = ctx
        .processor
        .process_deposit(&request, account.id, dec!(1.00), None)
        .unwrap_err();

    assert_eq!(err.code(), "ACCESS_DENIED");
    assert_eq!(ctx.ledger.find_account(account.id).unwrap().unwrap().balance, dec!(0));
    assert_eq!(ctx.account_service.balance(account.id).unwrap_err().code(), "ACCESS_DENIED");

    let denied = ctx.reporting.by_action(AuditAction::Deposit).unwrap();
    assert_eq!(denied.len(), 1);
    assert!(denied[0].is_failure());
}

/// Sink that refuses every write
struct BrokenSink;

impl AuditSink for BrokenSink {
    fn append(&self, _record: &AuditRecord) -> Result<i64> {
        Err(Error::database("audit volume offline"))
    }
}

#[test]
fn test_audit_failure_does_not_change_business_outcome() {
    let dir = TempDir::new().unwrap();
    let ledger = Arc::new(DuckDbLedger::new(&dir.path().join("ledger.duckdb")).unwrap());
    ledger.ensure_schema().unwrap();

    let validation = Arc::new(ClientValidation::new(Arc::new(StaticClientGate::allow_all())));
    let audit = Arc::new(AuditInterceptor::new(Arc::new(BrokenSink)));
    let locks = Arc::new(AccountLocks::new());
    let accounts = AccountService::new(ledger.clone(), validation.clone(), audit.clone(), locks.clone());
    let processor = TransactionProcessor::new(ledger.clone(), validation, audit, locks).unwrap();

    let request = operator();
    let account = accounts.open_account(&request, 1, AccountType::Checking).unwrap();
    let tx = processor.process_deposit(&request, account.id, dec!(25.00), None).unwrap();
    let err = processor
        .process_withdrawal(&request, account.id, dec!(30.00), None)
        .unwrap_err();

    assert_eq!(tx.balance_after, dec!(25.00));
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    assert_eq!(ledger.find_account(account.id).unwrap().unwrap().balance, dec!(25.00));
}

// ============================================================================
// Reporting
// ============================================================================

#[test]
fn test_search_pages_and_filters() {
    let dir = TempDir::new().unwrap();
    let ctx = open_with_gate(&dir, Arc::new(StaticClientGate::allow_all()));
    let request = operator();
    let account = ctx.account_service.open_account(&request, 4, AccountType::Business).unwrap();
    for _ in 0..5 {
        ctx.processor.process_deposit(&request, account.id, dec!(1.00), None).unwrap();
    }

    let page = ctx
        .reporting
        .search(&AuditQuery::default().action(AuditAction::Deposit), Page::new(0, 2))
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_pages(), 3);

    let history = ctx.reporting.entity_history(AuditEntityType::Account, account.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(ctx.reporting.client_history(4).unwrap().len(), 6);
    assert_eq!(ctx.reporting.user_history(12).unwrap().len(), 6);
}

#[test]
fn test_compliance_report_is_itself_audited() {
    let dir = TempDir::new().unwrap();
    let ctx = open_with_gate(&dir, Arc::new(StaticClientGate::allow_all()));
    let request = operator();
    ctx.account_service.open_account(&request, 1, AccountType::Savings).unwrap();
    ctx.audit.log_login_failure(&request, "mallory@evil.test", Some("6.6.6.6"), "bad password");

    let report = ctx
        .reporting
        .generate_compliance_report(&request, &DateRange::unbounded())
        .unwrap();
    println!("{}", report);

    assert!(report.contains("Total Events: 2"));
    assert!(report.contains("Security Events: 1"));
    assert!(report.contains("mallory@evil.test"));

    let generated = ctx.reporting.by_action(AuditAction::AuditReportGenerated).unwrap();
    assert_eq!(generated.len(), 1);
    assert_eq!(generated[0].user_email, "teller@bank.test");
}

#[test]
fn test_csv_export_parses_back() {
    let dir = TempDir::new().unwrap();
    let ctx = open_with_gate(&dir, Arc::new(StaticClientGate::allow_all()));
    let request = operator();
    let account = ctx.account_service.open_account(&request, 1, AccountType::Savings).unwrap();
    ctx.processor
        .process_deposit(&request, account.id, dec!(3.00), Some("cash, \"counter\" 2"))
        .unwrap();

    let tricky = "line one, with comma\nline \"two\"";
    let note = AuditRecord::new(&request, AuditEntityType::AdminAction, AuditAction::ComplianceCheck, tricky);
    ctx.audit_store.append(&note).unwrap();

    let csv = ctx.reporting.export_to_csv(&DateRange::unbounded()).unwrap();
    let mut reader = csv::Reader::from_reader(csv.as_bytes());

    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.len(), 18);
    assert_eq!(&headers[0], "ID");

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.len() == 18));
    let deposit_row = rows.iter().find(|r| &r[7] == "DEPOSIT").unwrap();
    assert!(deposit_row[10].contains("cash, "));
    assert_eq!(&deposit_row[12], "ledger-cli/test");

    let note_row = rows.iter().find(|r| &r[7] == "COMPLIANCE_CHECK").unwrap();
    assert_eq!(&note_row[8], tricky);
}

// ============================================================================
// Retention
// ============================================================================

#[test]
fn test_cleanup_removes_only_old_records() {
    let dir = TempDir::new().unwrap();
    let ctx = open_with_gate(&dir, Arc::new(StaticClientGate::allow_all()));
    let request = operator();
    ctx.account_service.open_account(&request, 1, AccountType::Savings).unwrap();

    let mut stale = AuditRecord::new(&request, AuditEntityType::AdminAction, AuditAction::ConfigurationChanged, "old change");
    stale.created_at = Utc::now() - Duration::days(400);
    ctx.audit_store.append(&stale).unwrap();
    assert_eq!(ctx.audit_store.count().unwrap(), 2);

    let removed = ctx.reporting.cleanup(&RequestContext::system(), 365).unwrap();
    assert_eq!(removed, 1);

    let trail = records(&ctx);
    assert!(trail.iter().all(|r| r.action != AuditAction::ConfigurationChanged));
    assert!(trail.iter().any(|r| r.action == AuditAction::RetentionCleanup));
    assert!(trail.iter().any(|r| r.action == AuditAction::Delete && r.entity_type == AuditEntityType::SystemEvent));
}

#[test]
fn test_audit_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.duckdb");
    {
        let store = DuckDbAuditStore::new(&path).unwrap();
        let record = AuditRecord::new(&operator(), AuditEntityType::SystemEvent, AuditAction::SystemStartup, "boot");
        store.append(&record).unwrap();
    }

    for _ in 0..3 {
        let store = DuckDbAuditStore::new(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
