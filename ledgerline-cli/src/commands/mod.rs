//! CLI command implementations

pub mod account;
pub mod audit;
pub mod ledger;
pub mod status;
pub mod tx;

use std::path::PathBuf;

use anyhow::{Context, Result};
use ledgerline_core::domain::SYSTEM_ACTOR;
use ledgerline_core::{Actor, LedgerlineContext, RequestContext};

/// Global flags shared by every command
pub struct Invocation {
    pub json: bool,
    pub request: RequestContext,
}

impl Invocation {
    pub fn new(json: bool, actor_id: Option<i64>, actor_email: Option<String>, actor_role: String) -> Self {
        let email = actor_email
            .or_else(|| std::env::var("USER").ok().map(|user| format!("{}@localhost", user)))
            .unwrap_or_else(|| SYSTEM_ACTOR.to_string());

        let request = RequestContext::new(Actor::new(actor_id, email, actor_role))
            .with_user_agent(format!("ledger-cli/{}", env!("CARGO_PKG_VERSION")));

        Self { json, request }
    }
}

/// Get the ledger directory from environment or default
pub fn get_ledger_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LEDGERLINE_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".ledgerline"))
        .context("Could not find home directory, set LEDGERLINE_DIR")
}

/// Open the ledger context
pub fn get_context() -> Result<LedgerlineContext> {
    let ledger_dir = get_ledger_dir()?;
    LedgerlineContext::new(&ledger_dir).context("Failed to open ledger")
}
