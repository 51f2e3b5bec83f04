//! Configuration management
//!
//! Settings live in `settings.json` inside the ledger directory:
//! ```json
//! {
//!   "clientGate": { "baseUrl": "https://clients.internal", "timeoutMs": 5000 },
//!   "ledger": { "referencePrefix": "TXN", "reversalPolicy": "once" },
//!   "audit": { "retentionDays": 365, "cleanupHourUtc": 2 },
//!   "logLevel": "info"
//! }
//! ```
//!
//! Missing file or missing keys fall back to defaults. `LEDGERLINE_*`
//! environment variables override the file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::services::ReversalPolicy;

pub const SETTINGS_FILE: &str = "settings.json";

/// Ledgerline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub client_gate: GateSettings,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub audit: AuditSettings,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_gate: GateSettings::default(),
            ledger: LedgerSettings::default(),
            audit: AuditSettings::default(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateSettings {
    /// No URL means the gate is unavailable and mutations fail closed
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_gate_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_gate_timeout_ms(),
            api_token: None,
        }
    }
}

impl GateSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSettings {
    #[serde(default = "default_reference_prefix")]
    pub reference_prefix: String,
    #[serde(default)]
    pub reversal_policy: ReversalPolicy,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            reference_prefix: default_reference_prefix(),
            reversal_policy: ReversalPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSettings {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_cleanup_hour")]
    pub cleanup_hour_utc: u32,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            cleanup_hour_utc: default_cleanup_hour(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_gate_timeout_ms() -> u64 {
    5000
}

fn default_reference_prefix() -> String {
    "TXN".to_string()
}

fn default_retention_days() -> u32 {
    365
}

fn default_cleanup_hour() -> u32 {
    2
}

impl Config {
    /// Load config from the ledger directory, then apply env overrides
    pub fn load(ledger_dir: &Path) -> Result<Self> {
        Self::load_with_env(ledger_dir, |key| std::env::var(key).ok())
    }

    /// Load config reading overrides through `env` instead of the process environment
    pub fn load_with_env<F>(ledger_dir: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings_path = ledger_dir.join(SETTINGS_FILE);

        let mut config: Config = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings in {}", settings_path.display()))?
        } else {
            Config::default()
        };

        if let Some(url) = env("LEDGERLINE_GATE_URL").filter(|v| !v.trim().is_empty()) {
            config.client_gate.base_url = Some(url);
        }
        if let Some(timeout) = env("LEDGERLINE_GATE_TIMEOUT_MS") {
            config.client_gate.timeout_ms = timeout
                .parse()
                .with_context(|| format!("LEDGERLINE_GATE_TIMEOUT_MS is not a number: {}", timeout))?;
        }
        if let Some(token) = env("LEDGERLINE_GATE_TOKEN").filter(|v| !v.trim().is_empty()) {
            config.client_gate.api_token = Some(token);
        }
        if let Some(days) = env("LEDGERLINE_AUDIT_RETENTION_DAYS") {
            config.audit.retention_days = days
                .parse()
                .with_context(|| format!("LEDGERLINE_AUDIT_RETENTION_DAYS is not a number: {}", days))?;
        }
        if let Some(level) = env("LEDGERLINE_LOG").filter(|v| !v.trim().is_empty()) {
            config.log_level = level;
        }

        Ok(config)
    }

    /// Save config to the ledger directory
    pub fn save(&self, ledger_dir: &Path) -> Result<()> {
        let settings_path = ledger_dir.join(SETTINGS_FILE);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}
