//! Output formatting utilities

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use serde::Serialize;

use ledgerline_core::{Error, ErrorResponse, OperationResult};

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print a value as pretty JSON
pub fn json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn or_dash<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_else(|| "-".to_string())
}

/// Report a failed command. Ledger errors become a structured `code: message`.
pub fn failure(err: &anyhow::Error, as_json: bool) {
    let response = match err.downcast_ref::<Error>() {
        Some(e) => {
            if !e.is_business() {
                tracing::error!(error = %e, "command failed");
            }
            ErrorResponse::from(e)
        }
        None => ErrorResponse {
            code: "CLI_ERROR".to_string(),
            message: format!("{:#}", err),
            detail_code: None,
        },
    };

    if as_json {
        let envelope: OperationResult<()> = OperationResult {
            success: false,
            data: None,
            error: Some(response),
        };
        match serde_json::to_string_pretty(&envelope) {
            Ok(text) => println!("{}", text),
            Err(_) => eprintln!("{:#}", err),
        }
        return;
    }

    let code = match &response.detail_code {
        Some(detail) => format!("{} ({})", response.code, detail),
        None => response.code.clone(),
    };
    eprintln!("{} {}", code.red().bold(), response.message.red());
}
