//! Audit commands - search, history, report, export, cleanup, stats, schedule

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use dialoguer::Confirm;

use super::{get_context, Invocation};
use crate::output;
use ledgerline_core::domain::{AuditQuery, DateRange, Page};
use ledgerline_core::{AuditAction, AuditEntityType, AuditRecord};

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Search audit records
    Search {
        /// Case-insensitive match on details or actor email
        #[arg(long)]
        term: Option<String>,
        #[arg(long)]
        entity_type: Option<AuditEntityType>,
        #[arg(long)]
        action: Option<AuditAction>,
        #[command(flatten)]
        range: RangeArgs,
        /// Page number, starting at 0
        #[arg(long, default_value = "0")]
        page: usize,
        #[arg(long, default_value = "20")]
        size: usize,
    },
    /// Audit history of an entity, user, client or action
    History {
        /// Entity type, used with --entity-id
        #[arg(long, requires = "entity_id")]
        entity_type: Option<AuditEntityType>,
        #[arg(long, requires = "entity_type")]
        entity_id: Option<i64>,
        #[arg(long)]
        user: Option<i64>,
        #[arg(long)]
        client: Option<i64>,
        #[arg(long)]
        action: Option<AuditAction>,
        /// Most recent N records
        #[arg(long)]
        recent: Option<usize>,
    },
    /// Generate a compliance report
    Report {
        #[command(flatten)]
        range: RangeArgs,
        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export audit records to CSV
    Export {
        #[command(flatten)]
        range: RangeArgs,
        /// Write the CSV to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete audit records older than the retention period
    Cleanup {
        /// Retention in days (defaults to the configured value)
        #[arg(long)]
        days: Option<u32>,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
    /// Event counts and success rate
    Stats {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Run the daily retention cleanup in the foreground until Enter is pressed
    Schedule,
}

/// Date window, both ends optional and inclusive
#[derive(Args)]
pub struct RangeArgs {
    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// End date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl RangeArgs {
    fn to_range(&self) -> Result<DateRange> {
        let start = self.from.map(day_start).transpose()?;
        let end = match self.to {
            Some(day) => Some(day_start(day)? + Duration::days(1) - Duration::milliseconds(1)),
            None => None,
        };
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                bail!("--from must not be after --to");
            }
        }
        Ok(DateRange::new(start, end))
    }
}

fn day_start(day: NaiveDate) -> Result<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0)
        .map(|at| at.and_utc())
        .with_context(|| format!("Invalid date: {}", day))
}

pub fn run(inv: &Invocation, command: AuditCommands) -> Result<()> {
    let ctx = get_context()?;
    let reporting = &ctx.reporting;

    match command {
        AuditCommands::Search { term, entity_type, action, range, page, size } => {
            let mut query = AuditQuery::default().range(range.to_range()?);
            if let Some(term) = term {
                query = query.term(term);
            }
            if let Some(entity_type) = entity_type {
                query = query.entity_type(entity_type);
            }
            if let Some(action) = action {
                query = query.action(action);
            }

            let result = reporting.search(&query, Page::new(page, size))?;
            if inv.json {
                return output::json(&result);
            }
            print_records(&result.items);
            println!(
                "Page {} of {} ({} matching)",
                result.page.number + 1,
                result.total_pages().max(1),
                result.total
            );
        }
        AuditCommands::History { entity_type, entity_id, user, client, action, recent } => {
            let records = match (entity_type.zip(entity_id), user, client, action, recent) {
                (Some((entity_type, id)), ..) => reporting.entity_history(entity_type, id)?,
                (_, Some(user), ..) => reporting.user_history(user)?,
                (_, _, Some(client), ..) => reporting.client_history(client)?,
                (_, _, _, Some(action), _) => reporting.by_action(action)?,
                (_, _, _, _, Some(limit)) => reporting.recent(limit)?,
                _ => bail!("Pass one of --entity-type/--entity-id, --user, --client, --action or --recent"),
            };
            if inv.json {
                return output::json(&records);
            }
            if records.is_empty() {
                println!("No audit records found.");
                return Ok(());
            }
            print_records(&records);
        }
        AuditCommands::Report { range, output: path } => {
            let report = reporting.generate_compliance_report(&inv.request, &range.to_range()?)?;
            match path {
                Some(path) => {
                    std::fs::write(&path, &report)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    output::success(&format!("Report written to {}", path.display()));
                }
                None if inv.json => output::json(&serde_json::json!({ "report": report }))?,
                None => print!("{}", report),
            }
        }
        AuditCommands::Export { range, output: path } => {
            let csv = reporting.export_to_csv(&range.to_range()?)?;
            match path {
                Some(path) => {
                    std::fs::write(&path, &csv)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    output::success(&format!("Exported to {}", path.display()));
                }
                None => print!("{}", csv),
            }
        }
        AuditCommands::Cleanup { days, force } => {
            let days = days.unwrap_or(ctx.config.audit.retention_days);
            if !force && !inv.json {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete audit records older than {} days?", days))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let deleted = reporting.cleanup(&inv.request, days)?;
            if inv.json {
                return output::json(&serde_json::json!({ "deleted": deleted, "retention_days": days }));
            }
            output::success(&format!("Deleted {} audit records older than {} days", deleted, days));
        }
        AuditCommands::Stats { range } => {
            let range = range.to_range()?;
            let stats = reporting.statistics(&range)?;
            if inv.json {
                return output::json(&stats);
            }
            println!("{} {}", "Audit Statistics".bold(), range.to_string().dimmed());
            println!("  Total events:    {}", stats.total_events);
            println!("  Security events: {}", stats.security_events);
            println!("  Failed events:   {}", stats.failed_events);
            println!("  Success rate:    {:.2}%", stats.success_rate);
        }
        AuditCommands::Schedule => {
            let mut scheduler = ctx.start_retention()?;
            output::success(&format!(
                "Retention cleanup runs daily at {:02}:00 UTC, keeping {} days. Press Enter to stop.",
                ctx.config.audit.cleanup_hour_utc, ctx.config.audit.retention_days
            ));
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            scheduler.stop();
            println!("Stopped.");
        }
    }

    Ok(())
}

fn print_records(records: &[AuditRecord]) {
    let mut table = output::create_table();
    table.set_header(vec!["ID", "Time", "Actor", "Action", "Entity", "Status", "Details"]);
    for record in records {
        let status = if record.is_failure() {
            record.status.to_string().red().to_string()
        } else {
            record.status.to_string()
        };
        let entity = match record.entity_id {
            Some(id) => format!("{} {}", record.entity_type, id),
            None => record.entity_type.to_string(),
        };
        table.add_row(vec![
            record.id.to_string(),
            output::format_time(&record.created_at),
            record.user_email.clone(),
            record.action.to_string(),
            entity,
            status,
            record.details.clone(),
        ]);
    }
    println!("{}", table);
}
