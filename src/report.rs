//! Human-friendly rendering of tracker state for the CLI

use colored::*;
use prettytable::{format, row, Table};

use crate::errors::Result;
use crate::projector::Aggregate;
use crate::toasts::{Toast, ToastStatus};
use crate::tracker::types::{ActionState, PendingAction};
use crate::utils::format_time_diff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

fn colored_state(state: ActionState) -> ColoredString {
    match state {
        ActionState::Pending => state.to_string().yellow(),
        ActionState::Confirmed => state.to_string().green(),
        ActionState::Failed => state.to_string().red().bold(),
    }
}

/// Table of entries, one row per (subject, actor)
pub fn entries_table(entries: &[PendingAction]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(row!["Subject", "Actor", "Kind", "Payload", "State", "Age", "Result"]);

    for entry in entries {
        let age = format_time_diff(entry.created_at.timestamp_millis().max(0) as u64, true);
        let result = match (&entry.failure_reason, &entry.result_ref) {
            (Some(reason), _) => reason.clone(),
            (None, Some(tx)) => tx.clone(),
            (None, None) => "-".to_string(),
        };
        table.add_row(row![
            entry.subject_id,
            entry.actor_id,
            entry.kind,
            entry.payload,
            colored_state(entry.state),
            age,
            result
        ]);
    }

    table
}

pub fn render_entries(entries: &[PendingAction], output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(entries)?),
        OutputFormat::Table if entries.is_empty() => Ok("(no tracked actions)\n".dimmed().to_string()),
        OutputFormat::Table => Ok(entries_table(entries).to_string()),
    }
}

pub fn render_aggregate(label: &str, aggregate: &Aggregate, output: OutputFormat) -> Result<String> {
    if output == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(aggregate)?);
    }

    let body = match aggregate {
        Aggregate::Votes(tally) => format!(
            "aye {} | nay {} | abstain {} | total {} | {:.2}% approval",
            tally.aye.to_string().green(),
            tally.nay.to_string().red(),
            tally.abstain,
            tally.total,
            tally.approval_percentage
        ),
        Aggregate::Approvals(count) => format!(
            "{} approvals | {} rejections",
            count.approvals.to_string().green(),
            count.rejections.to_string().red()
        ),
    };
    Ok(format!("{} {}", format!("{}:", label).bold(), body))
}

pub fn render_toasts(toasts: &[Toast]) -> String {
    let mut output = String::new();
    for toast in toasts {
        let marker = match toast.status {
            ToastStatus::Pending => "…".yellow(),
            ToastStatus::Success => "✔".green(),
            ToastStatus::Error => "✘".red(),
        };
        output.push_str(&format!("{} [{}] {} ({})", marker, toast.id, toast.title, toast.key));
        if let Some(message) = &toast.message {
            output.push_str(&format!(": {}", message));
        }
        if toast.can_retry() {
            output.push_str(&format!(" {}", "[retry]".cyan()));
        }
        output.push('\n');
    }
    output
}
