//! Formatting helpers for CLI output.

use console::{style, StyledObject};

use crate::models::{Document, DocumentStatus, StepState};

/// Truncate to `max` characters, ending with "..." when shortened.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.2} GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.2} MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.2} KB", bytes as f64 / 1_000.0)
    } else {
        format!("{} B", bytes)
    }
}

pub fn styled_status(status: DocumentStatus) -> StyledObject<&'static str> {
    let label = status.as_str();
    match status {
        DocumentStatus::Idle => style(label).dim(),
        DocumentStatus::Queued => style(label).yellow(),
        DocumentStatus::Loading => style(label).cyan(),
        DocumentStatus::Success => style(label).green(),
        DocumentStatus::Error => style(label).red(),
    }
}

/// Short progress line for a document: the active step while loading,
/// otherwise the status or its failure message.
pub fn describe(doc: &Document) -> String {
    match doc.status {
        DocumentStatus::Loading => doc
            .analysis_steps
            .iter()
            .find(|step| step.state == StepState::Active)
            .map(|step| format!("{}...", step.label))
            .unwrap_or_else(|| "Starting...".to_string()),
        DocumentStatus::Error => doc
            .analysis_error
            .clone()
            .unwrap_or_else(|| "Analysis failed".to_string()),
        DocumentStatus::Success => match &doc.analysis_result {
            Some(result) => format!("{} match(es)", result.total_matches()),
            None => "done".to_string(),
        },
        DocumentStatus::Idle => doc
            .fetch_error
            .clone()
            .unwrap_or_else(|| "idle".to_string()),
        DocumentStatus::Queued => "queued".to_string(),
    }
}
