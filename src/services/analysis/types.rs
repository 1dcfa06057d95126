//! Types for the analysis dispatcher.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DocumentId;

/// Whether the service may truncate very large documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordBudget {
    #[default]
    Default,
    Disabled,
}

impl WordBudget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Disabled => "disabled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// How documents in one batch are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One document at a time, in submission order.
    #[default]
    Sequential,
    /// All documents at once.
    Concurrent,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Concurrent => "concurrent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sequential" => Some(Self::Sequential),
            "concurrent" | "parallel" => Some(Self::Concurrent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    pub word_budget: WordBudget,
    pub mode: DispatchMode,
}

/// Failure of a single analysis request.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Could not reach analysis service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}")]
    Http { status: u16 },

    /// Non-2xx response carrying an error message.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response from analysis service")]
    InvalidResponse,

    /// 2xx response whose body reports an error.
    #[error("{0}")]
    Service(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

/// Input validation failures, reported before anything is dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Add at least one keyword before running the analysis")]
    EmptyKeywords,

    #[error("Nothing to analyze: add a PDF document first")]
    NothingToAnalyze,

    #[error("Unknown document: {0}")]
    UnknownDocument(DocumentId),

    #[error("Document {0} cannot be restarted while it is {1}")]
    NotRestartable(DocumentId, &'static str),
}

/// Progress events emitted while a batch runs.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum AnalysisEvent {
    BatchStarted {
        total: usize,
    },
    DocumentQueued {
        id: DocumentId,
        name: String,
    },
    DocumentStarted {
        id: DocumentId,
        name: String,
        position: usize,
        total: usize,
    },
    DocumentCompleted {
        id: DocumentId,
        name: String,
        total_matches: u64,
    },
    DocumentFailed {
        id: DocumentId,
        name: String,
        error: String,
    },
    /// A newer attempt or a removal made this one stale.
    DocumentSuperseded {
        id: DocumentId,
    },
    BatchComplete {
        summary: BatchSummary,
    },
}

/// Counts for one dispatch call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub submitted: usize,
    /// Requested documents that were not eligible.
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub superseded: usize,
}

impl BatchSummary {
    pub fn message(&self) -> String {
        match self.failed {
            0 => format!("Analysis complete for {} document(s)", self.succeeded),
            1 => "Analysis failed for 1 document".to_string(),
            n => format!("Analysis failed for {} documents", n),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Account for a restart of a document this batch counted as failed.
    pub fn record_retry(&mut self, outcome: AttemptOutcome) {
        if outcome == AttemptOutcome::Succeeded && self.failed > 0 {
            self.failed -= 1;
            self.succeeded += 1;
        }
    }

    pub(crate) fn record(&mut self, outcome: AttemptOutcome) {
        match outcome {
            AttemptOutcome::Succeeded => self.succeeded += 1,
            AttemptOutcome::Failed => self.failed += 1,
            AttemptOutcome::Superseded => self.superseded += 1,
        }
    }
}

/// How one attempt ended, from the dispatcher's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
    /// The result was discarded because the attempt is no longer current.
    Superseded,
}
