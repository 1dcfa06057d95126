//! Document models for an analysis session.
//!
//! Documents exist only in memory for the lifetime of a session. Every
//! mutation goes through [`crate::registry::DocumentRegistry::update`], which
//! is where the status transition table below is enforced.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::AnalysisResult;

/// Stable identifier for a document, never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

static NEXT_RUN_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Marker for one analysis attempt of one document.
///
/// Tokens are unique across the process. A document only accepts updates
/// carrying the token of its current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunToken(u64);

impl RunToken {
    pub fn mint() -> Self {
        Self(NEXT_RUN_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Local,
    Library,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Library => "library",
        }
    }
}

/// Analysis status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Idle,
    Queued,
    Loading,
    Success,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "queued" => Some(Self::Queued),
            "loading" => Some(Self::Loading),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` is a legal edge.
    ///
    /// Staying in the same status is not a transition and is always allowed.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (*self, next),
            (Idle, Queued)
                | (Queued, Loading)
                | (Loading, Success)
                | (Loading, Error)
                | (Success, Loading)
                | (Error, Loading)
                | (Success, Queued)
                | (Error, Queued)
        )
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one analysis milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Active,
    Completed,
}

/// A milestone shown while a document is being analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisStep {
    pub id: &'static str,
    pub label: &'static str,
    pub state: StepState,
}

pub const STEP_COUNT: usize = 4;

/// The fixed milestone sequence, in order.
pub const ANALYSIS_STEPS: [(&str, &str); STEP_COUNT] = [
    ("upload", "Uploading document"),
    ("extract", "Extracting text"),
    ("analyze", "Analyzing keywords"),
    ("finalize", "Preparing results"),
];

pub type AnalysisSteps = [AnalysisStep; STEP_COUNT];

/// All milestones pending.
pub fn baseline_steps() -> AnalysisSteps {
    steps_with(|_| StepState::Pending)
}

/// All milestones completed.
pub fn completed_steps() -> AnalysisSteps {
    steps_with(|_| StepState::Completed)
}

/// First milestone active, the rest pending.
pub fn started_steps() -> AnalysisSteps {
    steps_with(|i| {
        if i == 0 {
            StepState::Active
        } else {
            StepState::Pending
        }
    })
}

fn steps_with(state: impl Fn(usize) -> StepState) -> AnalysisSteps {
    std::array::from_fn(|i| AnalysisStep {
        id: ANALYSIS_STEPS[i].0,
        label: ANALYSIS_STEPS[i].1,
        state: state(i),
    })
}

/// What the external viewer needs to show a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerLocator {
    /// Base URL of the document (transient file URL or library URL).
    pub base_url: Option<String>,
    /// Last navigation target handed to the viewer.
    pub current_target: Option<String>,
}

impl ViewerLocator {
    /// The URL the viewer should currently render.
    pub fn current(&self) -> Option<&str> {
        self.current_target
            .as_deref()
            .or(self.base_url.as_deref())
    }
}

/// A document under analysis.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    /// Display name.
    pub name: String,
    /// File content, absent when a library fetch failed.
    pub payload: Option<Bytes>,
    pub source_type: SourceType,
    /// Library URL the payload was fetched from.
    pub source_url: Option<String>,
    /// Library key (folder path) for library documents.
    pub library_key: Option<String>,
    pub status: DocumentStatus,
    pub analysis_result: Option<Arc<AnalysisResult>>,
    pub analysis_error: Option<String>,
    /// Why the payload could not be fetched.
    pub fetch_error: Option<String>,
    /// 0-100, meaningful while loading.
    pub analysis_progress: u8,
    pub analysis_steps: AnalysisSteps,
    /// Token of the attempt currently in flight.
    pub run_token: Option<RunToken>,
    pub viewer: ViewerLocator,
    /// Identifier assigned by the analysis service.
    pub backend_document_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    fn with_source(name: String, payload: Option<Bytes>, source_type: SourceType) -> Self {
        let now = Utc::now();
        Self {
            id: DocumentId::new(),
            name,
            payload,
            source_type,
            source_url: None,
            library_key: None,
            status: DocumentStatus::Idle,
            analysis_result: None,
            analysis_error: None,
            fetch_error: None,
            analysis_progress: 0,
            analysis_steps: baseline_steps(),
            run_token: None,
            viewer: ViewerLocator::default(),
            backend_document_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a document from a local upload.
    pub fn local(name: impl Into<String>, payload: Bytes) -> Self {
        Self::with_source(name.into(), Some(payload), SourceType::Local)
    }

    /// Create a document picked from the remote library.
    pub fn library(
        name: impl Into<String>,
        url: impl Into<String>,
        key: Option<String>,
        payload: Option<Bytes>,
    ) -> Self {
        let url = url.into();
        let mut doc = Self::with_source(name.into(), payload, SourceType::Library);
        doc.viewer.base_url = Some(url.clone());
        doc.source_url = Some(url);
        doc.library_key = key;
        doc
    }

    /// Size of the payload in bytes.
    pub fn size(&self) -> Option<u64> {
        self.payload.as_ref().map(|p| p.len() as u64)
    }

    /// Whether `token` identifies the attempt currently in flight.
    pub fn is_current(&self, token: RunToken) -> bool {
        self.run_token == Some(token)
    }

    /// Whether a dispatch may pick this document up.
    pub fn is_eligible(&self) -> bool {
        self.payload.is_some() && self.status != DocumentStatus::Loading
    }

    /// Match either the registry id or the service-assigned id.
    pub fn matches_ref(&self, reference: &str) -> bool {
        let reference = reference.trim();
        if reference.is_empty() {
            return false;
        }
        DocumentId::parse(reference).is_some_and(|id| id == self.id)
            || self.backend_document_id.as_deref() == Some(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use DocumentStatus::*;
        assert!(Idle.can_transition_to(Queued));
        assert!(Queued.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Success));
        assert!(Loading.can_transition_to(Error));
        assert!(Success.can_transition_to(Loading));
        assert!(Error.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Loading));

        assert!(!Idle.can_transition_to(Loading));
        assert!(!Idle.can_transition_to(Success));
        assert!(!Queued.can_transition_to(Success));
        assert!(!Success.can_transition_to(Idle));
        assert!(!Loading.can_transition_to(Queued));
    }

    #[test]
    fn test_run_tokens_are_unique() {
        let a = RunToken::mint();
        let b = RunToken::mint();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            DocumentStatus::Idle,
            DocumentStatus::Queued,
            DocumentStatus::Loading,
            DocumentStatus::Success,
            DocumentStatus::Error,
        ] {
            assert_eq!(DocumentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::from_str("done"), None);
    }

    #[test]
    fn test_eligibility() {
        let mut doc = Document::local("a.pdf", Bytes::from_static(b"%PDF-1.4"));
        assert!(doc.is_eligible());
        doc.status = DocumentStatus::Loading;
        assert!(!doc.is_eligible());

        let missing = Document::library("b.pdf", "https://example.com/b.pdf", None, None);
        assert!(!missing.is_eligible());
    }

    #[test]
    fn test_matches_ref() {
        let mut doc = Document::local("a.pdf", Bytes::from_static(b"%PDF-1.4"));
        assert!(doc.matches_ref(&doc.id.to_string()));
        assert!(!doc.matches_ref("srv-1"));
        doc.backend_document_id = Some("srv-1".to_string());
        assert!(doc.matches_ref("srv-1"));
        assert!(!doc.matches_ref(""));
    }

    #[test]
    fn test_step_baselines() {
        assert!(baseline_steps()
            .iter()
            .all(|s| s.state == StepState::Pending));
        let started = started_steps();
        assert_eq!(started[0].state, StepState::Active);
        assert_eq!(started[0].id, "upload");
        assert_eq!(started[3].id, "finalize");
        assert!(completed_steps()
            .iter()
            .all(|s| s.state == StepState::Completed));
    }
}
