use std::sync::Arc;

use chrono::Utc;

use crate::models::{AnalysisResult, AnalysisSteps, Document, DocumentStatus, RunToken};

/// Partial update of a [`Document`]. Unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub status: Option<DocumentStatus>,
    /// `Some(None)` clears the token.
    pub run_token: Option<Option<RunToken>>,
    pub progress: Option<u8>,
    pub steps: Option<AnalysisSteps>,
    pub result: Option<Option<Arc<AnalysisResult>>>,
    pub error: Option<Option<String>>,
    pub backend_document_id: Option<Option<String>>,
    pub navigation_target: Option<Option<String>>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: DocumentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn run_token(mut self, token: Option<RunToken>) -> Self {
        self.run_token = Some(token);
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    pub fn steps(mut self, steps: AnalysisSteps) -> Self {
        self.steps = Some(steps);
        self
    }

    pub fn result(mut self, result: Option<Arc<AnalysisResult>>) -> Self {
        self.result = Some(result);
        self
    }

    pub fn error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn backend_document_id(mut self, id: Option<String>) -> Self {
        self.backend_document_id = Some(id);
        self
    }

    pub fn navigation_target(mut self, target: Option<String>) -> Self {
        self.navigation_target = Some(target);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.run_token.is_none()
            && self.progress.is_none()
            && self.steps.is_none()
            && self.result.is_none()
            && self.error.is_none()
            && self.backend_document_id.is_none()
            && self.navigation_target.is_none()
    }

    /// Whether the patch describes a legal edge from the document's status.
    pub(crate) fn is_legal_for(&self, doc: &Document) -> bool {
        self.status
            .map_or(true, |next| doc.status.can_transition_to(next))
    }

    pub(crate) fn apply(self, doc: &mut Document) {
        if let Some(status) = self.status {
            doc.status = status;
        }
        if let Some(token) = self.run_token {
            doc.run_token = token;
        }
        if let Some(progress) = self.progress {
            doc.analysis_progress = progress;
        }
        if let Some(steps) = self.steps {
            doc.analysis_steps = steps;
        }
        if let Some(result) = self.result {
            doc.analysis_result = result;
        }
        if let Some(error) = self.error {
            doc.analysis_error = error;
        }
        if let Some(id) = self.backend_document_id {
            doc.backend_document_id = id;
        }
        if let Some(target) = self.navigation_target {
            doc.viewer.current_target = target;
        }
        doc.updated_at = Utc::now();
    }
}
