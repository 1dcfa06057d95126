//! Analysis dispatcher.
//!
//! Submits documents to the analysis service and records the outcome in the
//! registry. Every attempt carries a fresh [`RunToken`]; each write checks
//! the token first, so results of removed or restarted attempts are dropped
//! instead of applied. In-flight requests are never aborted.

mod types;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::keywords::KeywordSet;
use crate::models::{
    baseline_steps, completed_steps, AnalysisResult, Document, DocumentId, DocumentStatus,
    RunToken,
};
use crate::registry::{DocumentPatch, DocumentRegistry};
use crate::services::progress::ProgressSimulator;

pub use types::{
    AnalysisError, AnalysisEvent, AttemptOutcome, BatchSummary, DispatchError, DispatchMode,
    DispatchOptions, WordBudget,
};

/// One document submission.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub document_id: DocumentId,
    pub file_name: String,
    pub payload: Bytes,
    /// Comma separated keyword string.
    pub keywords: String,
    pub word_budget: WordBudget,
}

/// The remote analysis service.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;
}

struct Attempt {
    id: DocumentId,
    name: String,
    token: RunToken,
}

/// Service that runs analysis batches against a registry.
#[derive(Clone)]
pub struct AnalysisService {
    registry: DocumentRegistry,
    backend: Arc<dyn AnalysisBackend>,
    progress: ProgressSimulator,
    event_tx: Option<mpsc::Sender<AnalysisEvent>>,
}

impl AnalysisService {
    pub fn new(registry: DocumentRegistry, backend: Arc<dyn AnalysisBackend>) -> Self {
        Self {
            registry,
            backend,
            progress: ProgressSimulator::default(),
            event_tx: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressSimulator) -> Self {
        self.progress = progress;
        self
    }

    /// Emit progress events on `event_tx`.
    pub fn with_events(mut self, event_tx: mpsc::Sender<AnalysisEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    async fn emit(&self, event: AnalysisEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Analyze every document in the registry.
    pub async fn dispatch_all(
        &self,
        keywords: &KeywordSet,
        options: DispatchOptions,
    ) -> Result<BatchSummary, DispatchError> {
        let ids = self.registry.ids();
        self.dispatch(&ids, keywords, options).await
    }

    /// Analyze the given documents.
    ///
    /// Documents without payload or already loading are skipped. Per-document
    /// failures are recorded on the document and counted in the summary.
    pub async fn dispatch(
        &self,
        ids: &[DocumentId],
        keywords: &KeywordSet,
        options: DispatchOptions,
    ) -> Result<BatchSummary, DispatchError> {
        if keywords.is_empty() {
            return Err(DispatchError::EmptyKeywords);
        }

        let mut unique: Vec<DocumentId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }

        let eligible: Vec<Document> = unique
            .iter()
            .filter_map(|id| self.registry.get(*id))
            .filter(Document::is_eligible)
            .collect();
        if eligible.is_empty() {
            warn!("No eligible documents among {} requested", unique.len());
            return Err(DispatchError::NothingToAnalyze);
        }

        let mut summary = BatchSummary {
            skipped: unique.len() - eligible.len(),
            ..Default::default()
        };

        let mut attempts = Vec::with_capacity(eligible.len());
        for doc in eligible {
            let token = RunToken::mint();
            let queued = self.registry.update(doc.id, |current| {
                current.is_eligible().then(|| {
                    DocumentPatch::new()
                        .status(DocumentStatus::Queued)
                        .run_token(Some(token))
                        .progress(0)
                        .steps(baseline_steps())
                        .result(None)
                        .backend_document_id(None)
                        .error(None)
                })
            });
            if queued.is_applied() {
                self.emit(AnalysisEvent::DocumentQueued {
                    id: doc.id,
                    name: doc.name.clone(),
                })
                .await;
                attempts.push(Attempt {
                    id: doc.id,
                    name: doc.name,
                    token,
                });
            } else {
                debug!("{} could not be queued ({:?})", doc.name, queued);
                summary.skipped += 1;
            }
        }

        summary.submitted = attempts.len();
        if attempts.is_empty() {
            return Err(DispatchError::NothingToAnalyze);
        }

        let total = attempts.len();
        info!(
            "Analyzing {} document(s) ({})",
            total,
            options.mode.as_str()
        );
        self.emit(AnalysisEvent::BatchStarted { total }).await;

        let formatted = keywords.format();
        match options.mode {
            DispatchMode::Sequential => {
                for (index, attempt) in attempts.iter().enumerate() {
                    let outcome = self
                        .run_queued(attempt, index + 1, total, &formatted, options.word_budget)
                        .await;
                    summary.record(outcome);
                }
            }
            DispatchMode::Concurrent => {
                let outcomes = join_all(attempts.iter().enumerate().map(|(index, attempt)| {
                    self.run_queued(attempt, index + 1, total, &formatted, options.word_budget)
                }))
                .await;
                for outcome in outcomes {
                    summary.record(outcome);
                }
            }
        }

        if summary.has_failures() {
            warn!("{}", summary.message());
        } else {
            info!("{}", summary.message());
        }
        self.emit(AnalysisEvent::BatchComplete { summary }).await;
        Ok(summary)
    }

    /// Re-run one document with a fresh token.
    ///
    /// Allowed while the document is queued, loading or settled. An attempt
    /// already in flight keeps running but its result is discarded.
    pub async fn restart(
        &self,
        id: DocumentId,
        keywords: &KeywordSet,
        options: DispatchOptions,
    ) -> Result<AttemptOutcome, DispatchError> {
        if keywords.is_empty() {
            return Err(DispatchError::EmptyKeywords);
        }
        let doc = self
            .registry
            .get(id)
            .ok_or(DispatchError::UnknownDocument(id))?;
        if doc.payload.is_none() {
            return Err(DispatchError::NothingToAnalyze);
        }

        let token = RunToken::mint();
        let mut current_status = doc.status;
        let outcome = self.registry.update(id, |current| {
            current_status = current.status;
            (current.payload.is_some() && current.status != DocumentStatus::Idle).then(|| {
                DocumentPatch::new()
                    .status(DocumentStatus::Loading)
                    .run_token(Some(token))
                    .progress(0)
                    .steps(baseline_steps())
                    .result(None)
                    .backend_document_id(None)
                    .error(None)
            })
        });
        if !outcome.is_applied() {
            return Err(DispatchError::NotRestartable(id, current_status.as_str()));
        }

        info!("Restarting analysis of {}", doc.name);
        let attempt = Attempt {
            id,
            name: doc.name,
            token,
        };
        Ok(self
            .run_loading(&attempt, 1, 1, &keywords.format(), options.word_budget)
            .await)
    }

    async fn run_queued(
        &self,
        attempt: &Attempt,
        position: usize,
        total: usize,
        keywords: &str,
        word_budget: WordBudget,
    ) -> AttemptOutcome {
        let started = self.registry.patch_if_current(
            attempt.id,
            attempt.token,
            DocumentPatch::new().status(DocumentStatus::Loading),
        );
        if !started.is_applied() {
            debug!("{} superseded before start ({:?})", attempt.name, started);
            self.emit(AnalysisEvent::DocumentSuperseded { id: attempt.id })
                .await;
            return AttemptOutcome::Superseded;
        }
        self.run_loading(attempt, position, total, keywords, word_budget)
            .await
    }

    async fn run_loading(
        &self,
        attempt: &Attempt,
        position: usize,
        total: usize,
        keywords: &str,
        word_budget: WordBudget,
    ) -> AttemptOutcome {
        self.progress
            .start(&self.registry, attempt.id, attempt.token);
        self.emit(AnalysisEvent::DocumentStarted {
            id: attempt.id,
            name: attempt.name.clone(),
            position,
            total,
        })
        .await;

        let payload = self
            .registry
            .get(attempt.id)
            .filter(|doc| doc.is_current(attempt.token))
            .and_then(|doc| doc.payload);
        let Some(payload) = payload else {
            self.progress
                .stop(&self.registry, attempt.id, attempt.token);
            self.emit(AnalysisEvent::DocumentSuperseded { id: attempt.id })
                .await;
            return AttemptOutcome::Superseded;
        };

        let request = AnalysisRequest {
            document_id: attempt.id,
            file_name: attempt.name.clone(),
            payload,
            keywords: keywords.to_string(),
            word_budget,
        };
        let result = self.backend.analyze(request).await;

        let (patch, outcome, event) = match result {
            Ok(result) => {
                let total_matches = result.total_matches();
                let mut patch = settled(DocumentStatus::Success)
                    .error(None);
                if let Some(backend_id) = result.document_id.clone() {
                    patch = patch.backend_document_id(Some(backend_id));
                }
                (
                    patch.result(Some(Arc::new(result))),
                    AttemptOutcome::Succeeded,
                    AnalysisEvent::DocumentCompleted {
                        id: attempt.id,
                        name: attempt.name.clone(),
                        total_matches,
                    },
                )
            }
            Err(e) => {
                let message = e.to_string();
                (
                    settled(DocumentStatus::Error)
                        .result(None)
                        .backend_document_id(None)
                        .error(Some(message.clone())),
                    AttemptOutcome::Failed,
                    AnalysisEvent::DocumentFailed {
                        id: attempt.id,
                        name: attempt.name.clone(),
                        error: message,
                    },
                )
            }
        };

        let applied = self
            .registry
            .patch_if_current(attempt.id, attempt.token, patch);
        self.progress
            .stop(&self.registry, attempt.id, attempt.token);

        if !applied.is_applied() {
            debug!("Discarding stale result for {} ({:?})", attempt.name, applied);
            self.emit(AnalysisEvent::DocumentSuperseded { id: attempt.id })
                .await;
            return AttemptOutcome::Superseded;
        }

        match &event {
            AnalysisEvent::DocumentFailed { error, .. } => {
                warn!("Analysis of {} failed: {}", attempt.name, error)
            }
            _ => info!("Analysis of {} complete", attempt.name),
        }
        self.emit(event).await;
        outcome
    }
}

/// Patch shared by both settlement outcomes.
fn settled(status: DocumentStatus) -> DocumentPatch {
    DocumentPatch::new()
        .status(status)
        .progress(100)
        .steps(completed_steps())
        .run_token(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::registry::{BlobStore, NewDocument};
    use crate::services::ViewerNavigator;

    type Script =
        Box<dyn Fn(usize, &AnalysisRequest) -> (Duration, Result<AnalysisResult, AnalysisError>) + Send + Sync>;

    struct ScriptedBackend {
        calls: AtomicUsize,
        requests: Mutex<Vec<AnalysisRequest>>,
        script: Script,
    }

    impl ScriptedBackend {
        fn new<F>(script: F) -> Arc<Self>
        where
            F: Fn(usize, &AnalysisRequest) -> (Duration, Result<AnalysisResult, AnalysisError>)
                + Send
                + Sync
                + 'static,
        {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                script: Box::new(script),
            })
        }
    }

    #[async_trait]
    impl AnalysisBackend for ScriptedBackend {
        async fn analyze(
            &self,
            request: AnalysisRequest,
        ) -> Result<AnalysisResult, AnalysisError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, result) = (self.script)(call, &request);
            self.requests.lock().unwrap().push(request);
            tokio::time::sleep(delay).await;
            result
        }
    }

    fn frequencies(pairs: &[(&str, u64)]) -> AnalysisResult {
        AnalysisResult {
            frequencies: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
            ..Default::default()
        }
    }

    fn setup(names: &[&str]) -> (tempfile::TempDir, DocumentRegistry, Vec<DocumentId>) {
        let dir = tempfile::tempdir().unwrap();
        let registry = DocumentRegistry::with_blob_store(BlobStore::in_dir(dir.path()));
        let docs = registry
            .add(
                names
                    .iter()
                    .map(|n| NewDocument::local(*n, &b"%PDF-1.4"[..]))
                    .collect(),
            )
            .unwrap();
        let ids = docs.iter().map(|d| d.id).collect();
        (dir, registry, ids)
    }

    fn keywords() -> KeywordSet {
        KeywordSet::parse("AI, Blockchain")
    }

    #[tokio::test]
    async fn test_empty_keywords_rejected() {
        let (_dir, registry, ids) = setup(&["a.pdf"]);
        let backend = ScriptedBackend::new(|_, _| (Duration::ZERO, Ok(frequencies(&[]))));
        let service = AnalysisService::new(registry.clone(), backend.clone());

        let err = service
            .dispatch(&ids, &KeywordSet::new(), DispatchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::EmptyKeywords);
        assert_eq!(registry.get(ids[0]).unwrap().status, DocumentStatus::Idle);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_nothing_to_analyze() {
        let registry = DocumentRegistry::new();
        let docs = registry
            .add(vec![NewDocument::Library {
                name: "gone.pdf".to_string(),
                url: "https://files.test/gone.pdf".to_string(),
                key: None,
                payload: Err("HTTP 404".to_string()),
            }])
            .unwrap();
        let backend = ScriptedBackend::new(|_, _| (Duration::ZERO, Ok(frequencies(&[]))));
        let service = AnalysisService::new(registry, backend);

        let err = service
            .dispatch(&[docs[0].id], &keywords(), DispatchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::NothingToAnalyze);
    }

    #[tokio::test]
    async fn test_sequential_batch_settles_each_document() {
        let (_dir, registry, ids) = setup(&["a.pdf", "b.pdf"]);
        let backend = ScriptedBackend::new(|_, request| {
            let result = if request.file_name == "a.pdf" {
                let mut result = frequencies(&[("AI", 3), ("Blockchain", 0)]);
                result.document_id = Some("srv-a".to_string());
                Ok(result)
            } else {
                Err(AnalysisError::Http { status: 500 })
            };
            (Duration::from_millis(5), result)
        });
        let service = AnalysisService::new(registry.clone(), backend.clone());

        let summary = service
            .dispatch(&ids, &keywords(), DispatchOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.submitted, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.message(), "Analysis failed for 1 document");

        let a = registry.get(ids[0]).unwrap();
        assert_eq!(a.status, DocumentStatus::Success);
        assert_eq!(a.analysis_progress, 100);
        assert_eq!(a.analysis_steps, completed_steps());
        assert_eq!(a.run_token, None);
        assert_eq!(a.backend_document_id.as_deref(), Some("srv-a"));
        assert_eq!(a.analysis_result.as_ref().unwrap().frequency("AI"), 3);

        let b = registry.get(ids[1]).unwrap();
        assert_eq!(b.status, DocumentStatus::Error);
        assert_eq!(b.analysis_error.as_deref(), Some("HTTP 500"));
        assert!(!registry.has_timers(ids[0]));
        assert!(!registry.has_timers(ids[1]));

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[0].file_name, "a.pdf");
        assert_eq!(requests[1].file_name, "b.pdf");
        assert_eq!(requests[0].keywords, "AI, Blockchain");
        assert_eq!(requests[0].word_budget, WordBudget::Default);
    }

    #[tokio::test]
    async fn test_concurrent_mode() {
        let (_dir, registry, ids) = setup(&["a.pdf", "b.pdf", "c.pdf"]);
        let backend = ScriptedBackend::new(|call, _| {
            (
                Duration::from_millis(30 - 10 * call as u64),
                Ok(frequencies(&[("AI", 1)])),
            )
        });
        let service = AnalysisService::new(registry.clone(), backend.clone());

        let options = DispatchOptions {
            mode: DispatchMode::Concurrent,
            word_budget: WordBudget::Disabled,
        };
        let summary = service.dispatch(&ids, &keywords(), options).await.unwrap();
        assert_eq!(summary.succeeded, 3);
        assert!(registry
            .snapshot()
            .iter()
            .all(|d| d.status == DocumentStatus::Success));
        assert!(backend
            .requests
            .lock()
            .unwrap()
            .iter()
            .all(|r| r.word_budget == WordBudget::Disabled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_discards_late_result() {
        let (_dir, registry, ids) = setup(&["a.pdf"]);
        let backend = ScriptedBackend::new(|call, _| {
            if call == 0 {
                (
                    Duration::from_secs(10),
                    Err(AnalysisError::Service("late failure".to_string())),
                )
            } else {
                (Duration::from_secs(1), Ok(frequencies(&[("AI", 2)])))
            }
        });
        let service = AnalysisService::new(registry.clone(), backend);

        let batch = {
            let service = service.clone();
            let ids = ids.clone();
            tokio::spawn(async move {
                service
                    .dispatch(&ids, &keywords(), DispatchOptions::default())
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        let first = registry.get(ids[0]).unwrap();
        assert_eq!(first.status, DocumentStatus::Loading);
        let t1 = first.run_token.unwrap();

        let outcome = service
            .restart(ids[0], &keywords(), DispatchOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, AttemptOutcome::Succeeded);

        let summary = batch.await.unwrap().unwrap();
        assert_eq!(summary.superseded, 1);
        assert_eq!(summary.failed, 0);

        let doc = registry.get(ids[0]).unwrap();
        assert_eq!(doc.status, DocumentStatus::Success);
        assert!(doc.analysis_error.is_none());
        assert_eq!(doc.analysis_progress, 100);
        assert!(!doc.is_current(t1));
        assert!(!registry.has_timers(ids[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_rerun_clears_previous_result() {
        let (_dir, registry, ids) = setup(&["a.pdf"]);
        let backend = ScriptedBackend::new(|call, _| {
            if call == 0 {
                let mut result = frequencies(&[("AI", 3)]);
                result.document_id = Some("srv-1".to_string());
                (Duration::from_secs(1), Ok(result))
            } else {
                (
                    Duration::from_secs(3),
                    Err(AnalysisError::Service("Could not extract text".to_string())),
                )
            }
        });
        let service = AnalysisService::new(registry.clone(), backend);
        let navigator = ViewerNavigator::new(registry.clone());

        service
            .dispatch(&ids, &keywords(), DispatchOptions::default())
            .await
            .unwrap();
        assert_eq!(registry.find_by_ref("srv-1").unwrap().id, ids[0]);
        assert!(navigator.locate("srv-1", Some(1), None).is_some());

        let rerun = {
            let service = service.clone();
            let id = ids[0];
            tokio::spawn(async move {
                service
                    .restart(id, &keywords(), DispatchOptions::default())
                    .await
            })
        };

        // While the new attempt runs, the old result is gone.
        tokio::time::sleep(Duration::from_secs(1)).await;
        let loading = registry.get(ids[0]).unwrap();
        assert_eq!(loading.status, DocumentStatus::Loading);
        assert!(loading.analysis_result.is_none());
        assert!(loading.backend_document_id.is_none());

        assert_eq!(rerun.await.unwrap().unwrap(), AttemptOutcome::Failed);
        let doc = registry.get(ids[0]).unwrap();
        assert_eq!(doc.status, DocumentStatus::Error);
        assert!(doc.analysis_result.is_none());
        assert!(doc.backend_document_id.is_none());
        assert!(registry.find_by_ref("srv-1").is_none());
        assert!(navigator.locate("srv-1", Some(1), None).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_redispatch_queues_without_previous_result() {
        let (_dir, registry, ids) = setup(&["a.pdf"]);
        let backend = ScriptedBackend::new(|call, _| {
            let mut result = frequencies(&[("AI", 1)]);
            result.document_id = Some(format!("srv-{}", call));
            (Duration::from_secs(2), Ok(result))
        });
        let service = AnalysisService::new(registry.clone(), backend);

        service
            .dispatch(&ids, &keywords(), DispatchOptions::default())
            .await
            .unwrap();
        assert_eq!(
            registry.get(ids[0]).unwrap().backend_document_id.as_deref(),
            Some("srv-0")
        );

        let batch = {
            let service = service.clone();
            let ids = ids.clone();
            tokio::spawn(async move {
                service
                    .dispatch(&ids, &keywords(), DispatchOptions::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        let running = registry.get(ids[0]).unwrap();
        assert!(!running.status.is_settled());
        assert!(running.analysis_result.is_none());
        assert!(registry.find_by_ref("srv-0").is_none());

        batch.await.unwrap().unwrap();
        assert_eq!(registry.find_by_ref("srv-1").unwrap().id, ids[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_of_queued_document_supersedes_batch_slot() {
        let (_dir, registry, ids) = setup(&["a.pdf", "b.pdf"]);
        let backend = ScriptedBackend::new(|_, _| {
            (Duration::from_secs(5), Ok(frequencies(&[("AI", 1)])))
        });
        let service = AnalysisService::new(registry.clone(), backend.clone());

        let batch = {
            let service = service.clone();
            let ids = ids.clone();
            tokio::spawn(async move {
                service
                    .dispatch(&ids, &keywords(), DispatchOptions::default())
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(registry.get(ids[1]).unwrap().status, DocumentStatus::Queued);
        let outcome = service
            .restart(ids[1], &keywords(), DispatchOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, AttemptOutcome::Succeeded);

        let summary = batch.await.unwrap().unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.superseded, 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.get(ids[1]).unwrap().status, DocumentStatus::Success);
    }

    #[tokio::test]
    async fn test_restart_rules() {
        let (_dir, registry, ids) = setup(&["a.pdf"]);
        let backend = ScriptedBackend::new(|_, _| (Duration::ZERO, Ok(frequencies(&[]))));
        let service = AnalysisService::new(registry.clone(), backend);

        let err = service
            .restart(ids[0], &keywords(), DispatchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::NotRestartable(ids[0], "idle"));

        let missing = DocumentId::new();
        let err = service
            .restart(missing, &keywords(), DispatchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::UnknownDocument(missing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_during_flight() {
        let (_dir, registry, ids) = setup(&["a.pdf", "b.pdf"]);
        let backend = ScriptedBackend::new(|_, _| {
            (Duration::from_secs(3), Ok(frequencies(&[("AI", 1)])))
        });
        let service = AnalysisService::new(registry.clone(), backend);

        let batch = {
            let service = service.clone();
            let ids = ids.clone();
            tokio::spawn(async move {
                service
                    .dispatch(&ids, &keywords(), DispatchOptions::default())
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(registry.get(ids[0]).unwrap().status, DocumentStatus::Loading);
        let before = registry.live_handles();
        assert!(registry.remove(ids[0]));
        assert_eq!(registry.live_handles(), before - 1);

        let summary = batch.await.unwrap().unwrap();
        assert_eq!(summary.superseded, 1);
        assert_eq!(summary.succeeded, 1);
        assert!(registry.get(ids[0]).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_events_bracket_batch() {
        let (_dir, registry, ids) = setup(&["a.pdf"]);
        let backend = ScriptedBackend::new(|_, _| (Duration::ZERO, Ok(frequencies(&[("AI", 4)]))));
        let (tx, mut rx) = mpsc::channel(32);
        let service = AnalysisService::new(registry, backend).with_events(tx);

        service
            .dispatch(&ids, &keywords(), DispatchOptions::default())
            .await
            .unwrap();
        drop(service);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events[0], AnalysisEvent::DocumentQueued { .. }));
        assert!(matches!(events[1], AnalysisEvent::BatchStarted { total: 1 }));
        assert!(matches!(
            events.iter().find(|e| matches!(e, AnalysisEvent::DocumentCompleted { .. })),
            Some(AnalysisEvent::DocumentCompleted { total_matches: 4, .. })
        ));
        assert!(matches!(
            events.last(),
            Some(AnalysisEvent::BatchComplete { .. })
        ));
    }
}
