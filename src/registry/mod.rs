//! In-memory document registry.
//!
//! The registry is the single owner of document state. Other components read
//! cloned snapshots and write through [`DocumentRegistry::update`], whose
//! updater closure sees the current document and may decline to patch it.
//! That check-then-write step is what discards results of removed or
//! superseded analysis attempts.

mod blob;
mod patch;
mod timers;

pub use blob::{BlobHandle, BlobStore};
pub use patch::DocumentPatch;
pub use timers::TimerSet;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::watch;
use url::Url;

use crate::models::{Document, DocumentId, RunToken};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a PDF document: {0}")]
    NotPdf(String),

    #[error("Cannot create viewer URL for {0}")]
    Handle(String),

    #[error("{name} is {size} bytes, the limit is {max}")]
    TooLarge { name: String, size: u64, max: u64 },
}

/// Largest payload accepted by [`DocumentRegistry::add`] unless configured.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Outcome of [`DocumentRegistry::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The updater returned no patch.
    Declined,
    /// No document with that id.
    Missing,
    /// The patch named an illegal status transition.
    Rejected,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// A document to add to the registry.
#[derive(Debug, Clone)]
pub enum NewDocument {
    Local {
        name: String,
        payload: Bytes,
        /// Where the upload was read from, if it came from disk.
        path: Option<PathBuf>,
    },
    Library {
        name: String,
        url: String,
        key: Option<String>,
        /// Fetched content, or why the fetch failed.
        payload: Result<Bytes, String>,
    },
}

impl NewDocument {
    pub fn local(name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self::Local {
            name: name.into(),
            payload: payload.into(),
            path: None,
        }
    }

    /// Read a local file from disk.
    ///
    /// The document's viewer URL points at the file itself, so it stays
    /// valid after the document is removed.
    pub fn from_path(path: &Path) -> Result<Self, RegistryError> {
        let payload = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::Local {
            name,
            payload: payload.into(),
            path: Some(std::fs::canonicalize(path)?),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Local { name, .. } | Self::Library { name, .. } => name,
        }
    }
}

/// Whether `payload` looks like a PDF, by magic bytes or file name.
pub fn is_pdf(name: &str, payload: &[u8]) -> bool {
    match infer::get(payload) {
        Some(kind) if kind.mime_type() == "application/pdf" => true,
        _ => name.to_ascii_lowercase().ends_with(".pdf"),
    }
}

struct Entry {
    doc: Document,
    handle: Option<BlobHandle>,
    timers: Option<TimerSet>,
}

#[derive(Default)]
struct RegistryState {
    entries: Vec<Entry>,
    active: Option<DocumentId>,
}

impl RegistryState {
    fn entry_mut(&mut self, id: DocumentId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.doc.id == id)
    }

    fn entry(&self, id: DocumentId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.doc.id == id)
    }
}

/// Shared handle to the session's documents. Cloning shares the same state.
#[derive(Clone)]
pub struct DocumentRegistry {
    state: Arc<Mutex<RegistryState>>,
    blobs: BlobStore,
    version: Arc<watch::Sender<u64>>,
    max_file_size: u64,
}

/// Non-owning reference used by background timers.
#[derive(Clone)]
pub struct WeakRegistry {
    state: Weak<Mutex<RegistryState>>,
    blobs: BlobStore,
    version: Weak<watch::Sender<u64>>,
    max_file_size: u64,
}

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<DocumentRegistry> {
        Some(DocumentRegistry {
            state: self.state.upgrade()?,
            blobs: self.blobs.clone(),
            version: self.version.upgrade()?,
            max_file_size: self.max_file_size,
        })
    }
}

impl Default for DocumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::with_blob_store(BlobStore::new())
    }

    pub fn with_blob_store(blobs: BlobStore) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: Arc::default(),
            blobs,
            version: Arc::new(version),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Set the largest accepted payload, in bytes.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            state: Arc::downgrade(&self.state),
            blobs: self.blobs.clone(),
            version: Arc::downgrade(&self.version),
            max_file_size: self.max_file_size,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // State is only mutated by whole-patch assignment, so a poisoned
        // guard still holds consistent data.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Receiver notified after every applied change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Number of transient handles currently alive.
    pub fn live_handles(&self) -> usize {
        self.blobs.live()
    }

    /// Add documents, selecting the last one.
    ///
    /// Nothing is inserted if any local upload is not a PDF, is larger than
    /// the size limit, or any handle cannot be created. Library documents
    /// with unusable content are kept with a fetch error instead.
    pub fn add(&self, sources: Vec<NewDocument>) -> Result<Vec<Document>, RegistryError> {
        let mut prepared = Vec::with_capacity(sources.len());

        for source in sources {
            let (doc, handle) = match source {
                NewDocument::Local {
                    name,
                    payload,
                    path,
                } => {
                    if !is_pdf(&name, &payload) {
                        return Err(RegistryError::NotPdf(name));
                    }
                    self.check_size(&name, &payload)?;
                    let handle = self.blobs.acquire(&name, &payload)?;
                    let source_url = path
                        .and_then(|p| Url::from_file_path(p).ok())
                        .map(String::from);
                    let mut doc = Document::local(name, payload);
                    doc.viewer.base_url =
                        Some(source_url.unwrap_or_else(|| handle.url().to_string()));
                    (doc, Some(handle))
                }
                NewDocument::Library {
                    name,
                    url,
                    key,
                    payload,
                } => match payload.and_then(|payload| self.check_library(&name, payload)) {
                    Ok(payload) => {
                        let handle = self.blobs.acquire(&name, &payload)?;
                        let mut doc = Document::library(name, url, key, Some(payload));
                        doc.viewer.base_url = Some(handle.url().to_string());
                        (doc, Some(handle))
                    }
                    Err(reason) => {
                        tracing::warn!("Library document {} has no content: {}", name, reason);
                        let mut doc = Document::library(name, url, key, None);
                        doc.fetch_error = Some(reason);
                        (doc, None)
                    }
                },
            };
            prepared.push(Entry {
                doc,
                handle,
                timers: None,
            });
        }

        let added: Vec<Document> = prepared.iter().map(|e| e.doc.clone()).collect();
        if added.is_empty() {
            return Ok(added);
        }

        {
            let mut state = self.lock();
            state.active = added.last().map(|d| d.id);
            state.entries.extend(prepared);
        }
        tracing::info!("Added {} document(s)", added.len());
        self.bump();
        Ok(added)
    }

    fn check_size(&self, name: &str, payload: &[u8]) -> Result<(), RegistryError> {
        let size = payload.len() as u64;
        if size > self.max_file_size {
            return Err(RegistryError::TooLarge {
                name: name.to_string(),
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Fetched library content must pass the same checks as a local upload.
    fn check_library(&self, name: &str, payload: Bytes) -> Result<Bytes, String> {
        if !is_pdf(name, &payload) {
            return Err(RegistryError::NotPdf(name.to_string()).to_string());
        }
        self.check_size(name, &payload).map_err(|e| e.to_string())?;
        Ok(payload)
    }

    /// Remove a document, releasing its handle and stopping its timers.
    pub fn remove(&self, id: DocumentId) -> bool {
        let removed = {
            let mut state = self.lock();
            let Some(index) = state.entries.iter().position(|e| e.doc.id == id) else {
                return false;
            };
            let removed = state.entries.remove(index);

            let previous = state.active.filter(|a| *a != id);
            state.active = match previous {
                Some(active) if state.entry(active).is_some() => Some(active),
                _ => state.entries.last().map(|e| e.doc.id),
            };
            removed
        };

        tracing::info!("Removed document {} ({})", removed.doc.name, id);
        drop(removed);
        self.bump();
        true
    }

    /// Remove every document in one step.
    pub fn remove_all(&self) -> usize {
        let removed = {
            let mut state = self.lock();
            state.active = None;
            std::mem::take(&mut state.entries)
        };
        let count = removed.len();
        drop(removed);
        if count > 0 {
            tracing::info!("Removed all {} document(s)", count);
            self.bump();
        }
        count
    }

    /// Apply the patch returned by `updater`, if any.
    ///
    /// The updater runs under the registry lock and must not call back into
    /// the registry.
    pub fn update<F>(&self, id: DocumentId, updater: F) -> UpdateOutcome
    where
        F: FnOnce(&Document) -> Option<DocumentPatch>,
    {
        let outcome = {
            let mut state = self.lock();
            let Some(entry) = state.entry_mut(id) else {
                return UpdateOutcome::Missing;
            };
            let Some(patch) = updater(&entry.doc) else {
                return UpdateOutcome::Declined;
            };
            if !patch.is_legal_for(&entry.doc) {
                tracing::warn!(
                    "Rejected transition {} -> {:?} for {}",
                    entry.doc.status,
                    patch.status,
                    entry.doc.name
                );
                return UpdateOutcome::Rejected;
            }
            patch.apply(&mut entry.doc);
            UpdateOutcome::Applied
        };
        self.bump();
        outcome
    }

    /// Apply a patch unconditionally (still subject to the transition table).
    pub fn patch(&self, id: DocumentId, patch: DocumentPatch) -> UpdateOutcome {
        self.update(id, |_| Some(patch))
    }

    /// Apply a patch only while `token` is the document's current attempt.
    pub fn patch_if_current(
        &self,
        id: DocumentId,
        token: RunToken,
        patch: DocumentPatch,
    ) -> UpdateOutcome {
        self.update(id, |doc| doc.is_current(token).then_some(patch))
    }

    /// Store the timers of an attempt, replacing any previous set.
    ///
    /// Timers for an attempt that is no longer current are dropped.
    pub fn attach_timers(&self, id: DocumentId, timers: TimerSet) -> bool {
        let mut state = self.lock();
        match state.entry_mut(id) {
            Some(entry) if entry.doc.is_current(timers.token()) => {
                entry.timers = Some(timers);
                true
            }
            _ => false,
        }
    }

    /// Cancel the timers of `token`'s attempt. Timers of a newer attempt are
    /// left running.
    pub fn cancel_timers(&self, id: DocumentId, token: RunToken) -> bool {
        let timers = {
            let mut state = self.lock();
            let Some(entry) = state.entry_mut(id) else {
                return false;
            };
            match &entry.timers {
                Some(t) if t.token() == token => entry.timers.take(),
                _ => None,
            }
        };
        timers.is_some()
    }

    /// Whether timers are running for the document.
    pub fn has_timers(&self, id: DocumentId) -> bool {
        self.lock()
            .entry(id)
            .is_some_and(|e| e.timers.as_ref().is_some_and(|t| !t.is_empty()))
    }

    pub fn get(&self, id: DocumentId) -> Option<Document> {
        self.lock().entry(id).map(|e| e.doc.clone())
    }

    /// Find a document by registry id or service-assigned id.
    pub fn find_by_ref(&self, reference: &str) -> Option<Document> {
        self.lock()
            .entries
            .iter()
            .find(|e| e.doc.matches_ref(reference))
            .map(|e| e.doc.clone())
    }

    /// All documents, in insertion order.
    pub fn snapshot(&self) -> Vec<Document> {
        self.lock().entries.iter().map(|e| e.doc.clone()).collect()
    }

    pub fn ids(&self) -> Vec<DocumentId> {
        self.lock().entries.iter().map(|e| e.doc.id).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn active(&self) -> Option<DocumentId> {
        self.lock().active
    }

    pub fn select(&self, id: DocumentId) -> bool {
        let selected = {
            let mut state = self.lock();
            if state.entry(id).is_none() {
                return false;
            }
            state.active = Some(id);
            true
        };
        self.bump();
        selected
    }
}
