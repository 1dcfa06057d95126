//! Transient file handles that let the external viewer open a document.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::NamedTempFile;
use url::Url;

use super::RegistryError;

/// Issues [`BlobHandle`]s and counts how many are alive.
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    dir: Option<PathBuf>,
    live: Arc<AtomicUsize>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store handles under `dir` instead of the system temp directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            live: Arc::default(),
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Write `payload` to a new transient file.
    pub fn acquire(&self, name: &str, payload: &[u8]) -> Result<BlobHandle, RegistryError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("buzzscan-").suffix(".pdf");
        let mut file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(payload)?;
        file.flush()?;

        let url = Url::from_file_path(file.path())
            .map_err(|_| RegistryError::Handle(file.path().display().to_string()))?
            .to_string();

        self.live.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Acquired handle for {} at {}", name, url);

        Ok(BlobHandle {
            file,
            url,
            live: Arc::clone(&self.live),
        })
    }
}

/// A transient copy of a document's payload. Dropping it deletes the file.
#[derive(Debug)]
pub struct BlobHandle {
    file: NamedTempFile,
    url: String,
    live: Arc<AtomicUsize>,
}

impl BlobHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for BlobHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!("Released handle {}", self.url);
    }
}
