//! Per-document progress bars fed from registry snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::models::{Document, DocumentId, DocumentStatus};
use crate::registry::DocumentRegistry;

use super::helpers::{describe, truncate};

/// One bar per document plus a batch bar on top.
pub struct DocumentProgress {
    multi: MultiProgress,
    batch: ProgressBar,
    bars: HashMap<DocumentId, ProgressBar>,
}

impl DocumentProgress {
    pub fn new(docs: &[Document]) -> anyhow::Result<Self> {
        let multi = MultiProgress::new();

        let batch = multi.add(ProgressBar::new(docs.len() as u64));
        batch.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}")?
                .progress_chars("█▓░"),
        );
        batch.set_message("Analyzing");

        let doc_style = ProgressStyle::default_bar()
            .template("  {prefix:32} [{bar:25.cyan/blue}] {pos:>3}% {wide_msg}")?
            .progress_chars("━╸─");

        let mut bars = HashMap::with_capacity(docs.len());
        for doc in docs {
            let bar = multi.add(ProgressBar::new(100));
            bar.set_style(doc_style.clone());
            bar.set_prefix(truncate(&doc.name, 32));
            bar.set_message(describe(doc));
            bars.insert(doc.id, bar);
        }
        batch.enable_steady_tick(Duration::from_millis(100));

        Ok(Self { multi, batch, bars })
    }

    /// Redraw every bar from a registry snapshot.
    pub fn render(&self, docs: &[Document]) {
        let mut settled = 0;
        for doc in docs {
            let Some(bar) = self.bars.get(&doc.id) else {
                continue;
            };
            bar.set_position(u64::from(doc.analysis_progress));
            bar.set_message(describe(doc));
            if doc.status.is_settled() {
                settled += 1;
            }
        }
        self.batch.set_position(settled);
    }

    /// Print above the bars without tearing them.
    pub fn println(&self, message: &str) {
        if self.multi.println(message).is_err() {
            println!("{}", message);
        }
    }

    pub fn finish(&self, docs: &[Document]) {
        self.render(docs);
        for doc in docs {
            if let Some(bar) = self.bars.get(&doc.id) {
                match doc.status {
                    DocumentStatus::Success | DocumentStatus::Error => {
                        bar.finish_with_message(describe(doc))
                    }
                    _ => bar.abandon_with_message(describe(doc)),
                }
            }
        }
        self.batch.finish_with_message("Done");
    }
}

/// Handle to a running renderer task.
pub struct Renderer {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Renderer {
    /// Re-render whenever the registry changes.
    pub fn spawn(registry: DocumentRegistry, progress: Arc<DocumentProgress>) -> Self {
        let (stop, mut stopped) = oneshot::channel();
        let mut changes = registry.subscribe();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        progress.render(&registry.snapshot());
                    }
                }
            }
        });

        Self {
            stop: Some(stop),
            task,
        }
    }

    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!("Progress renderer failed: {}", e);
        }
    }
}
