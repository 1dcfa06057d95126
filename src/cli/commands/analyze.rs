//! Batch keyword analysis of PDF documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use console::style;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::cli::helpers::{format_bytes, styled_status, truncate};
use crate::cli::icons::{dim_arrow, error, info, success, warn};
use crate::cli::progress::{DocumentProgress, Renderer};
use crate::config::Settings;
use crate::http_client::HttpClient;
use crate::keywords::{KeywordSet, DEFAULT_TREND_KEYWORDS, TREND_LABEL};
use crate::models::{AnalysisResult, Document, DocumentStatus, SourceType};
use crate::registry::{is_pdf, BlobStore, DocumentRegistry, NewDocument};
use crate::services::{
    AnalysisEvent, AnalysisService, BatchSummary, DispatchMode, DispatchOptions, LibraryClient,
    LibraryItem, ProgressSimulator, ViewerNavigator, WordBudget,
};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// PDF files to analyze
    pub files: Vec<PathBuf>,

    /// Comma-separated keywords (defaults to the configured keywords)
    #[arg(short, long)]
    pub keywords: Option<String>,

    /// Also search for the trend keyword preset
    #[arg(long)]
    pub trend_keywords: bool,

    /// Analyze the full text instead of the service's sampled word budget
    #[arg(long)]
    pub no_word_budget: bool,

    /// Send all documents at once instead of one after another
    #[arg(long)]
    pub concurrent: bool,

    /// Library documents to analyze, by key or name (repeatable)
    #[arg(short, long)]
    pub library: Vec<String>,

    /// Write a JSON report to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Print keyword evidence with viewer locations
    #[arg(short, long)]
    pub evidence: bool,

    /// Save word cloud images into this directory
    #[arg(long)]
    pub word_cloud: Option<PathBuf>,

    /// Restart failed documents once after the batch
    #[arg(long)]
    pub retry_failed: bool,
}

#[derive(Serialize)]
struct DocumentReport<'a> {
    id: String,
    name: &'a str,
    source: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    library_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend_document_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    viewer_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a AnalysisResult>,
}

#[derive(Serialize)]
struct BatchReport<'a> {
    keywords: &'a KeywordSet,
    word_budget: &'static str,
    summary: BatchSummary,
    documents: Vec<DocumentReport<'a>>,
}

fn resolve_keywords(settings: &Settings, args: &AnalyzeArgs) -> KeywordSet {
    let keywords = match &args.keywords {
        Some(raw) => KeywordSet::parse(raw),
        None => settings.keywords.clone(),
    };
    if args.trend_keywords {
        let (with_trends, feedback) = keywords.add_terms(DEFAULT_TREND_KEYWORDS, TREND_LABEL);
        println!("{} {}", info(), feedback.message);
        with_trends
    } else {
        keywords
    }
}

fn read_local_files(files: &[PathBuf], max_file_size: u64) -> Vec<NewDocument> {
    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        match NewDocument::from_path(path) {
            Ok(NewDocument::Local { name, payload, .. }) if !is_pdf(&name, &payload) => {
                eprintln!("{} Skipping {}: not a PDF", warn(), path.display());
            }
            Ok(NewDocument::Local { payload, .. }) if payload.len() as u64 > max_file_size => {
                eprintln!(
                    "{} Skipping {}: {} is over the {} limit",
                    warn(),
                    path.display(),
                    format_bytes(payload.len() as u64),
                    format_bytes(max_file_size)
                );
            }
            Ok(source) => sources.push(source),
            Err(e) => eprintln!("{} Cannot read {}: {}", error(), path.display(), e),
        }
    }
    sources
}

async fn pick_library_items(
    library: &LibraryClient,
    references: &[String],
) -> anyhow::Result<Vec<NewDocument>> {
    let listing = library.list().await?;
    if let Some(warning) = &listing.warning {
        eprintln!("{} {}", warn(), warning);
    }

    let mut picked: Vec<LibraryItem> = Vec::new();
    for reference in references {
        match listing.find(reference) {
            Some(item) if !picked.contains(item) => picked.push(item.clone()),
            Some(_) => {}
            None => eprintln!("{} Not in library: {}", warn(), reference),
        }
    }
    if picked.is_empty() {
        return Ok(Vec::new());
    }

    println!(
        "{} Fetching {} library document(s)",
        info(),
        picked.len()
    );
    Ok(library.pick(&picked).await)
}

fn build_registry(settings: &Settings) -> anyhow::Result<DocumentRegistry> {
    let registry = match &settings.blob_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            DocumentRegistry::with_blob_store(BlobStore::in_dir(dir))
        }
        None => DocumentRegistry::new(),
    };
    Ok(registry.with_max_file_size(settings.max_file_size))
}

/// Analyze local files and library picks.
pub async fn cmd_analyze(settings: &Settings, args: AnalyzeArgs) -> anyhow::Result<()> {
    let keywords = resolve_keywords(settings, &args);
    if keywords.is_empty() {
        anyhow::bail!("No keywords given. Use --keywords or set `keywords` in the config file.");
    }
    if args.files.is_empty() && args.library.is_empty() {
        anyhow::bail!("Nothing to analyze. Pass PDF files or --library keys.");
    }

    let http = HttpClient::with_user_agent(
        &settings.api_url,
        settings.request_timeout,
        settings.user_agent.as_deref(),
    )?;

    let mut sources = read_local_files(&args.files, settings.max_file_size);
    if !args.library.is_empty() {
        let library = LibraryClient::new(http.clone());
        sources.extend(pick_library_items(&library, &args.library).await?);
    }
    if sources.is_empty() {
        anyhow::bail!("No readable PDF documents");
    }

    let registry = build_registry(settings)?;
    let docs = registry.add(sources)?;
    for doc in &docs {
        match &doc.fetch_error {
            Some(reason) => eprintln!("{} {} could not be fetched: {}", warn(), doc.name, reason),
            None => tracing::debug!(
                "Added {} ({})",
                doc.name,
                doc.size().map(format_bytes).unwrap_or_default()
            ),
        }
    }

    let options = DispatchOptions {
        word_budget: if args.no_word_budget {
            WordBudget::Disabled
        } else {
            settings.word_budget
        },
        mode: if args.concurrent {
            DispatchMode::Concurrent
        } else {
            settings.dispatch_mode
        },
    };

    println!(
        "{} Analyzing {} document(s) for {} keyword(s) at {}",
        info(),
        docs.iter().filter(|d| d.is_eligible()).count(),
        keywords.len(),
        style(http.base_url()).dim()
    );

    let (event_tx, mut event_rx) = mpsc::channel::<AnalysisEvent>(100);
    let service = AnalysisService::new(registry.clone(), Arc::new(http))
        .with_progress(ProgressSimulator::new(settings.progress.clone()))
        .with_events(event_tx);

    let progress = Arc::new(DocumentProgress::new(&docs)?);
    let renderer = Renderer::spawn(registry.clone(), progress.clone());

    let printer = progress.clone();
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                AnalysisEvent::DocumentCompleted {
                    name,
                    total_matches,
                    ..
                } => printer.println(&format!(
                    "  {} {} ({} match(es))",
                    success(),
                    name,
                    total_matches
                )),
                AnalysisEvent::DocumentFailed { name, error: e, .. } => {
                    printer.println(&format!("  {} {}: {}", error(), name, e))
                }
                AnalysisEvent::DocumentSuperseded { id } => {
                    tracing::debug!("Discarded stale result for {}", id)
                }
                _ => {}
            }
        }
    });

    let dispatched = service.dispatch_all(&keywords, options).await;
    let mut summary = match dispatched {
        Ok(summary) => summary,
        Err(e) => {
            renderer.stop().await;
            progress.finish(&registry.snapshot());
            return Err(e.into());
        }
    };

    if args.retry_failed && summary.has_failures() {
        let failed: Vec<Document> = registry
            .snapshot()
            .into_iter()
            .filter(|d| d.status == DocumentStatus::Error && d.payload.is_some())
            .collect();
        progress.println(&format!(
            "{} Retrying {} failed document(s)",
            info(),
            failed.len()
        ));
        for doc in failed {
            match service.restart(doc.id, &keywords, options).await {
                Ok(outcome) => summary.record_retry(outcome),
                Err(e) => progress.println(&format!("  {} {}: {}", error(), doc.name, e)),
            }
        }
    }

    drop(service);
    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }
    renderer.stop().await;

    let docs = registry.snapshot();
    progress.finish(&docs);

    print_results(&docs, &keywords);

    if args.evidence {
        print_evidence(&registry, &docs);
    }
    if let Some(dir) = &args.word_cloud {
        save_word_clouds(dir, &docs)?;
    }
    if let Some(path) = &args.json {
        write_report(path, &keywords, options.word_budget, summary, &docs)?;
        println!("{} Report written to {}", success(), path.display());
    }

    let released = registry.remove_all();
    tracing::debug!("Released {} document(s)", released);

    if summary.has_failures() {
        anyhow::bail!("{}", summary.message());
    }
    println!("{} {}", success(), summary.message());
    Ok(())
}

fn print_results(docs: &[Document], keywords: &KeywordSet) {
    println!("\n{}", style("Results").bold());
    println!("{}", "-".repeat(70));

    for doc in docs {
        println!(
            "{:<40} {}",
            truncate(&doc.name, 40),
            styled_status(doc.status)
        );
        match (&doc.analysis_result, &doc.analysis_error) {
            (Some(result), _) => {
                let counts: Vec<String> = keywords
                    .terms()
                    .iter()
                    .map(|term| format!("{} {}", term, style(result.frequency(term)).bold()))
                    .collect();
                println!("  {} {}", dim_arrow(), counts.join(" · "));
                if let Some(sentiment) = &result.sentiment {
                    println!(
                        "  {} Sentiment: polarity {:.2}, subjectivity {:.2}",
                        dim_arrow(),
                        sentiment.polarity,
                        sentiment.subjectivity
                    );
                }
                if let Some(score) = result
                    .readability
                    .as_ref()
                    .and_then(|r| r.flesch_reading_ease)
                {
                    println!("  {} Flesch reading ease: {:.1}", dim_arrow(), score);
                }
                for insight in result.trend_insights.iter().filter(|i| i.total_mentions > 0) {
                    println!(
                        "  {} {}: {}",
                        dim_arrow(),
                        insight.trend,
                        insight
                            .summary
                            .clone()
                            .unwrap_or_else(|| format!("{} mention(s)", insight.total_mentions))
                    );
                }
            }
            (None, Some(message)) => println!("  {} {}", dim_arrow(), style(message).red()),
            (None, None) => {
                if let Some(reason) = &doc.fetch_error {
                    println!("  {} {}", dim_arrow(), style(reason).yellow());
                }
            }
        }
    }
    println!();
}

fn print_evidence(registry: &DocumentRegistry, docs: &[Document]) {
    let navigator = ViewerNavigator::new(registry.clone());

    for doc in docs {
        let Some(result) = &doc.analysis_result else {
            continue;
        };
        let evidence = result.evidence();
        if evidence.is_empty() {
            continue;
        }

        println!("{}", style(&doc.name).bold());
        let reference = doc.id.to_string();
        for item in evidence {
            let page = item
                .page
                .map(|p| format!("p.{}", p))
                .unwrap_or_else(|| "p.?".to_string());
            println!(
                "  {} [{}] {} {}",
                info(),
                style(&item.keyword).cyan(),
                style(page).dim(),
                truncate(item.snippet.trim(), 100)
            );
            if let Some(target) = navigator.locate_evidence(&reference, &item) {
                println!("    {} {}", dim_arrow(), style(target).underlined());
            }
        }
        println!();
    }
}

fn save_word_clouds(dir: &Path, docs: &[Document]) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    for doc in docs {
        let Some(image) = doc.analysis_result.as_ref().and_then(|r| r.image_bytes()) else {
            continue;
        };
        let stem = Path::new(&doc.name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| doc.id.to_string());
        let path = dir.join(format!("{}-wordcloud.png", stem));
        std::fs::write(&path, image)?;
        println!("{} Word cloud saved to {}", success(), path.display());
    }
    Ok(())
}

/// Viewer files of fetched library documents are released with the
/// registry, so the report links those to the library instead.
fn report_viewer_url(doc: &Document) -> Option<&str> {
    match doc.source_type {
        SourceType::Library => doc.source_url.as_deref(),
        SourceType::Local => doc.viewer.current(),
    }
}

fn write_report(
    path: &Path,
    keywords: &KeywordSet,
    word_budget: WordBudget,
    summary: BatchSummary,
    docs: &[Document],
) -> anyhow::Result<()> {
    let report = BatchReport {
        keywords,
        word_budget: word_budget.as_str(),
        summary,
        documents: docs
            .iter()
            .map(|doc| DocumentReport {
                id: doc.id.to_string(),
                name: &doc.name,
                source: doc.source_type.as_str(),
                status: doc.status.as_str(),
                library_key: doc.library_key.as_deref(),
                backend_document_id: doc.backend_document_id.as_deref(),
                viewer_url: report_viewer_url(doc),
                error: doc
                    .analysis_error
                    .as_deref()
                    .or(doc.fetch_error.as_deref()),
                result: doc.analysis_result.as_deref(),
            })
            .collect(),
    };
    std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    Ok(())
}
