//! Typed view of the analysis service response.
//!
//! The service computes everything; this side only reads it. Every field is
//! optional or defaulted so older and newer service versions both parse.

use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

/// A completed analysis for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    /// Keyword to occurrence count.
    pub frequencies: BTreeMap<String, u64>,
    /// Keyword to percentage of total words.
    pub densities: BTreeMap<String, f64>,
    /// Keyword to context snippets.
    pub kwic: BTreeMap<String, Vec<KwicEntry>>,
    pub collocations: BTreeMap<String, Collocations>,
    pub sentiment: Option<Sentiment>,
    pub readability: Option<Readability>,
    pub trends: Vec<TrendResult>,
    #[serde(rename = "trendInsights")]
    pub trend_insights: Vec<TrendInsight>,
    /// Word cloud preview as a data URL.
    pub image: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub document_id: Option<String>,
    #[serde(rename = "processingSummary")]
    pub processing_summary: Option<ProcessingSummary>,
}

/// A KWIC snippet, either bare text or annotated with its location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KwicEntry {
    Context(KwicContext),
    Snippet(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KwicContext {
    pub snippet: String,
    pub page: Option<u32>,
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub match_text: Option<String>,
}

impl KwicEntry {
    pub fn snippet(&self) -> &str {
        match self {
            Self::Context(ctx) => &ctx.snippet,
            Self::Snippet(s) => s,
        }
    }

    pub fn page(&self) -> Option<u32> {
        match self {
            Self::Context(ctx) => ctx.page,
            Self::Snippet(_) => None,
        }
    }

    pub fn match_text(&self) -> Option<&str> {
        match self {
            Self::Context(ctx) => ctx.match_text.as_deref(),
            Self::Snippet(_) => None,
        }
    }
}

/// Neighbor words on either side of a keyword, with counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collocations {
    pub left: Vec<(String, u64)>,
    pub right: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sentiment {
    pub polarity: f64,
    pub subjectivity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Readability {
    pub flesch_reading_ease: Option<f64>,
    pub total_words: Option<u64>,
    pub total_sentences: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendResult {
    pub trend: String,
    pub count: u64,
    pub contexts: Vec<serde_json::Value>,
    pub status_counts: BTreeMap<String, u64>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendInsight {
    pub trend: String,
    pub summary: Option<String>,
    pub total_mentions: u64,
    pub status_counts: BTreeMap<String, u64>,
    pub evidence: Vec<TrendEvidence>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendEvidence {
    pub sentence: String,
    pub status: Option<String>,
}

/// Truncation and sampling the service applied to a large document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSummary {
    #[serde(rename = "wordBudget")]
    pub word_budget: Option<serde_json::Value>,
    #[serde(rename = "pageSampling")]
    pub page_sampling: Option<serde_json::Value>,
}

/// A piece of result output that can be mapped back into the source PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    pub keyword: String,
    pub snippet: String,
    pub page: Option<u32>,
    pub match_text: Option<String>,
}

impl AnalysisResult {
    /// Evidence for every KWIC snippet, in keyword order.
    pub fn evidence(&self) -> Vec<Evidence> {
        self.kwic
            .iter()
            .flat_map(|(keyword, entries)| {
                entries.iter().map(move |entry| Evidence {
                    keyword: keyword.clone(),
                    snippet: entry.snippet().to_string(),
                    page: entry.page(),
                    match_text: entry
                        .match_text()
                        .map(str::to_string)
                        .or_else(|| Some(keyword.clone())),
                })
            })
            .collect()
    }

    pub fn frequency(&self, keyword: &str) -> u64 {
        self.frequencies.get(keyword).copied().unwrap_or(0)
    }

    /// Total occurrences across all keywords.
    pub fn total_matches(&self) -> u64 {
        self.frequencies.values().sum()
    }

    /// Decode the word cloud image if it is a base64 data URL.
    pub fn image_bytes(&self) -> Option<Vec<u8>> {
        let image = self.image.as_deref()?;
        let (_, data) = image.split_once(";base64,")?;
        base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .ok()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
