//! Keyword set management.
//!
//! A [`KeywordSet`] is an ordered list of display terms that are unique by
//! canonical form. The canonical form folds case, punctuation and spacing, and
//! maps a few well-known long forms onto their acronym, so `"AI"`, `"ai"` and
//! `"Artificial Intelligence"` are the same keyword.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Trend keywords tracked by the analysis service.
pub const DEFAULT_TREND_KEYWORDS: &[&str] = &[
    "Artificial Intelligence",
    "AI",
    "Machine Learning",
    "Blockchain",
    "Internet of Things",
    "IoT",
    "Digital Twin",
    "5G",
    "Robotics",
    "Autonomous Systems",
    "Automation",
    "Virtual Reality",
    "Augmented Reality",
    "Cloud Computing",
    "Edge Computing",
    "Fog Computing",
    "Big Data Analytics",
];

/// Label used in feedback for the trend preset.
pub const TREND_LABEL: &str = "trend";

const PUNCTUATION: &[char] = &[
    '-', '_', '/', '\\', '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '\'', '"',
    '`', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}', '&', '+', '*', '#', '|', '<', '>', '=',
];

// Values must already be canonical and must not appear as keys.
const ALIASES: &[(&str, &str)] = &[
    ("artificial intelligence", "ai"),
    ("internet of things", "iot"),
    ("machine learning", "ml"),
    ("5g network", "5g"),
];

/// Normalize a term for equality checks.
pub fn canonicalize(term: &str) -> String {
    let folded = term.to_lowercase();
    let joined = folded
        .split(|c: char| c.is_whitespace() || PUNCTUATION.contains(&c))
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    match ALIASES.iter().find(|(long, _)| *long == joined) {
        Some((_, short)) => (*short).to_string(),
        None => joined,
    }
}

/// Result message for a bulk add or remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordFeedback {
    pub count: usize,
    pub message: String,
}

/// Ordered keyword list, unique by [`canonicalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct KeywordSet {
    terms: Vec<String>,
}

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma separated keyword string.
    pub fn parse(raw: &str) -> Self {
        Self::from_terms(raw.split(','))
    }

    /// Build a set from individual terms, keeping the first surface form of
    /// each canonical value.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        let mut seen: Vec<String> = Vec::new();
        for term in split_terms(terms) {
            let canonical = canonicalize(&term);
            if canonical.is_empty() || seen.contains(&canonical) {
                continue;
            }
            seen.push(canonical);
            set.terms.push(term);
        }
        set
    }

    /// Preset containing [`DEFAULT_TREND_KEYWORDS`].
    pub fn trend_preset() -> Self {
        Self::from_terms(DEFAULT_TREND_KEYWORDS)
    }

    /// Join the terms into the wire format.
    pub fn format(&self) -> String {
        self.terms.join(", ")
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether a term with the same canonical form is present.
    pub fn contains(&self, term: &str) -> bool {
        let canonical = canonicalize(term);
        !canonical.is_empty() && self.terms.iter().any(|t| canonicalize(t) == canonical)
    }

    /// Append every term not already present.
    pub fn add_terms<I, S>(&self, terms: I, label: &str) -> (KeywordSet, KeywordFeedback)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = self.clone();
        let mut added = 0;
        for term in split_terms(terms) {
            if canonicalize(&term).is_empty() || next.contains(&term) {
                continue;
            }
            next.terms.push(term);
            added += 1;
        }

        let message = if added == 0 {
            format!("No new {} keywords to add.", label)
        } else {
            format!("Added {} {} keyword(s).", added, label)
        };
        tracing::debug!("{}", message);

        let next = if added == 0 { self.clone() } else { next };
        (
            next,
            KeywordFeedback {
                count: added,
                message,
            },
        )
    }

    /// Drop every term matching any of `terms` by canonical form.
    pub fn remove_terms<I, S>(&self, terms: I, label: &str) -> (KeywordSet, KeywordFeedback)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets: Vec<String> = split_terms(terms)
            .map(|t| canonicalize(&t))
            .filter(|c| !c.is_empty())
            .collect();

        let kept: Vec<String> = self
            .terms
            .iter()
            .filter(|t| !targets.contains(&canonicalize(t)))
            .cloned()
            .collect();
        let removed = self.terms.len() - kept.len();

        let message = if removed == 0 {
            format!("No {} keywords to remove.", label)
        } else {
            format!("Removed {} {} keyword(s).", removed, label)
        };
        tracing::debug!("{}", message);

        let next = if removed == 0 {
            self.clone()
        } else {
            KeywordSet { terms: kept }
        };
        (
            next,
            KeywordFeedback {
                count: removed,
                message,
            },
        )
    }
}

// Terms never carry commas, so the joined form parses back unchanged.
fn split_terms<I, S>(terms: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    terms.into_iter().flat_map(|term| {
        term.as_ref()
            .split(',')
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    })
}

impl fmt::Display for KeywordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl From<Vec<String>> for KeywordSet {
    fn from(terms: Vec<String>) -> Self {
        Self::from_terms(terms)
    }
}

impl From<KeywordSet> for Vec<String> {
    fn from(set: KeywordSet) -> Self {
        set.terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_normalizes() {
        assert_eq!(canonicalize("  Big   Data-Analytics "), "big data analytics");
        assert_eq!(canonicalize("“Edge” Computing!"), "edge computing");
        assert_eq!(canonicalize("Artificial  Intelligence"), "ai");
        assert_eq!(canonicalize("---"), "");
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        for term in [
            "AI",
            "Artificial Intelligence",
            "Internet-of-Things",
            "C++ / Rust",
            "  (5G) Network ",
            "",
            "machine_learning",
        ] {
            let once = canonicalize(term);
            assert_eq!(canonicalize(&once), once, "term: {:?}", term);
        }
    }

    #[test]
    fn test_parse_dedups_by_canonical_form() {
        let set = KeywordSet::parse("AI, ai, Artificial Intelligence");
        assert_eq!(set.terms(), ["AI"]);
    }

    #[test]
    fn test_parse_keeps_order_and_drops_empties() {
        let set = KeywordSet::parse(" Blockchain ,, AI ,  , blockchain, 5G");
        assert_eq!(set.terms(), ["Blockchain", "AI", "5G"]);
    }

    #[test]
    fn test_format_round_trip() {
        let sets = [
            KeywordSet::parse("AI, Blockchain"),
            KeywordSet::trend_preset(),
            KeywordSet::new(),
            KeywordSet::from_terms(["Digital Twin", "Fog Computing", "5G"]),
        ];
        for set in sets {
            assert_eq!(KeywordSet::parse(&set.format()), set);
        }
    }

    #[test]
    fn test_add_terms_skips_existing() {
        let set = KeywordSet::parse("ai");
        let (next, feedback) = set.add_terms(["AI", "Blockchain"], "X");
        assert_eq!(feedback.count, 1);
        assert_eq!(feedback.message, "Added 1 X keyword(s).");
        assert_eq!(next.terms(), ["ai", "Blockchain"]);

        let (again, feedback) = next.add_terms(["AI", "Blockchain"], "X");
        assert_eq!(feedback.count, 0);
        assert_eq!(feedback.message, "No new X keywords to add.");
        assert_eq!(again, next);
    }

    #[test]
    fn test_remove_terms() {
        let set = KeywordSet::parse("AI, Blockchain, Robotics");
        let (next, feedback) = set.remove_terms(["artificial intelligence", "ROBOTICS"], "X");
        assert_eq!(feedback.count, 2);
        assert_eq!(feedback.message, "Removed 2 X keyword(s).");
        assert_eq!(next.terms(), ["Blockchain"]);

        let (again, feedback) = next.remove_terms(["artificial intelligence", "ROBOTICS"], "X");
        assert_eq!(feedback.count, 0);
        assert_eq!(again, next);
    }

    #[test]
    fn test_remove_nonexistent_is_noop() {
        let set = KeywordSet::parse("AI, Blockchain");
        let (next, feedback) = set.remove_terms(["nonexistent"], "X");
        assert_eq!(feedback.count, 0);
        assert_eq!(feedback.message, "No X keywords to remove.");
        assert_eq!(next, set);
    }

    #[test]
    fn test_trend_preset_bulk_ops() {
        let set = KeywordSet::parse("Blockchain, Sustainability");
        let (with_trends, feedback) = set.add_terms(DEFAULT_TREND_KEYWORDS, TREND_LABEL);
        assert!(feedback.count > 0);
        assert!(with_trends.contains("Edge Computing"));
        assert!(with_trends.contains("Sustainability"));

        let (without, feedback) = with_trends.remove_terms(DEFAULT_TREND_KEYWORDS, TREND_LABEL);
        assert!(feedback.message.starts_with("Removed"));
        assert_eq!(without.terms(), ["Sustainability"]);
    }

    #[test]
    fn test_deserialize_enforces_uniqueness() {
        let set: KeywordSet = serde_json::from_str(r#"["AI", "ai", "IoT"]"#).unwrap();
        assert_eq!(set.terms(), ["AI", "IoT"]);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["AI","IoT"]"#);
    }
}
