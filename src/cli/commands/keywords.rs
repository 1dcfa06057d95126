//! Keyword list commands.

use console::style;

use crate::cli::icons::{dim_arrow, info, success, warn};
use crate::config::Settings;
use crate::keywords::{KeywordFeedback, KeywordSet, DEFAULT_TREND_KEYWORDS, TREND_LABEL};

/// Normalize a keyword list, apply edits and print the result.
pub fn cmd_keywords(
    settings: &Settings,
    raw: Option<&str>,
    add: &[String],
    remove: &[String],
    trend: bool,
    no_trend: bool,
) -> anyhow::Result<()> {
    let mut keywords = match raw {
        Some(raw) => KeywordSet::parse(raw),
        None => settings.keywords.clone(),
    };

    let mut feedback = Vec::new();
    if trend {
        let (next, fb) = keywords.add_terms(DEFAULT_TREND_KEYWORDS, TREND_LABEL);
        keywords = next;
        feedback.push(fb);
    }
    if no_trend {
        let (next, fb) = keywords.remove_terms(DEFAULT_TREND_KEYWORDS, TREND_LABEL);
        keywords = next;
        feedback.push(fb);
    }
    if !add.is_empty() {
        let (next, fb) = keywords.add_terms(add, "custom");
        keywords = next;
        feedback.push(fb);
    }
    if !remove.is_empty() {
        let (next, fb) = keywords.remove_terms(remove, "custom");
        keywords = next;
        feedback.push(fb);
    }

    for KeywordFeedback { count, message } in &feedback {
        if *count > 0 {
            println!("{} {}", success(), message);
        } else {
            println!("{} {}", warn(), message);
        }
    }

    if keywords.is_empty() {
        println!("{} No keywords", warn());
        return Ok(());
    }

    println!(
        "{} {} keyword(s): {}",
        info(),
        keywords.len(),
        style(keywords.format()).bold()
    );
    for term in keywords.terms() {
        println!("  {} {}", dim_arrow(), term);
    }

    Ok(())
}
