//! Configuration display.

use console::style;

use crate::cli::helpers::format_bytes;
use crate::cli::icons::{dim_arrow, success, warn};
use crate::config::{Config, Settings};

/// Print the effective settings and where they came from.
pub fn cmd_config_show(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    match &config.source_path {
        Some(path) => println!("{} Config file: {}", success(), path.display()),
        None => println!("{} No config file found, using defaults", warn()),
    }

    println!("\n{}", style("Analysis service").bold());
    println!("  {} API URL: {}", dim_arrow(), settings.api_url);
    println!(
        "  {} Request timeout: {}",
        dim_arrow(),
        settings
            .request_timeout
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "  {} User agent: {}",
        dim_arrow(),
        settings.user_agent.as_deref().unwrap_or("default")
    );

    println!("\n{}", style("Analysis").bold());
    println!("  {} Word budget: {}", dim_arrow(), settings.word_budget.as_str());
    println!("  {} Dispatch mode: {}", dim_arrow(), settings.dispatch_mode.as_str());
    println!(
        "  {} Max file size: {}",
        dim_arrow(),
        format_bytes(settings.max_file_size)
    );
    if settings.keywords.is_empty() {
        println!("  {} Keywords: {}", dim_arrow(), style("none").dim());
    } else {
        println!("  {} Keywords: {}", dim_arrow(), settings.keywords);
    }

    let progress = &settings.progress;
    println!("\n{}", style("Progress").bold());
    println!("  {} Tick: {}ms", dim_arrow(), progress.tick.as_millis());
    println!(
        "  {} Increment: {}-{}, floor {}, cap {}",
        dim_arrow(),
        progress.increment_min,
        progress.increment_max,
        progress.floor,
        progress.cap
    );
    println!(
        "  {} Milestones: {}",
        dim_arrow(),
        progress
            .milestones
            .iter()
            .map(|m| format!("{}ms", m.as_millis()))
            .collect::<Vec<_>>()
            .join(", ")
    );

    println!("\n{}", style("Viewer files").bold());
    println!(
        "  {} Directory: {}",
        dim_arrow(),
        settings
            .blob_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "system temp".to_string())
    );

    Ok(())
}
