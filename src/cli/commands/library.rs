//! Remote library listing.

use console::style;

use crate::cli::helpers::{format_bytes, truncate};
use crate::cli::icons::warn;
use crate::config::Settings;
use crate::http_client::HttpClient;
use crate::services::LibraryClient;

pub async fn cmd_library(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let http = HttpClient::with_user_agent(
        &settings.api_url,
        settings.request_timeout,
        settings.user_agent.as_deref(),
    )?;
    let listing = LibraryClient::new(http).list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if let Some(warning) = &listing.warning {
        println!("{} {}", warn(), warning);
    }
    if listing.items.is_empty() {
        println!("{} Library is empty", warn());
        return Ok(());
    }

    println!("\n{}", style("Library").bold());
    println!("{}", "-".repeat(70));
    println!("{:<40} {:>10}  {}", "Name", "Size", "Key");
    for item in &listing.items {
        println!(
            "{:<40} {:>10}  {}",
            truncate(&item.name, 40),
            item.size.map(format_bytes).unwrap_or_else(|| "-".to_string()),
            style(item.key.as_deref().unwrap_or("-")).dim()
        );
    }
    println!(
        "\n{} document(s). Add them with {}",
        listing.items.len(),
        style("buzzscan analyze --library <KEY>").cyan()
    );

    Ok(())
}
