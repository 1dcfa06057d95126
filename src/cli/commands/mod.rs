//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod analyze;
mod config_cmd;
mod keywords;
mod library;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "buzzscan")]
#[command(about = "Keyword analysis for batches of PDF reports")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze PDF files for keyword usage
    Analyze(analyze::AnalyzeArgs),

    /// Normalize a keyword list and apply edits to it
    Keywords {
        /// Comma-separated keywords (defaults to the configured keywords)
        raw: Option<String>,
        /// Keywords to add (comma-separated, repeatable)
        #[arg(short, long)]
        add: Vec<String>,
        /// Keywords to remove (comma-separated, repeatable)
        #[arg(short, long)]
        remove: Vec<String>,
        /// Add the trend keyword preset
        #[arg(long, conflicts_with = "no_trend")]
        trend: bool,
        /// Remove the trend keyword preset
        #[arg(long)]
        no_trend: bool,
    },

    /// List documents offered by the analysis service library
    Library {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config.clone(),
        use_cwd: cli.cwd,
    };
    let (settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Analyze(args) => analyze::cmd_analyze(&settings, args).await,
        Commands::Keywords {
            raw,
            add,
            remove,
            trend,
            no_trend,
        } => keywords::cmd_keywords(&settings, raw.as_deref(), &add, &remove, trend, no_trend),
        Commands::Library { json } => library::cmd_library(&settings, json).await,
        Commands::Config => config_cmd::cmd_config_show(&settings, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from([
            "buzzscan",
            "-v",
            "analyze",
            "a.pdf",
            "b.pdf",
            "--keywords",
            "AI, Blockchain",
            "--concurrent",
            "--library",
            "2024/report.pdf",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.files.len(), 2);
                assert_eq!(args.keywords.as_deref(), Some("AI, Blockchain"));
                assert!(args.concurrent);
                assert_eq!(args.library, vec!["2024/report.pdf".to_string()]);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_trend_flags_conflict() {
        assert!(Cli::try_parse_from(["buzzscan", "keywords", "AI", "--trend", "--no-trend"]).is_err());
    }
}
