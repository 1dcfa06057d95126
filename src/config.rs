//! Configuration management for buzzscan using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http_client::{normalize_base_url, DEFAULT_API_URL};
use crate::keywords::KeywordSet;
use crate::registry::DEFAULT_MAX_FILE_SIZE;
use crate::services::{DispatchMode, ProgressConfig, WordBudget};

/// Environment variables naming the service URL, highest priority first.
pub const API_URL_ENV_VARS: &[&str] = &[
    "BUZZSCAN_API_URL",
    "APP_API_URL",
    "VITE_API_URL",
    "REACT_APP_API_URL",
];

fn conversion_error(type_name: &str, message: String) -> prefer::Error {
    prefer::Error::ConversionError {
        key: String::new(),
        type_name: type_name.to_string(),
        source: message.into(),
    }
}

impl prefer::FromValue for DispatchMode {
    fn from_value(value: &prefer::ConfigValue) -> prefer::Result<Self> {
        let s = value
            .as_str()
            .ok_or_else(|| conversion_error("DispatchMode", "expected string".to_string()))?;
        DispatchMode::from_str(&s.to_lowercase()).ok_or_else(|| {
            conversion_error("DispatchMode", format!("unknown dispatch mode: {}", s))
        })
    }
}

impl prefer::FromValue for WordBudget {
    fn from_value(value: &prefer::ConfigValue) -> prefer::Result<Self> {
        let s = value
            .as_str()
            .ok_or_else(|| conversion_error("WordBudget", "expected string".to_string()))?;
        WordBudget::from_str(&s.to_lowercase())
            .ok_or_else(|| conversion_error("WordBudget", format!("unknown word budget: {}", s)))
    }
}

/// `[progress]` table of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct ProgressFileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment_max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<u32>,
    /// Milestone delays in milliseconds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[prefer(default)]
    pub milestones_ms: Vec<u64>,
}

impl ProgressFileConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    fn percent(value: Option<u32>, fallback: u8) -> u8 {
        value.map_or(fallback, |v| v.min(100) as u8)
    }

    /// Overlay the configured values on `base`.
    pub fn apply(&self, base: ProgressConfig) -> ProgressConfig {
        let mut config = base;
        if let Some(ms) = self.tick_ms {
            config.tick = Duration::from_millis(ms);
        }
        config.increment_min = Self::percent(self.increment_min, config.increment_min);
        config.increment_max = Self::percent(self.increment_max, config.increment_max);
        config.floor = Self::percent(self.floor, config.floor);
        config.cap = Self::percent(self.cap, config.cap);
        for (slot, ms) in config.milestones.iter_mut().zip(&self.milestones_ms) {
            *slot = Duration::from_millis(*ms);
        }
        config.normalized()
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the analysis service.
    pub api_url: String,
    /// Request timeout. None waits for as long as the service takes.
    pub request_timeout: Option<Duration>,
    /// User agent config value (see `resolve_user_agent`).
    pub user_agent: Option<String>,
    pub word_budget: WordBudget,
    pub dispatch_mode: DispatchMode,
    /// Keywords used when none are given on the command line.
    pub keywords: KeywordSet,
    pub progress: ProgressConfig,
    /// Directory for transient viewer files. None uses the system temp dir.
    pub blob_dir: Option<PathBuf>,
    /// Largest accepted document, in bytes.
    pub max_file_size: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: None,
            user_agent: None,
            word_budget: WordBudget::Default,
            dispatch_mode: DispatchMode::Sequential,
            keywords: KeywordSet::new(),
            progress: ProgressConfig::default(),
            blob_dir: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// Analysis service base URL.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "api_base")]
    pub api_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_budget: Option<WordBudget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_mode: Option<DispatchMode>,
    /// Default comma separated keywords.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_dir: Option<String>,
    /// Upload size limit in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "ProgressFileConfig::is_default")]
    #[prefer(default)]
    pub progress: ProgressFileConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers buzzscan config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("buzzscan").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await.unwrap_or_else(|e| {
                    tracing::warn!("{}", e);
                    Self::default()
                }),
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref url) = self.api_url {
            settings.api_url = normalize_base_url(url);
        }
        if let Some(secs) = self.request_timeout.filter(|s| *s > 0) {
            settings.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(ref ua) = self.user_agent {
            settings.user_agent = Some(ua.clone());
        }
        if let Some(budget) = self.word_budget {
            settings.word_budget = budget;
        }
        if let Some(mode) = self.dispatch_mode {
            settings.dispatch_mode = mode;
        }
        if let Some(ref keywords) = self.keywords {
            settings.keywords = KeywordSet::parse(keywords);
        }
        if let Some(ref dir) = self.blob_dir {
            settings.blob_dir = Some(self.resolve_path(dir, base_dir));
        }
        if let Some(mb) = self.max_file_size_mb.filter(|mb| *mb > 0) {
            settings.max_file_size = mb.saturating_mul(1024 * 1024);
        }
        settings.progress = self.progress.apply(settings.progress.clone());
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
}

/// First non-empty service URL among [`API_URL_ENV_VARS`].
pub fn api_url_from_env<F>(lookup: F) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    API_URL_ENV_VARS.iter().find_map(|name| {
        lookup(name)
            .filter(|v| !v.trim().is_empty())
            .map(|v| (*name, v))
    })
}

async fn load_file_config(options: &LoadOptions) -> Config {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return Config::load_from_path(config_path)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("{}", e);
                Config::default()
            });
    }

    // Priority 2: Auto-discover via prefer
    Config::load().await
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = load_file_config(&options).await;
    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    let mut settings = Settings::default();

    let base_dir = if options.use_cwd {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        config
            .base_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    };

    config.apply_to_settings(&mut settings, &base_dir);

    // Environment takes precedence over the config file
    if let Some((name, url)) = api_url_from_env(|name| std::env::var(name).ok()) {
        tracing::debug!("Using {} from environment: {}", name, url);
        settings.api_url = normalize_base_url(&url);
    }

    (settings, config)
}
