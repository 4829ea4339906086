//! Bootstrap configuration loading and root folder resolution
//!
//! Configuration is two-tier:
//! 1. **TOML bootstrap**: root folder, listen address, logging, completion
//!    service and evaluation settings (read once at startup)
//! 2. **Database runtime**: values in the `settings` table (shared secret,
//!    lock wait limits), owned by each service
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`AETH_ROOT_FOLDER`)
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is not fatal: the service logs a warning and starts
//! with built-in defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "AETH_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "aetheliz.db";

/// Default Gemini text-generation endpoint
pub const DEFAULT_COMPLETION_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent";

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime. The service must restart
/// to pick up changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the SQLite database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Text-generation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Full URL of the generateContent endpoint
    #[serde(default = "default_completion_endpoint")]
    pub endpoint: String,

    /// API key (the `AETH_COMPLETION_API_KEY` environment variable wins)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Token bucket refill rate for outbound calls
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

/// Evaluation pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Maximum number of free-text judgments in flight at once
    #[serde(default = "default_judgment_concurrency")]
    pub judgment_concurrency: usize,

    /// Education stage used when a session request does not name one
    #[serde(default = "default_education_stage")]
    pub default_education_stage: String,
}

fn default_port() -> u16 {
    5740
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_completion_endpoint() -> String {
    DEFAULT_COMPLETION_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_requests_per_second() -> u32 {
    4
}

fn default_judgment_concurrency() -> usize {
    4
}

fn default_education_stage() -> String {
    "Undergraduate".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            bind_address: default_bind_address(),
            logging: LoggingConfig::default(),
            completion: CompletionConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_completion_endpoint(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            judgment_concurrency: default_judgment_concurrency(),
            default_education_stage: default_education_stage(),
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Default per-module config file location (`~/.config/aetheliz/<module>.toml`)
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("aetheliz").join(format!("{}.toml", module_name)))
}

/// Load bootstrap configuration with graceful degradation
///
/// An explicitly requested file must exist and parse. When no file is named,
/// the default location is tried and a missing file falls back to defaults.
pub fn load_or_default(explicit: Option<&Path>, module_name: &str) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }

    match default_config_path(module_name) {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            load_toml_config(&path)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("aetheliz"))
        .unwrap_or_else(|| PathBuf::from("./aetheliz_data"))
}

/// Resolves the root folder using CLI → ENV → TOML → default priority
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!(module = %self.module_name, "Root folder from TOML config");
            return path.clone();
        }

        default_root_folder()
    }
}

/// Creates the root folder and locates the database inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }
}
