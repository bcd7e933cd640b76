//! Configuration loading and root folder resolution
//!
//! Settings come from three places, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//!
//! Anything left unset falls back to a compiled default. A missing TOML file
//! is not an error: the service starts on defaults and logs a warning.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "SALESMIND_ROOT";

/// Default HTTP bind address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "salesmind.db";

/// Upload directory name inside the root folder
pub const UPLOADS_DIR: &str = "uploads";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and uploaded audio
    pub root_folder: Option<String>,

    /// HTTP bind address (host:port)
    pub bind_address: Option<String>,

    /// Credential for the generative-AI provider
    pub gemini_api_key: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (e.g. "info", "salesmind_api=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[processing]` section: background pipeline and AI provider timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum pipeline runs executing at once
    pub max_concurrent_jobs: usize,
    /// Seconds between file-readiness polls
    pub poll_interval_secs: u64,
    /// Poll attempts before giving up on an uploaded file
    pub max_poll_attempts: u32,
    /// Per-call timeout for provider requests
    pub request_timeout_secs: u64,
    /// TCP connect timeout for provider requests
    pub connect_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 16,
            poll_interval_secs: 5,
            max_poll_attempts: 60,
            request_timeout_secs: 300,
            connect_timeout_secs: 30,
        }
    }
}

/// `[cache]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached feedback lookup
    pub feedback_ttl_secs: u64,
    /// Interval of the background eviction sweep
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            feedback_ttl_secs: 15 * 60,
            sweep_interval_secs: 60,
        }
    }
}

/// `[storage]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Uploaded audio older than this is pruned
    pub retention_days: u64,
    /// Interval between cleanup passes
    pub cleanup_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            cleanup_interval_secs: 24 * 60 * 60,
        }
    }
}

impl StorageConfig {
    /// Retention window, saturating for absurdly large day counts
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(24 * 60 * 60))
    }

    /// Cleanup period, never zero
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

/// Platform config file location (`~/.config/salesmind/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("salesmind").join("config.toml"))
}

/// Load a TOML config file
///
/// A missing file yields the defaults; a file that exists but does not
/// parse is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Root folder resolution
pub struct RootFolderResolver<'a> {
    cli_arg: Option<&'a str>,
    toml_config: &'a TomlConfig,
}

impl<'a> RootFolderResolver<'a> {
    pub fn new(cli_arg: Option<&'a str>, toml_config: &'a TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_config,
        }
    }

    /// Resolve using CLI → ENV → TOML → compiled default
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = self.cli_arg.filter(|p| !p.trim().is_empty()) {
            return PathBuf::from(path);
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = self.toml_config.root_folder.as_deref() {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        default_root_folder()
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("salesmind"))
        .unwrap_or_else(|| PathBuf::from("./salesmind_data"))
}

/// Creates the root folder layout on first start
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root and upload directories if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.uploads_path())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }
}
