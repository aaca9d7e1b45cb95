//! Layered configuration for the symbol browser.
//!
//! Sources, later ones winning:
//! - built-in defaults
//! - `.classview/settings.toml`, searched from the current directory upwards
//! - environment variables
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CV_` and use double underscores
//! to separate nested levels:
//! - `CV_BATCHING__MINIMAL_DELAY_MS=100` sets `batching.minimal_delay_ms`
//! - `CV_BROWSER__LAZY_NAMESPACES=false` sets `browser.lazy_namespaces`
//! - `CV_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = ".classview";
const CONFIG_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Timing policy of the batching worker
    #[serde(default)]
    pub batching: BatchingConfig,

    /// What the tree shows and how it expands
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for all modules: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `worker = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BatchingConfig {
    /// Pause after a lone event before looking for more
    #[serde(default = "default_minimal_delay_ms")]
    pub minimal_delay_ms: u64,

    /// Pause between rounds while a burst keeps arriving
    #[serde(default = "default_batch_mode_delay_ms")]
    pub batch_mode_delay_ms: u64,

    /// Merged event count at which the worker stops waiting for more
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Upper bound on batch-mode pauses per batch
    #[serde(default = "default_max_batch_wait_rounds")]
    pub max_batch_wait_rounds: u32,

    /// Pause while the user interacts with the tree
    #[serde(default = "default_user_activity_backoff_ms")]
    pub user_activity_backoff_ms: u64,
}

impl BatchingConfig {
    pub fn minimal_delay(&self) -> Duration {
        Duration::from_millis(self.minimal_delay_ms)
    }

    pub fn batch_mode_delay(&self) -> Duration {
        Duration::from_millis(self.batch_mode_delay_ms)
    }

    pub fn user_activity_backoff(&self) -> Duration {
        Duration::from_millis(self.user_activity_backoff_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BrowserConfig {
    /// Expand namespaces through a "loading" placeholder and a background pass
    #[serde(default = "default_true")]
    pub lazy_namespaces: bool,

    /// Show a marker under projects that are still being parsed
    #[serde(default = "default_true")]
    pub show_unstable_projects: bool,

    /// Show the "project libraries" folder
    #[serde(default = "default_true")]
    pub show_libraries: bool,
}

fn default_version() -> u32 {
    1
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_minimal_delay_ms() -> u64 {
    500
}
fn default_batch_mode_delay_ms() -> u64 {
    1000
}
fn default_max_batch_size() -> usize {
    50
}
fn default_max_batch_wait_rounds() -> u32 {
    10
}
fn default_user_activity_backoff_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            logging: LoggingConfig::default(),
            batching: BatchingConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            minimal_delay_ms: default_minimal_delay_ms(),
            batch_mode_delay_ms: default_batch_mode_delay_ms(),
            max_batch_size: default_max_batch_size(),
            max_batch_wait_rounds: default_max_batch_wait_rounds(),
            user_activity_backoff_ms: default_user_activity_backoff_ms(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            lazy_namespaces: true,
            show_unstable_projects: true,
            show_libraries: true,
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            // Double underscore separates nested levels, single underscore
            // stays part of the field name
            .merge(Env::prefixed("CV_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find `.classview/settings.toml` from the current directory upwards
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join(CONFIG_FILE));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Write a default settings file below `root`
    pub fn init_config_file(
        root: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}
