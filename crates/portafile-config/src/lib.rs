//! # portafile-config
//!
//! Configuration management for portafile.
//!
//! Loads configuration from:
//! 1. `~/.portafile/config.toml` (global)
//! 2. `.portafile/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)
//!
//! The core library never reads this implicitly. Hosts load a [`Config`]
//! once at startup and build a `portafile::Context` from it.

pub mod logging;
pub mod testing;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

pub use logging::{init_logging, Component, LogLevel};

/// MIME type used when a capability child is materialized without one.
pub const DEFAULT_MIME_TYPE: &str = "*/*";

/// URI scheme served by capability providers unless configured otherwise.
pub const DEFAULT_CAPABILITY_SCHEME: &str = "content";

/// Global config instance (CLI convenience, never consulted by the core)
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> std::sync::RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML render error: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub resolver: ResolverConfig,
    pub capability: CapabilityConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(
            Self::global_config_path().as_deref(),
            Path::new(".portafile/config.toml"),
        )
    }

    /// Load from explicit global/project files; missing files are skipped.
    pub fn load_from(global: Option<&Path>, project: &Path) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = global {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(global_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        if project.exists() {
            debug!("Loading project config from {:?}", project);
            let contents = std::fs::read_to_string(project)?;
            let project_config: Config = toml::from_str(&contents)?;
            config.merge(project_config);
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Global config path: ~/.portafile/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".portafile/config.toml"))
    }

    /// Merge another config (project overrides)
    fn merge(&mut self, other: Config) {
        let defaults = Config::default();
        if other.logging.level != defaults.logging.level {
            self.logging.level = other.logging.level;
        }
        if other.resolver != defaults.resolver {
            self.resolver = other.resolver;
        }
        if other.capability.default_mime_type != defaults.capability.default_mime_type {
            self.capability.default_mime_type = other.capability.default_mime_type;
        }
        // Project roots extend the global grant list; same authority wins locally.
        self.capability.roots.extend(other.capability.roots);
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("PORTAFILE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(mime) = std::env::var("PORTAFILE_DEFAULT_MIME") {
            self.capability.default_mime_type = mime;
        }
        if let Ok(scheme) = std::env::var("PORTAFILE_CAPABILITY_SCHEME") {
            self.resolver.capability_scheme = scheme;
        }
    }

    /// Capability roots with `~/` expanded against the home directory.
    pub fn capability_roots(&self) -> Vec<(String, PathBuf)> {
        self.capability
            .roots
            .iter()
            .map(|(authority, root)| (authority.clone(), expand_home(root)))
            .collect()
    }

    /// Configured log level, falling back to `warn` for unknown names.
    pub fn log_level(&self) -> LogLevel {
        self.logging.level.parse().unwrap_or(LogLevel::Warn)
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Config::default().to_toml()
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// error, warn, info, debug or trace
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Path/URI resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Register capability providers at all (false = path-only platform)
    pub enable_capabilities: bool,
    /// Scheme the directory-backed provider answers to
    pub capability_scheme: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enable_capabilities: true,
            capability_scheme: DEFAULT_CAPABILITY_SCHEME.to_string(),
        }
    }
}

/// Capability-addressed document access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    /// MIME type for children created without an explicit type
    pub default_mime_type: String,
    /// Granted roots: authority -> directory
    pub roots: BTreeMap<String, PathBuf>,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            default_mime_type: DEFAULT_MIME_TYPE.to_string(),
            roots: BTreeMap::new(),
        }
    }
}
