//! TOML Configuration File Support
//!
//! Configuration for splitters and the demo runner, loaded from
//! `~/.config/tuplesplit/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are applied with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [splitter]
//! name = "features"
//! trace_rounds = true
//!
//! [demo]
//! rounds = 5
//! source_interval_ms = 1000
//! branch_delays_ms = [2000, 1000]
//! ```
//!
//! # Environment Variables
//!
//! - `TUPLESPLIT_NAME`: splitter name used in logs
//! - `TUPLESPLIT_TRACE_ROUNDS`: "1"/"true" to log every delivered round
//! - `TUPLESPLIT_ROUNDS`: number of demo rounds
//! - `TUPLESPLIT_INTERVAL_MS`: demo source interval in milliseconds

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Splitter section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterToml {
    /// Name used in log fields
    pub name: Option<String>,

    /// Log every delivered round at debug level
    pub trace_rounds: Option<bool>,
}

/// Demo section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoToml {
    /// Number of tuples the demo source produces
    pub rounds: Option<u64>,

    /// Delay between demo tuples in milliseconds
    pub source_interval_ms: Option<u64>,

    /// Per-branch consumer delay in milliseconds
    pub branch_delays_ms: Option<Vec<u64>>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TupleSplitToml {
    /// Splitter configuration section
    pub splitter: SplitterToml,

    /// Demo configuration section
    pub demo: DemoToml,
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Settings for one splitter instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Name attached to the driver's log events
    pub name: String,
    /// Whether to log each delivered round
    pub trace_rounds: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            name: "splitter".to_string(),
            trace_rounds: false,
        }
    }
}

impl SplitterConfig {
    /// Set the splitter name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enable or disable per-round logging
    #[must_use]
    pub fn with_trace_rounds(mut self, trace_rounds: bool) -> Self {
        self.trace_rounds = trace_rounds;
        self
    }
}

/// Settings for the demo runner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoConfig {
    /// Number of tuples produced before the source ends
    pub rounds: u64,
    /// Delay between tuples
    pub source_interval: Duration,
    /// Consumer delay per branch; missing entries use the last one
    pub branch_delays: Vec<Duration>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            rounds: 5,
            source_interval: Duration::from_millis(1000),
            branch_delays: vec![Duration::from_millis(2000), Duration::from_millis(1000)],
        }
    }
}

impl DemoConfig {
    /// Consumer delay for branch `index`
    #[must_use]
    pub fn delay_for(&self, index: usize) -> Duration {
        self.branch_delays
            .get(index)
            .or_else(|| self.branch_delays.last())
            .copied()
            .unwrap_or_default()
    }
}

/// Fully resolved configuration
#[derive(Clone, Debug)]
pub struct TupleSplitConfig {
    /// Splitter settings
    pub splitter: SplitterConfig,

    /// Demo settings
    pub demo: DemoConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for TupleSplitConfig {
    fn default() -> Self {
        Self {
            splitter: SplitterConfig::default(),
            demo: DemoConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl TupleSplitConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that would make the splitter or demo unusable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.splitter.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "splitter.name must not be empty".to_string(),
            ));
        }
        if self.demo.rounds == 0 {
            return Err(ConfigError::ValidationError(
                "demo.rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/tuplesplit/config.toml` or
/// `~/.config/tuplesplit/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tuplesplit").join("config.toml"))
}

/// Load configuration from the default path, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed.
/// A missing file is not an error. Values are not validated here; call
/// [`TupleSplitConfig::validate`] once CLI overrides have been applied.
pub fn load_config() -> Result<TupleSplitConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
/// Values are not validated here, since CLI overrides may still replace them.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<TupleSplitConfig, ConfigError> {
    let mut config = TupleSplitConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: TupleSplitToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut TupleSplitConfig, toml: &TupleSplitToml) {
    if let Some(ref name) = toml.splitter.name {
        config.splitter.name.clone_from(name);
    }
    if let Some(trace) = toml.splitter.trace_rounds {
        config.splitter.trace_rounds = trace;
    }

    if let Some(rounds) = toml.demo.rounds {
        config.demo.rounds = rounds;
    }
    if let Some(ms) = toml.demo.source_interval_ms {
        config.demo.source_interval = Duration::from_millis(ms);
    }
    if let Some(ref delays) = toml.demo.branch_delays_ms {
        config.demo.branch_delays = delays.iter().copied().map(Duration::from_millis).collect();
    }
}

/// Apply environment overrides, reading variables through `lookup`
fn apply_env_config<F>(config: &mut TupleSplitConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(name) = lookup("TUPLESPLIT_NAME") {
        config.splitter.name = name;
        config.source = ConfigSource::Env;
    }
    if let Some(trace) = lookup("TUPLESPLIT_TRACE_ROUNDS") {
        config.splitter.trace_rounds = trace == "1" || trace.to_lowercase() == "true";
        config.source = ConfigSource::Env;
    }
    if let Some(rounds) = lookup("TUPLESPLIT_ROUNDS") {
        if let Ok(n) = rounds.parse::<u64>() {
            config.demo.rounds = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(interval) = lookup("TUPLESPLIT_INTERVAL_MS") {
        if let Ok(ms) = interval.parse::<u64>() {
            config.demo.source_interval = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Splitter name override
    pub name: Option<String>,

    /// Per-round logging override
    pub trace_rounds: Option<bool>,

    /// Demo round count override
    pub rounds: Option<u64>,

    /// Demo source interval override (milliseconds)
    pub interval_ms: Option<u64>,

    /// Demo per-branch delay override (milliseconds)
    pub branch_delays_ms: Option<Vec<u64>>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set splitter name override
    #[must_use]
    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Set per-round logging override
    #[must_use]
    pub fn with_trace_rounds(mut self, trace: bool) -> Self {
        self.trace_rounds = Some(trace);
        self
    }

    /// Set demo round count override
    #[must_use]
    pub fn with_rounds(mut self, rounds: u64) -> Self {
        self.rounds = Some(rounds);
        self
    }

    /// Set demo source interval override
    #[must_use]
    pub fn with_interval_ms(mut self, ms: u64) -> Self {
        self.interval_ms = Some(ms);
        self
    }

    /// Set demo per-branch delay override
    #[must_use]
    pub fn with_branch_delays_ms(mut self, delays: Vec<u64>) -> Self {
        self.branch_delays_ms = Some(delays);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut TupleSplitConfig) {
        if self.name.is_some()
            || self.trace_rounds.is_some()
            || self.rounds.is_some()
            || self.interval_ms.is_some()
            || self.branch_delays_ms.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref name) = self.name {
            config.splitter.name.clone_from(name);
        }
        if let Some(trace) = self.trace_rounds {
            config.splitter.trace_rounds = trace;
        }
        if let Some(rounds) = self.rounds {
            config.demo.rounds = rounds;
        }
        if let Some(ms) = self.interval_ms {
            config.demo.source_interval = Duration::from_millis(ms);
        }
        if let Some(ref delays) = self.branch_delays_ms {
            config.demo.branch_delays = delays.iter().copied().map(Duration::from_millis).collect();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
