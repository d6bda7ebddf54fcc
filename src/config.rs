//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - weaver.toml (default configuration)
//! - weaver.local.toml (git-ignored local overrides)
//! - Environment variables (WEAVER_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # weaver.toml
//! [display]
//! default_palette = "Pastel1_8"
//! default_aggregation = "sum"
//!
//! [output]
//! gzip = false
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! WEAVER_DISPLAY__DEFAULT_PALETTE=Set1_9
//! WEAVER_OUTPUT__GZIP=true
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Main configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaverConfig {
    #[serde(default)]
    pub display: DisplayDefaults,
    #[serde(default)]
    pub output: OutputDefaults,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults used when a definition or CLI flag doesn't name one explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayDefaults {
    /// Palette name used when a categorical or quantitative color spec
    /// doesn't name one (`crate::color::DEFAULT_CATEGORICAL_PALETTE` /
    /// `DEFAULT_SEQUENTIAL_PALETTE` are the hard-coded fallbacks if this is
    /// also absent).
    #[serde(default = "default_palette")]
    pub default_palette: String,

    /// Aggregation applied to a measure column when the definition doesn't
    /// specify one.
    #[serde(default = "default_aggregation")]
    pub default_aggregation: String,
}

/// Output-writing defaults for the CLI (s6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDefaults {
    /// Gzip the written spec JSON unless overridden by `--gzip`/`--no-gzip`.
    #[serde(default)]
    pub gzip: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` still wins
    /// if set, per `tracing_subscriber::EnvFilter` convention.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_palette() -> String {
    crate::color::DEFAULT_CATEGORICAL_PALETTE.to_string()
}

fn default_aggregation() -> String {
    "sum".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DisplayDefaults {
    fn default() -> Self {
        DisplayDefaults {
            default_palette: default_palette(),
            default_aggregation: default_aggregation(),
        }
    }
}

impl Default for OutputDefaults {
    fn default() -> Self {
        OutputDefaults { gzip: false }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

impl Default for WeaverConfig {
    fn default() -> Self {
        WeaverConfig {
            display: DisplayDefaults::default(),
            output: OutputDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl WeaverConfig {
    /// Load configuration from default locations.
    ///
    /// Merges in order:
    /// 1. weaver.toml (base configuration)
    /// 2. weaver.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (WEAVER_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("weaver.toml"))
            .merge(Toml::file("weaver.local.toml"))
            .merge(Env::prefixed("WEAVER_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("WEAVER_").split("__"))
            .extract()
    }
}
