//! Application configuration.
//!
//! This module manages configuration with sensible defaults, loading from an
//! optional YAML file. Every numeric constant of the retry policy lives here
//! so it can be tuned per pipeline without a rebuild.

use crate::error::{Result, RetagError};
use crate::report::ReportOptions;
use crate::retry::RetryPolicy;
use config::{Config as ConfigRs, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(test)]
mod tests;

/// File name looked up under the user's config directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub retry: Retry,
}

impl Config {
    /// Parses a `Config` from a YAML string.
    ///
    /// This function is primarily used for testing.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from_str(s, FileFormat::Yaml));

        Self::from_builder(builder)
    }

    /// Loads a `Config` from an optional file path.
    ///
    /// When `path` is `None` the defaults are returned. A path that is given
    /// but cannot be read or parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults()?;

        if let Some(p) = path {
            builder = builder.add_source(File::from(p).format(FileFormat::Yaml).required(true));
        }

        Self::from_builder(builder).map_err(|e| match (e, path) {
            (RetagError::Config { message, source, .. }, Some(p)) => RetagError::Config {
                message,
                path: Some(p.display().to_string()),
                source,
            },
            (e, _) => e,
        })
    }

    /// Returns `<config_dir>/retag/config.yaml`, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("retag").join(CONFIG_FILE_NAME))
    }

    /// Builds the retry policy described by the `retry` section.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
        )
    }

    /// Builds reporter options from the `output` section.
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            digest_length: self.output.digest_length,
            timestamps: self.output.timestamps,
        }
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = ConfigRs::try_from(&Config::default()).map_err(|e| {
            RetagError::config_with_source("Failed to build default configuration", None, e)
        })?;
        Ok(ConfigRs::builder().add_source(defaults))
    }

    /// Creates a `Config` from a `config::ConfigBuilder`.
    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| {
                RetagError::config_with_source("Failed to deserialize configuration", None, e)
            })
    }
}

/// Output formatting settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Output {
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default)]
    pub color: ColorChoice,

    /// Hex characters kept when printing digests.
    #[serde(default = "default_digest_length")]
    pub digest_length: usize,

    #[serde(default)]
    pub timestamps: TimestampStyle,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            color: ColorChoice::default(),
            digest_length: default_digest_length(),
            timestamps: TimestampStyle::default(),
        }
    }
}

fn default_digest_length() -> usize {
    crate::digest::DEFAULT_SHORT_LEN
}

/// Enum for output formats.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,

    Json,

    Yaml,
}

/// Enum for color output choices.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    #[default]
    Auto,

    Always,

    Never,
}

/// How image creation times are rendered in reports.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimestampStyle {
    /// "3 hours ago"
    #[default]
    Relative,

    /// "2026-10-16T09:00:00Z"
    Absolute,

    /// "3 hours ago (2026-10-16T09:00:00Z)"
    Both,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    /// Per-request timeout in seconds.
    #[serde(default = "default_network_timeout")]
    pub timeout: u64,

    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    /// Registry hosts reached over plain HTTP.
    #[serde(default)]
    pub insecure_registries: Vec<String>,

    /// Platform whose config supplies the creation time of multi-arch images.
    #[serde(default = "default_platform")]
    pub platform: String,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            timeout: default_network_timeout(),
            max_idle_per_host: default_max_idle_per_host(),
            insecure_registries: Vec::new(),
            platform: default_platform(),
        }
    }
}

fn default_network_timeout() -> u64 {
    30
}

fn default_max_idle_per_host() -> usize {
    10
}

fn default_platform() -> String {
    "linux/amd64".to_string()
}

/// Retry settings for transient registry failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Retry {
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            base_delay_ms: default_retry_base_delay_ms(),
            max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

fn default_retry_max_attempts() -> u32 {
    4
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    8000
}
