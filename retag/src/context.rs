//! Application context that holds resolved configuration
//!
//! The context is built following the precedence order:
//! 1. Default values
//! 2. Config file values
//! 3. Environment variables
//! 4. CLI flags
//!
//! Once built, the context is passed as read-only throughout the application.

use libretag::Result;
use libretag::config::{ColorChoice, Config, OutputFormat};
use libretag::error::RetagError;
use std::path::{Path, PathBuf};

/// Flags from the command line that override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub color: Option<ColorChoice>,
    pub format: Option<OutputFormat>,
    pub verbosity: VerbosityLevel,
}

/// Application context with resolved configuration and runtime state
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Resolved configuration
    pub config: Config,
    /// File the configuration was read from, if any
    pub config_path: Option<PathBuf>,
    pub verbosity: VerbosityLevel,
}

impl AppContext {
    /// Build context with precedence: defaults > config file > env vars > CLI flags
    pub fn build(cli: CliOverrides) -> Result<Self> {
        Self::build_with(cli, |key| std::env::var(key).ok(), Config::default_path())
    }

    /// Same as [`AppContext::build`], with the environment and the default
    /// config path supplied by the caller.
    pub fn build_with<F>(cli: CliOverrides, env: F, default_path: Option<PathBuf>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // An explicit path must exist, the default one is optional
        let config_path = cli
            .config_path
            .or_else(|| env("RETAG_CONFIG").map(PathBuf::from))
            .or_else(|| default_path.filter(|p| p.is_file()));

        let mut config = Config::load(config_path.as_deref())?;

        if let Some(color) = env("RETAG_COLOR") {
            config.output.color = crate::format::parse_color(&color);
        }
        if let Some(attempts) = env("RETAG_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse_env("RETAG_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(timeout) = env("RETAG_TIMEOUT") {
            config.network.timeout = parse_env("RETAG_TIMEOUT", &timeout)?;
        }

        if let Some(color) = cli.color {
            config.output.color = color;
        }
        if let Some(format) = cli.format {
            config.output.format = format;
        }

        Ok(Self {
            config,
            config_path,
            verbosity: cli.verbosity,
        })
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        RetagError::config(
            format!("Invalid value '{}' for {}", value, key),
            None::<String>,
        )
    })
}

/// How much the CLI logs to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerbosityLevel {
    /// Warnings only
    #[default]
    Quiet,
    /// -v
    Info,
    /// -vv
    Debug,
    /// -vvv and above
    Trace,
}

impl VerbosityLevel {
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Self::Quiet,
            1 => Self::Info,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// Directive for `tracing_subscriber::EnvFilter`.
    ///
    /// Dependencies stay at `warn` so `-vv` shows registry calls rather than
    /// connection pool chatter.
    pub fn filter_directive(&self) -> String {
        let level = match self {
            Self::Quiet => return "warn".to_string(),
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        format!("warn,libretag={level},docker_retag={level}")
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
