//! Error types for retag operations.
//!
//! Registry failures are split three ways: "not found" (a normal answer for a
//! destination tag that does not exist yet), transient failures worth
//! retrying, and permanent failures that are not. [`RetagError::kind`] is the
//! single place where that split is made.

use std::time::Duration;
use thiserror::Error;


/// How a failure should be treated by callers and by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The registry answered that the resource does not exist.
    NotFound,
    /// Timeouts, connection failures, 5xx and rate limiting.
    Transient,
    /// Authentication, authorization, malformed responses and everything else.
    Permanent,
}

/// Main error type for retag operations
#[derive(Error, Debug)]
pub enum RetagError {
    /// Network-related errors (connection, timeout, DNS)
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Authentication errors (401, 403, token issues)
    #[error("Authentication error (status: {status_code:?}): {message}")]
    Authentication {
        message: String,
        status_code: Option<u16>,
    },

    /// Resource not found errors (404)
    #[error("{resource_type} not found: {name}")]
    NotFound { resource_type: String, name: String },

    /// Rate limiting errors (429)
    #[error("Rate limit: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<u64>,
    },

    /// Server errors (500, 502, 503, 504)
    #[error("Server error (status: {status_code}): {message}")]
    Server { message: String, status_code: u16 },

    /// Validation errors (unexpected status, malformed manifest, bad digest)
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (invalid config file, unreadable docker config)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The source image or the new tag could not be parsed.
    #[error("Invalid image reference '{input}': {message}")]
    InvalidReference { input: String, message: String },

    /// The source image does not exist on the registry.
    #[error("Source image '{reference}' not found")]
    SourceNotFound { reference: String },

    /// The source image could not be read for a reason other than "not found".
    #[error("Source image '{reference}' is inaccessible: {source}")]
    SourceUnavailable {
        reference: String,
        #[source]
        source: Box<RetagError>,
    },

    /// The destination tag could not be read for a reason other than "not found".
    #[error("Destination tag '{reference}' is inaccessible: {source}")]
    DestinationUnavailable {
        reference: String,
        #[source]
        source: Box<RetagError>,
    },

    /// The tag write failed. The tag may or may not have been updated.
    #[error(
        "Failed to point '{reference}' at {digest}: {source} (the tag's current state is unknown)"
    )]
    WriteFailed {
        reference: String,
        digest: String,
        #[source]
        source: Box<RetagError>,
    },

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for retag operations
pub type Result<T> = std::result::Result<T, RetagError>;

impl RetagError {
    /// Creates a new network error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::error::RetagError;
    ///
    /// let err = RetagError::network("connection refused");
    /// assert!(matches!(err, RetagError::Network { .. }));
    /// ```
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new network error with a source error.
    pub fn network_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new authentication error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::error::RetagError;
    ///
    /// let err = RetagError::authentication("invalid credentials", Some(401));
    /// assert!(matches!(err, RetagError::Authentication { .. }));
    /// ```
    pub fn authentication<S: Into<String>>(message: S, status_code: Option<u16>) -> Self {
        Self::Authentication {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a new not found error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::error::RetagError;
    ///
    /// let err = RetagError::not_found("manifest", "app:production");
    /// assert!(matches!(err, RetagError::NotFound { .. }));
    /// ```
    pub fn not_found<S: Into<String>>(resource_type: S, name: S) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Creates a new rate limit error.
    pub fn rate_limit<S: Into<String>>(message: S, retry_after: Option<u64>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new server error.
    pub fn server<S: Into<String>>(message: S, status_code: u16) -> Self {
        Self::Server {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a new validation error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::error::RetagError;
    ///
    /// let err = RetagError::validation("invalid manifest format");
    /// assert!(matches!(err, RetagError::Validation { .. }));
    /// ```
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new validation error with a source error.
    pub fn validation_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Validation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S, path: Option<S>) -> Self {
        Self::Config {
            message: message.into(),
            path: path.map(|p| p.into()),
            source: None,
        }
    }

    /// Creates a new configuration error with a source error.
    pub fn config_with_source<S, E>(message: S, path: Option<S>, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            path: path.map(|p| p.into()),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an invalid reference error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::error::RetagError;
    ///
    /// let err = RetagError::invalid_reference("UPPER/case", "repository must be lowercase");
    /// assert!(err.to_string().contains("UPPER/case"));
    /// ```
    pub fn invalid_reference<S: Into<String>, M: Into<String>>(input: S, message: M) -> Self {
        Self::InvalidReference {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Classifies this error for retry and reporting decisions.
    ///
    /// Orchestration errors carry their cause's classification, so a
    /// `SourceUnavailable` wrapping a timeout is still transient.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::error::{FailureKind, RetagError};
    ///
    /// assert_eq!(RetagError::server("bad gateway", 502).kind(), FailureKind::Transient);
    /// assert_eq!(RetagError::authentication("denied", Some(403)).kind(), FailureKind::Permanent);
    /// assert_eq!(RetagError::not_found("manifest", "app:prod").kind(), FailureKind::NotFound);
    /// ```
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Network { .. } | Self::RateLimit { .. } | Self::Server { .. } => {
                FailureKind::Transient
            }
            Self::SourceUnavailable { source, .. }
            | Self::DestinationUnavailable { source, .. }
            | Self::WriteFailed { source, .. } => source.kind(),
            Self::Authentication { .. }
            | Self::Validation { .. }
            | Self::Config { .. }
            | Self::InvalidReference { .. }
            | Self::SourceNotFound { .. }
            | Self::Cancelled => FailureKind::Permanent,
        }
    }

    /// Returns true if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }

    /// Returns true if the registry reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.kind() == FailureKind::NotFound
    }

    /// Returns true if this error, or the cause it wraps, is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::SourceUnavailable { source, .. }
            | Self::DestinationUnavailable { source, .. }
            | Self::WriteFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Returns the server-provided delay hint for rate limit errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit {
                retry_after: Some(seconds),
                ..
            } => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }
}
