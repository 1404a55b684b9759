//! OCI content digest validation and manipulation.
//!
//! This module provides a wrapper around the `oci_spec::image::Digest` type
//! to integrate with retag's error handling. Digests are the only thing the
//! retag decision ever compares.

use crate::error::{Result, RetagError};
use oci_spec::image::Digest as OciDigest;
use serde::{Serialize, Serializer};
use sha2::{Digest as Sha2Digest, Sha256};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
mod tests;

/// Default number of hex characters kept by [`Digest::short`].
pub const DEFAULT_SHORT_LEN: usize = 12;

/// Represents a content digest, wrapping the `oci_spec::image::Digest` type.
///
/// Equality is equality of the canonical `algorithm:hex` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest(OciDigest);

impl FromStr for Digest {
    type Err = RetagError;

    fn from_str(s: &str) -> Result<Self> {
        let oci_digest = OciDigest::from_str(s.trim()).map_err(|e| RetagError::Validation {
            message: format!("Invalid digest format: {}", e),
            source: Some(Box::new(e)),
        })?;
        Ok(Digest(oci_digest))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Digest {
    /// Computes the sha256 digest of raw content.
    ///
    /// Used when a registry omits the `Docker-Content-Digest` header.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::Digest;
    ///
    /// let digest = Digest::sha256_of(b"").unwrap();
    /// assert_eq!(
    ///     digest.to_string(),
    ///     "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    /// );
    /// ```
    pub fn sha256_of(bytes: &[u8]) -> Result<Self> {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self::from_str(&format!("sha256:{:x}", hasher.finalize()))
    }

    /// Returns the algorithm part of the digest (e.g. `sha256`).
    pub fn algorithm(&self) -> String {
        self.to_string()
            .split_once(':')
            .map(|(algorithm, _)| algorithm.to_string())
            .unwrap_or_default()
    }

    /// Returns the encoded hash part of the digest.
    pub fn hex(&self) -> String {
        self.to_string()
            .split_once(':')
            .map(|(_, hex)| hex.to_string())
            .unwrap_or_default()
    }

    /// Renders the digest with its hash truncated to `len` characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::Digest;
    ///
    /// let digest: Digest =
    ///     "sha256:7173b809ca12ec5dee4506cd86be934c4596dd234ee82c0662eac04a8c2c71dc"
    ///         .parse()
    ///         .unwrap();
    /// assert_eq!(digest.short(12), "sha256:7173b809ca12");
    /// ```
    pub fn short(&self, len: usize) -> String {
        let hex = self.hex();
        let end = hex
            .char_indices()
            .nth(len)
            .map(|(index, _)| index)
            .unwrap_or(hex.len());
        format!("{}:{}", self.algorithm(), &hex[..end])
    }
}
