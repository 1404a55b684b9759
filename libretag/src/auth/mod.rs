//! Authentication handling for OCI registries.
//!
//! Credentials are supplied by a [`CredentialProvider`] chosen by the caller.
//! This crate never stores credentials. It only reads them and turns them
//! into `Authorization` headers, including the Bearer token exchange
//! described by the distribution spec.

use crate::error::{Result, RetagError};
use std::collections::HashMap;

mod docker_config;

pub use docker_config::DockerConfigProvider;


/// Credentials for registry authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// No authentication required (anonymous access)
    Anonymous,

    /// HTTP Basic authentication with username and password
    Basic {
        /// Username for authentication
        username: String,
        /// Password for authentication
        password: String,
    },

    /// Bearer token authentication (OAuth2-style)
    Bearer {
        /// The bearer token
        token: String,
    },

    /// OAuth2 refresh token, exchanged for an access token at the realm.
    IdentityToken {
        token: String,
    },
}

impl Credentials {
    /// Creates anonymous credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::auth::Credentials;
    ///
    /// let creds = Credentials::anonymous();
    /// ```
    pub fn anonymous() -> Self {
        Self::Anonymous
    }

    /// Creates Basic authentication credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::auth::Credentials;
    ///
    /// let creds = Credentials::basic("username", "password");
    /// ```
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates Bearer token credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::auth::Credentials;
    ///
    /// let creds = Credentials::bearer("token123");
    /// ```
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Creates credentials from an identity (refresh) token.
    pub fn identity_token(token: impl Into<String>) -> Self {
        Self::IdentityToken {
            token: token.into(),
        }
    }

    /// Returns the Authorization header value for these credentials.
    ///
    /// Identity tokens have no header form; they are only usable at a
    /// token endpoint.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::auth::Credentials;
    ///
    /// let creds = Credentials::basic("user", "pass");
    /// let header = creds.to_header_value();
    /// assert!(header.is_some());
    /// ```
    pub fn to_header_value(&self) -> Option<String> {
        match self {
            Self::Anonymous => None,
            Self::Basic { username, password } => {
                use base64::{Engine as _, engine::general_purpose};
                let credentials = format!("{}:{}", username, password);
                let encoded = general_purpose::STANDARD.encode(credentials);
                Some(format!("Basic {}", encoded))
            }
            Self::Bearer { token } => Some(format!("Bearer {}", token)),
            Self::IdentityToken { .. } => None,
        }
    }
}

/// A parsed `WWW-Authenticate` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    /// `Bearer` or `Basic`
    pub scheme: String,
    /// Token endpoint for Bearer challenges, or a display name for Basic.
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl AuthChallenge {
    /// Parses a `WWW-Authenticate` header value.
    ///
    /// Quoted values may contain commas, as in a scope asking for
    /// `pull,push`.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::auth::AuthChallenge;
    ///
    /// let header = r#"Bearer realm="https://auth.example.com/token",service="registry",scope="repository:app:pull,push""#;
    /// let challenge = AuthChallenge::parse(header).unwrap();
    /// assert_eq!(challenge.scheme, "Bearer");
    /// assert_eq!(challenge.scope.as_deref(), Some("repository:app:pull,push"));
    /// ```
    pub fn parse(header: &str) -> Result<Self> {
        let (scheme, params) = header
            .trim()
            .split_once(' ')
            .ok_or_else(|| RetagError::validation("Invalid WWW-Authenticate header format"))?;

        let mut realm = None;
        let mut service = None;
        let mut scope = None;

        for (key, value) in split_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        let realm = realm.ok_or_else(|| {
            RetagError::validation("WWW-Authenticate header missing required 'realm' parameter")
        })?;

        Ok(Self {
            scheme: scheme.to_string(),
            realm,
            service,
            scope,
        })
    }

    pub fn is_bearer(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("bearer")
    }
}

/// Splits `key=value` pairs on commas that are outside double quotes.
fn split_params(params: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    let push = |raw: &str, pairs: &mut Vec<(String, String)>| {
        if let Some((key, value)) = raw.split_once('=') {
            pairs.push((
                key.trim().to_string(),
                value.trim().trim_matches('"').to_string(),
            ));
        }
    };

    for c in params.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                push(&current, &mut pairs);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push(&current, &mut pairs);

    pairs
}

/// Source of per-registry credentials.
pub trait CredentialProvider: Send + Sync {
    /// Returns the credentials for `registry` (a host, optionally with port).
    ///
    /// Returns [`Credentials::Anonymous`] when nothing is configured.
    fn credentials_for(&self, registry: &str) -> Result<Credentials>;
}

/// Provider that never supplies credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousProvider;

impl CredentialProvider for AnonymousProvider {
    fn credentials_for(&self, _registry: &str) -> Result<Credentials> {
        Ok(Credentials::Anonymous)
    }
}

/// Fixed credentials keyed by registry host.
///
/// # Examples
///
/// ```
/// use libretag::auth::{CredentialProvider, Credentials, StaticCredentials};
///
/// let provider = StaticCredentials::new().with("ghcr.io", Credentials::bearer("t0k3n"));
/// assert_eq!(provider.credentials_for("ghcr.io").unwrap(), Credentials::bearer("t0k3n"));
/// assert_eq!(provider.credentials_for("quay.io").unwrap(), Credentials::Anonymous);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    by_registry: HashMap<String, Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds credentials for `registry`.
    pub fn with(mut self, registry: impl Into<String>, credentials: Credentials) -> Self {
        self.by_registry
            .insert(normalize_registry(&registry.into()), credentials);
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn credentials_for(&self, registry: &str) -> Result<Credentials> {
        Ok(self
            .by_registry
            .get(&normalize_registry(registry))
            .cloned()
            .unwrap_or(Credentials::Anonymous))
    }
}

/// Reduces a registry key to a bare host.
///
/// Docker config files key Docker Hub as `https://index.docker.io/v1/`, while
/// references name it `docker.io`. All Docker Hub aliases map to `docker.io`.
pub(crate) fn normalize_registry(registry: &str) -> String {
    let host = registry
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = host.split('/').next().unwrap_or(host).to_lowercase();

    match host.as_str() {
        "index.docker.io" | "registry-1.docker.io" | "registry.hub.docker.com" => {
            "docker.io".to_string()
        }
        _ => host,
    }
}
