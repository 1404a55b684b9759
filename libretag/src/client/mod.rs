//! HTTP client for OCI registry communication.
//!
//! A thin client built on reqwest that speaks the parts of the OCI
//! Distribution v2 API a retag needs: manifest and config blob reads, and a
//! manifest `PUT` under a new tag. One `Client` serves any number of
//! registries; the registry is taken from each reference.

use crate::auth::{AuthChallenge, CredentialProvider, Credentials};
use crate::config::Config;
use crate::digest::Digest;
use crate::error::{Result, RetagError};
use crate::oci::{self, DEFAULT_MANIFEST_MEDIA_TYPE, MANIFEST_ACCEPT, ManifestOrIndex};
use crate::reference::Reference;
use crate::registry::{ImageMetadata, RegistryTransport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, RETRY_AFTER, WWW_AUTHENTICATE};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;


/// Host that serves the registry API for `docker.io` references.
const DOCKER_HUB_API_HOST: &str = "registry-1.docker.io";

/// Client id sent with OAuth2 refresh token grants.
const OAUTH_CLIENT_ID: &str = "docker-retag";

/// Response from a token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Configuration for the HTTP client.
///
/// # Examples
///
/// ```
/// use libretag::client::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_timeout(60)
///     .with_insecure_registry("registry.internal:5000");
/// assert_eq!(config.timeout_seconds, 60);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
    /// Maximum idle connections per host (default: 10)
    pub max_idle_per_host: usize,
    /// Hosts reached over plain HTTP.
    pub insecure_registries: Vec<String>,
    /// `os/arch` whose config supplies `created` for multi-arch images.
    pub platform: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            timeout_seconds: config.network.timeout,
            max_idle_per_host: config.network.max_idle_per_host,
            insecure_registries: config.network.insecure_registries.clone(),
            platform: config.network.platform.clone(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout in seconds.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the maximum idle connections per host.
    pub fn with_max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }

    /// Marks `host` as reachable over plain HTTP.
    pub fn with_insecure_registry(mut self, host: impl Into<String>) -> Self {
        self.insecure_registries.push(host.into());
        self
    }

    /// Sets the platform used to pick a child of a multi-arch index.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }
}

/// Tokens and challenges learned from registries during this client's life.
#[derive(Debug, Default)]
struct AuthCache {
    /// Last Bearer challenge seen per registry host.
    challenges: HashMap<String, AuthChallenge>,
    /// Tokens keyed by `(realm, service, scope)`.
    tokens: HashMap<(String, String, String), String>,
}

/// HTTP client for OCI registry operations.
///
/// Clones share the connection pool and the token cache.
#[derive(Clone)]
pub struct Client {
    http_client: ReqwestClient,
    config: ClientConfig,
    credentials: Arc<dyn CredentialProvider>,
    auth: Arc<Mutex<AuthCache>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new client.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::auth::AnonymousProvider;
    /// use libretag::client::{Client, ClientConfig};
    /// use std::sync::Arc;
    ///
    /// let client = Client::new(ClientConfig::new(), Arc::new(AnonymousProvider)).unwrap();
    /// assert_eq!(client.base_url("docker.io"), "https://registry-1.docker.io");
    /// ```
    pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .user_agent(concat!("docker-retag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RetagError::network_with_source("Failed to create HTTP client", e))?;

        Ok(Self {
            http_client,
            config,
            credentials,
            auth: Arc::new(Mutex::new(AuthCache::default())),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the API base URL for a registry host.
    ///
    /// Loopback hosts and configured insecure hosts use `http`.
    pub fn base_url(&self, registry: &str) -> String {
        if registry == "docker.io" || registry == "index.docker.io" {
            return format!("https://{}", DOCKER_HUB_API_HOST);
        }

        let insecure = is_loopback(registry)
            || self
                .config
                .insecure_registries
                .iter()
                .any(|h| h.eq_ignore_ascii_case(registry));

        if insecure {
            format!("http://{}", registry)
        } else {
            format!("https://{}", registry)
        }
    }

    fn manifest_url(&self, reference: &Reference, manifest_ref: &str) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.base_url(reference.registry()),
            reference.repository(),
            manifest_ref
        )
    }

    /// Fetches raw manifest bytes, the manifest digest and its content type.
    ///
    /// The digest comes from `Docker-Content-Digest`, or is computed from the
    /// body when the registry omits the header.
    pub async fn fetch_manifest(
        &self,
        reference: &Reference,
        manifest_ref: &str,
    ) -> Result<(Vec<u8>, Digest, Option<String>)> {
        let url = self.manifest_url(reference, manifest_ref);

        let response = self
            .execute(reference, || {
                self.http_client.get(&url).header(ACCEPT, MANIFEST_ACCEPT)
            })
            .await?;
        let response =
            Self::check_response_status(response, "manifest", &reference.to_string()).await?;

        let header_digest = response
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(';').next().unwrap_or(s).trim().to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RetagError::network_with_source("Failed to read manifest response", e))?;

        let digest = match header_digest {
            Some(d) => Digest::from_str(&d)?,
            None => Digest::sha256_of(&bytes)?,
        };

        Ok((bytes.to_vec(), digest, content_type))
    }

    /// Fetches a blob and verifies it against `digest`.
    ///
    /// Redirects to storage backends are followed by reqwest.
    pub async fn fetch_blob(&self, reference: &Reference, digest: &Digest) -> Result<Vec<u8>> {
        let url = format!(
            "{}/v2/{}/blobs/{}",
            self.base_url(reference.registry()),
            reference.repository(),
            digest
        );

        let response = self.execute(reference, || self.http_client.get(&url)).await?;
        let response = Self::check_response_status(response, "blob", &digest.to_string()).await?;

        let blob_bytes = response
            .bytes()
            .await
            .map_err(|e| RetagError::network_with_source("Failed to read blob response", e))?;

        if digest.algorithm() != "sha256" {
            return Err(RetagError::validation(format!(
                "Unsupported digest algorithm: {}. Only sha256 is currently supported",
                digest.algorithm()
            )));
        }

        let computed = Digest::sha256_of(&blob_bytes)?;
        if computed != *digest {
            return Err(RetagError::validation(format!(
                "Blob digest mismatch: expected {}, computed {}",
                digest, computed
            )));
        }

        Ok(blob_bytes.to_vec())
    }

    /// Reads the config blob of a single-platform manifest for `created`.
    ///
    /// A missing config blob or child manifest means the image is broken,
    /// not that the reference does not exist.
    async fn created_of(
        &self,
        reference: &Reference,
        parsed: &ManifestOrIndex,
    ) -> Result<Option<DateTime<Utc>>> {
        let manifest = match parsed {
            ManifestOrIndex::Manifest(_) => None,
            ManifestOrIndex::Index(_) => {
                let Some(child) = parsed.select_child(&self.config.platform) else {
                    tracing::debug!(reference = %reference, "index has no manifests");
                    return Ok(None);
                };
                let child_digest = child.digest().to_string();
                tracing::debug!(
                    reference = %reference,
                    platform = %self.config.platform,
                    child = %child_digest,
                    "reading created time from index child"
                );
                let (bytes, _, _) = self
                    .fetch_manifest(reference, &child_digest)
                    .await
                    .map_err(|e| missing_is_invalid(e, "index child manifest", &child_digest))?;
                Some(ManifestOrIndex::from_bytes(&bytes)?)
            }
        };

        let Some(config_digest) = manifest.as_ref().unwrap_or(parsed).config_digest()? else {
            return Err(RetagError::validation(format!(
                "Index child of {} is itself an index",
                reference
            )));
        };

        let blob = self
            .fetch_blob(reference, &config_digest)
            .await
            .map_err(|e| missing_is_invalid(e, "config blob", &config_digest.to_string()))?;

        oci::created_from_config(&blob)
    }

    /// Sends the request built by `build`, answering one auth challenge.
    ///
    /// `build` is called again for the retry, so it must not consume state.
    async fn execute<F>(&self, reference: &Reference, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let registry = reference.registry();
        let credentials = self.credentials.credentials_for(registry)?;
        let scope = scope_for(reference);

        let authorization = match self.cached_token(registry, &scope).await {
            Some(token) => Some(format!("Bearer {}", token)),
            None => credentials.to_header_value(),
        };

        let response = self.send(build(), authorization.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(challenge) = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| AuthChallenge::parse(h).ok())
            .filter(AuthChallenge::is_bearer)
        else {
            return Ok(response);
        };

        tracing::debug!(registry, realm = %challenge.realm, scope = %scope, "requesting token");
        let token = self.fetch_token(&challenge, &credentials, &scope).await?;

        {
            let mut auth = self.auth.lock().await;
            auth.tokens
                .insert(token_key(&challenge, &scope), token.clone());
            auth.challenges.insert(registry.to_string(), challenge);
        }

        self.send(build(), Some(&format!("Bearer {}", token))).await
    }

    async fn send(&self, request: RequestBuilder, authorization: Option<&str>) -> Result<Response> {
        let request = match authorization {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        };
        request
            .send()
            .await
            .map_err(|e| self.translate_reqwest_error(e))
    }

    async fn cached_token(&self, registry: &str, scope: &str) -> Option<String> {
        let auth = self.auth.lock().await;
        let challenge = auth.challenges.get(registry)?;
        auth.tokens.get(&token_key(challenge, scope)).cloned()
    }

    /// Exchanges credentials for a Bearer token at the challenge's realm.
    async fn fetch_token(
        &self,
        challenge: &AuthChallenge,
        credentials: &Credentials,
        scope: &str,
    ) -> Result<String> {
        let service = challenge.service.clone().unwrap_or_default();

        let request = match credentials {
            Credentials::IdentityToken { token } => self.http_client.post(&challenge.realm).form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", token.as_str()),
                ("service", service.as_str()),
                ("scope", scope),
                ("client_id", OAUTH_CLIENT_ID),
            ]),
            _ => {
                let mut request = self
                    .http_client
                    .get(&challenge.realm)
                    .query(&[("scope", scope)]);
                if !service.is_empty() {
                    request = request.query(&[("service", service.as_str())]);
                }
                match credentials {
                    Credentials::Basic { .. } => match credentials.to_header_value() {
                        Some(value) => request.header(AUTHORIZATION, value),
                        None => request,
                    },
                    _ => request,
                }
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| self.translate_reqwest_error(e))?;
        let response = Self::check_response_status(response, "token endpoint", &challenge.realm)
            .await
            .map_err(|e| missing_is_invalid(e, "token endpoint", &challenge.realm))?;

        let body: TokenResponse = response.json().await.map_err(|e| {
            RetagError::validation_with_source("Failed to parse token response", e)
        })?;

        body.token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                RetagError::authentication(
                    format!("Token endpoint {} returned no token", challenge.realm),
                    None,
                )
            })
    }

    /// Translates a reqwest error into a RetagError.
    fn translate_reqwest_error(&self, error: reqwest::Error) -> RetagError {
        let target = error
            .url()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| "registry".to_string());

        if error.is_timeout() {
            RetagError::network_with_source(
                format!(
                    "Request to {} timed out after {} seconds",
                    target, self.config.timeout_seconds
                ),
                error,
            )
        } else if error.is_connect() {
            RetagError::network_with_source(format!("Failed to connect to {}", target), error)
        } else {
            RetagError::network_with_source(
                format!("Network error communicating with {}", target),
                error,
            )
        }
    }

    /// Checks the HTTP response status and translates errors to RetagError.
    async fn check_response_status(
        response: Response,
        resource_type: &str,
        name: &str,
    ) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let retry_after = parse_retry_after(response.headers(), Utc::now());
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("(unable to read response body)"));

        match status {
            StatusCode::UNAUTHORIZED => Err(RetagError::authentication(
                format!("Authentication required for {}: {}", url, error_body),
                Some(401),
            )),
            StatusCode::FORBIDDEN => Err(RetagError::authentication(
                format!("Access forbidden for {}: {}", url, error_body),
                Some(403),
            )),
            StatusCode::NOT_FOUND => Err(RetagError::not_found(resource_type, name)),
            StatusCode::TOO_MANY_REQUESTS => Err(RetagError::rate_limit(
                format!("Rate limit exceeded for {}", url),
                retry_after,
            )),
            StatusCode::REQUEST_TIMEOUT
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => Err(RetagError::server(
                format!("Server error from {}: {}", url, error_body),
                status.as_u16(),
            )),
            _ => Err(RetagError::validation(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                error_body
            ))),
        }
    }
}

#[async_trait]
impl RegistryTransport for Client {
    async fn fetch_metadata(&self, reference: &Reference) -> Result<ImageMetadata> {
        let (bytes, digest, _) = self
            .fetch_manifest(reference, reference.manifest_reference())
            .await?;
        let parsed = ManifestOrIndex::from_bytes(&bytes)?;
        let created = self.created_of(reference, &parsed).await?;

        Ok(ImageMetadata::new(digest, created))
    }

    async fn put_tag(&self, source: &Reference, destination: &Reference) -> Result<()> {
        let tag = destination.tag().ok_or_else(|| {
            RetagError::invalid_reference(destination.to_string(), "destination has no tag")
        })?;

        let (bytes, _, content_type) = self
            .fetch_manifest(source, source.manifest_reference())
            .await?;
        let content_type = match content_type {
            Some(ct) if !ct.is_empty() => ct,
            _ => ManifestOrIndex::from_bytes(&bytes)?
                .media_type()
                .unwrap_or_else(|| DEFAULT_MANIFEST_MEDIA_TYPE.to_string()),
        };

        let url = self.manifest_url(destination, tag);
        let response = self
            .execute(destination, || {
                self.http_client
                    .put(&url)
                    .header(CONTENT_TYPE, content_type.as_str())
                    .body(bytes.clone())
            })
            .await?;
        Self::check_response_status(response, "repository", &destination.to_string()).await?;

        Ok(())
    }
}

/// Token scope for reads and writes within the reference's repository.
fn scope_for(reference: &Reference) -> String {
    format!("repository:{}:pull,push", reference.repository())
}

fn token_key(challenge: &AuthChallenge, scope: &str) -> (String, String, String) {
    (
        challenge.realm.clone(),
        challenge.service.clone().unwrap_or_default(),
        scope.to_string(),
    )
}

/// Turns a `NotFound` for a dependent resource into a permanent failure.
fn missing_is_invalid(error: RetagError, what: &str, name: &str) -> RetagError {
    if error.is_not_found() {
        RetagError::validation(format!("{} {} is missing", what, name))
    } else {
        error
    }
}

fn is_loopback(registry: &str) -> bool {
    let host = match registry.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None => registry.split(':').next().unwrap_or(registry),
    };

    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<std::net::IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}

/// Parses `Retry-After` as delta seconds or an HTTP date.
fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<u64> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = at.with_timezone(&Utc) - now;
    Some(delta.num_seconds().max(0) as u64)
}
