//! Credentials from the Docker CLI's `config.json`.
//!
//! Lookup follows the Docker CLI: a per-host entry in `credHelpers` first,
//! then the `credsStore` helper, then the inline `auths` entry. Helpers are
//! run as `docker-credential-<name> get` and their answers are cached for the
//! life of the provider.

use super::{CredentialProvider, Credentials, normalize_registry};
use crate::error::{Result, RetagError};
use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

/// Username a credential helper returns when the secret is an identity token.
const IDENTITY_TOKEN_USERNAME: &str = "<token>";

/// Output of a helper that has nothing stored for the server.
const HELPER_NOT_FOUND: &str = "credentials not found";

/// Server address the Docker CLI stores Docker Hub credentials under.
const DOCKER_HUB_SERVER: &str = "https://index.docker.io/v1/";

/// Layout of the parts of `config.json` this provider understands.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    #[serde(default)]
    creds_store: Option<String>,
    #[serde(default)]
    cred_helpers: HashMap<String, String>,
}

/// What `docker-credential-<name> get` prints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HelperResponse {
    #[serde(default)]
    username: String,
    #[serde(default)]
    secret: String,
}

impl HelperResponse {
    fn into_credentials(self) -> Option<Credentials> {
        if self.secret.is_empty() {
            None
        } else if self.username == IDENTITY_TOKEN_USERNAME {
            Some(Credentials::identity_token(self.secret))
        } else {
            Some(Credentials::basic(self.username, self.secret))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AuthEntry {
    /// base64 of `username:password`
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    identitytoken: Option<String>,
    #[serde(default)]
    registrytoken: Option<String>,
}

impl AuthEntry {
    fn into_credentials(self, registry: &str) -> Result<Option<Credentials>> {
        if let Some(token) = self.registrytoken.filter(|t| !t.is_empty()) {
            return Ok(Some(Credentials::bearer(token)));
        }

        if let Some(token) = self.identitytoken.filter(|t| !t.is_empty()) {
            return Ok(Some(Credentials::identity_token(token)));
        }

        if let Some(encoded) = self.auth.filter(|a| !a.is_empty()) {
            let decoded = general_purpose::STANDARD.decode(encoded.trim()).map_err(|e| {
                RetagError::config_with_source(
                    format!("Invalid base64 auth entry for {}", registry),
                    None,
                    e,
                )
            })?;
            let decoded = String::from_utf8(decoded).map_err(|e| {
                RetagError::config_with_source(
                    format!("Auth entry for {} is not UTF-8", registry),
                    None,
                    e,
                )
            })?;
            let (username, password) = decoded.split_once(':').ok_or_else(|| {
                RetagError::config(
                    format!("Auth entry for {} is not of the form user:password", registry),
                    None,
                )
            })?;
            return Ok(Some(Credentials::basic(username, password)));
        }

        match (self.username, self.password) {
            (Some(username), Some(password)) => Ok(Some(Credentials::basic(username, password))),
            _ => Ok(None),
        }
    }
}

/// Credential provider backed by the Docker CLI configuration file.
///
/// # Examples
///
/// ```
/// use libretag::auth::{CredentialProvider, Credentials, DockerConfigProvider};
///
/// // "dXNlcjpwYXNz" is base64 for "user:pass"
/// let json = r#"{"auths": {"https://index.docker.io/v1/": {"auth": "dXNlcjpwYXNz"}}}"#;
/// let provider = DockerConfigProvider::from_json(json).unwrap();
///
/// assert_eq!(
///     provider.credentials_for("docker.io").unwrap(),
///     Credentials::basic("user", "pass")
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct DockerConfigProvider {
    by_registry: HashMap<String, Credentials>,
    helpers: HashMap<String, String>,
    creds_store: Option<String>,
    /// Directory holding the helper binaries. `None` searches `PATH`.
    helper_dir: Option<PathBuf>,
    resolved: Arc<Mutex<HashMap<String, Credentials>>>,
}

impl DockerConfigProvider {
    /// Parses the contents of a `config.json` file.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: DockerConfigFile = serde_json::from_str(json).map_err(|e| {
            RetagError::config_with_source("Failed to parse docker config", None, e)
        })?;

        let mut by_registry = HashMap::new();
        for (key, entry) in file.auths {
            if let Some(credentials) = entry.into_credentials(&key)? {
                by_registry.insert(normalize_registry(&key), credentials);
            }
        }

        let helpers = file
            .cred_helpers
            .into_iter()
            .filter(|(_, helper)| !helper.is_empty())
            .map(|(host, helper)| (normalize_registry(&host), helper))
            .collect();

        Ok(Self {
            by_registry,
            helpers,
            creds_store: file.creds_store.filter(|s| !s.is_empty()),
            helper_dir: None,
            resolved: Arc::default(),
        })
    }

    /// Looks credential helpers up in `dir` instead of on `PATH`.
    pub fn with_helper_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.helper_dir = Some(dir.into());
        self
    }

    /// Loads `path`. A file that does not exist yields an empty provider.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no docker config, using anonymous access");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            RetagError::config_with_source(
                "Failed to read docker config".to_string(),
                Some(path.display().to_string()),
                e,
            )
        })?;

        let provider = Self::from_json(&contents).map_err(|e| match e {
            RetagError::Config {
                message, source, ..
            } => RetagError::Config {
                message,
                path: Some(path.display().to_string()),
                source,
            },
            other => other,
        })?;
        tracing::debug!(
            path = %path.display(),
            registries = ?provider.registries(),
            creds_store = ?provider.creds_store,
            "loaded docker config"
        );
        Ok(provider)
    }

    /// Returns `$DOCKER_CONFIG/config.json`, or `~/.docker/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        match std::env::var_os("DOCKER_CONFIG") {
            Some(dir) => Some(PathBuf::from(dir).join("config.json")),
            None => dirs::home_dir().map(|home| home.join(".docker").join("config.json")),
        }
    }

    /// Loads the config file the Docker CLI would use.
    pub fn from_environment() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Returns the registries this provider has inline credentials for.
    pub fn registries(&self) -> Vec<String> {
        let mut registries: Vec<String> = self.by_registry.keys().cloned().collect();
        registries.sort();
        registries
    }

    /// Name of the helper responsible for `registry`, if any.
    pub fn helper_for(&self, registry: &str) -> Option<&str> {
        self.helpers
            .get(&normalize_registry(registry))
            .or(self.creds_store.as_ref())
            .map(String::as_str)
    }

    fn helper_program(&self, helper: &str) -> PathBuf {
        let name = format!("docker-credential-{}", helper);
        match &self.helper_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Runs `docker-credential-<helper> get` for `registry`.
    ///
    /// Returns `None` when the helper has nothing stored for the server.
    fn run_helper(&self, helper: &str, registry: &str) -> Result<Option<Credentials>> {
        let program = self.helper_program(helper);
        let server = if registry == "docker.io" {
            DOCKER_HUB_SERVER
        } else {
            registry
        };
        tracing::debug!(helper, registry, "asking credential helper");

        let mut child = Command::new(&program)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| helper_error(&program, registry, e))?;
        if let Some(mut stdin) = child.stdin.take() {
            writeln!(stdin, "{}", server).map_err(|e| helper_error(&program, registry, e))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| helper_error(&program, registry, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            if stdout.contains(HELPER_NOT_FOUND) {
                tracing::debug!(helper, registry, "credential helper has no entry");
                return Ok(None);
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            return Err(RetagError::config(
                format!(
                    "Credential helper '{}' failed for {}: {}",
                    program.display(),
                    registry,
                    detail
                ),
                None,
            ));
        }

        let response: HelperResponse = serde_json::from_str(stdout.trim()).map_err(|e| {
            RetagError::config_with_source(
                format!(
                    "Credential helper '{}' returned invalid output for {}",
                    program.display(),
                    registry
                ),
                None,
                e,
            )
        })?;
        Ok(response.into_credentials())
    }
}

fn helper_error(program: &Path, registry: &str, source: std::io::Error) -> RetagError {
    RetagError::config_with_source(
        format!(
            "Credential helper '{}' could not be run for {}",
            program.display(),
            registry
        ),
        None,
        source,
    )
}

impl CredentialProvider for DockerConfigProvider {
    fn credentials_for(&self, registry: &str) -> Result<Credentials> {
        let registry = normalize_registry(registry);
        let inline = self.by_registry.get(&registry).cloned();

        let Some(helper) = self.helper_for(&registry) else {
            return Ok(inline.unwrap_or(Credentials::Anonymous));
        };

        if let Some(cached) = self
            .resolved
            .lock()
            .ok()
            .and_then(|resolved| resolved.get(&registry).cloned())
        {
            return Ok(cached);
        }

        let credentials = self
            .run_helper(helper, &registry)?
            .or(inline)
            .unwrap_or(Credentials::Anonymous);
        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.insert(registry, credentials.clone());
        }
        Ok(credentials)
    }
}
