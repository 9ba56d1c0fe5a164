//! Ambient Google Cloud identity resolution.
//!
//! Follows the Application Default Credentials search order:
//!
//! 1. `GOOGLE_OAUTH_ACCESS_TOKEN` - a ready bearer token
//! 2. The credentials file named by `GOOGLE_APPLICATION_CREDENTIALS`, or the
//!    gcloud well-known file (`gcloud auth application-default login`)
//! 3. The GCE metadata server
//!
//! `GOOGLE_CLOUD_PROJECT` (or `GCLOUD_PROJECT`) overrides whatever project id
//! the source reports.

use crate::config::Settings;
use crate::error::{NotifyError, Result};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const METADATA_TIMEOUT: Duration = Duration::from_secs(3);
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Where a resolved identity came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    AuthorizedUser(PathBuf),
    ServiceAccount(PathBuf),
    MetadataServer,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => write!(f, "GOOGLE_OAUTH_ACCESS_TOKEN"),
            Self::AuthorizedUser(path) => write!(f, "authorized user ({})", path.display()),
            Self::ServiceAccount(path) => write!(f, "service account ({})", path.display()),
            Self::MetadataServer => write!(f, "metadata server"),
        }
    }
}

/// Credentials usable against Google APIs.
#[derive(Clone)]
pub struct ResolvedIdentity {
    pub project_id: Option<String>,
    pub access_token: String,
    pub source: CredentialSource,
}

impl fmt::Debug for ResolvedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedIdentity")
            .field("project_id", &self.project_id)
            .field("access_token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Capability: obtain credentials for a scope.
#[allow(async_fn_in_trait)]
pub trait IdentityResolver {
    async fn resolve(&self, scope: &str) -> Result<ResolvedIdentity>;
}

/// Inputs to the credential search, captured from the environment.
#[derive(Debug, Clone, Default)]
pub struct AmbientSources {
    pub access_token: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub well_known_file: Option<PathBuf>,
    pub metadata_host: Option<String>,
    pub project_override: Option<String>,
}

impl AmbientSources {
    pub fn from_env() -> Self {
        let var = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.trim().is_empty())
        };

        Self {
            access_token: var("GOOGLE_OAUTH_ACCESS_TOKEN"),
            credentials_file: var("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            well_known_file: well_known_file(var("CLOUDSDK_CONFIG").map(PathBuf::from)),
            metadata_host: var("GCE_METADATA_HOST"),
            project_override: var("GOOGLE_CLOUD_PROJECT").or_else(|| var("GCLOUD_PROJECT")),
        }
    }
}

/// Path of the file written by `gcloud auth application-default login`.
fn well_known_file(cloudsdk_config: Option<PathBuf>) -> Option<PathBuf> {
    let dir = match cloudsdk_config {
        Some(dir) => dir,
        None if cfg!(windows) => dirs::config_dir()?.join("gcloud"),
        None => dirs::home_dir()?.join(".config").join("gcloud"),
    };
    Some(dir.join("application_default_credentials.json"))
}

/// Resolver backed by Application Default Credentials.
pub struct AmbientIdentity {
    http: reqwest::Client,
    token_endpoint: String,
    sources: AmbientSources,
}

impl AmbientIdentity {
    pub fn new(settings: &Settings, sources: AmbientSources) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| NotifyError::Identity(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token_endpoint: settings.token_endpoint.clone(),
            sources,
        })
    }

    async fn discover(&self, scope: &str) -> Result<ResolvedIdentity> {
        if let Some(token) = &self.sources.access_token {
            debug!("using access token from environment");
            return Ok(ResolvedIdentity {
                project_id: None,
                access_token: token.clone(),
                source: CredentialSource::Environment,
            });
        }

        // An explicitly named file must work; no fall-through.
        if let Some(path) = &self.sources.credentials_file {
            return self.load_file(path, scope).await;
        }

        if let Some(path) = &self.sources.well_known_file {
            if path.exists() {
                return self.load_file(path, scope).await;
            }
        }

        match self.query_metadata(scope).await {
            Ok(identity) => return Ok(identity),
            Err(e) => debug!(error = %e, "metadata server unavailable"),
        }

        Err(NotifyError::Identity(
            "could not find default credentials; set GOOGLE_APPLICATION_CREDENTIALS \
             or run `gcloud auth application-default login`"
                .to_string(),
        ))
    }

    async fn load_file(&self, path: &Path, scope: &str) -> Result<ResolvedIdentity> {
        debug!(path = %path.display(), "loading credentials file");

        let content = std::fs::read(path).map_err(|e| {
            NotifyError::Identity(format!(
                "unable to read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        let file = CredentialFile::parse(&content).map_err(|e| {
            NotifyError::Identity(format!(
                "unable to parse credentials file {}: {}",
                path.display(),
                e
            ))
        })?;

        match file {
            CredentialFile::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                quota_project_id,
            } => {
                let params = [
                    ("grant_type", "refresh_token"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("refresh_token", refresh_token.as_str()),
                ];
                let access_token = self.exchange(&self.token_endpoint, &params).await?;

                Ok(ResolvedIdentity {
                    project_id: non_empty(quota_project_id),
                    access_token,
                    source: CredentialSource::AuthorizedUser(path.to_path_buf()),
                })
            }
            CredentialFile::ServiceAccount {
                client_email,
                private_key,
                private_key_id,
                project_id,
                token_uri,
            } => {
                let audience = token_uri.unwrap_or_else(|| self.token_endpoint.clone());
                let assertion = sign_assertion(
                    &client_email,
                    &private_key,
                    private_key_id,
                    scope,
                    &audience,
                    unix_now(),
                )?;
                let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];
                let access_token = self.exchange(&audience, &params).await?;

                Ok(ResolvedIdentity {
                    project_id: non_empty(project_id),
                    access_token,
                    source: CredentialSource::ServiceAccount(path.to_path_buf()),
                })
            }
        }
    }

    async fn query_metadata(&self, scope: &str) -> Result<ResolvedIdentity> {
        let host = self
            .sources
            .metadata_host
            .as_deref()
            .unwrap_or(DEFAULT_METADATA_HOST);
        let base = format!("http://{}/computeMetadata/v1", host);

        let response = self
            .http
            .get(format!("{}/instance/service-accounts/default/token", base))
            .query(&[("scopes", scope)])
            .header("Metadata-Flavor", "Google")
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .map_err(|e| NotifyError::Identity(format!("metadata token request failed: {}", e)))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            NotifyError::Identity(format!("failed to read metadata token response: {}", e))
        })?;
        let access_token = parse_token_response(status, &body)?;

        // A missing project is reported by the pipeline, not here.
        let project_id = match self
            .http
            .get(format!("{}/project/project-id", base))
            .header("Metadata-Flavor", "Google")
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                non_empty(response.text().await.ok().map(|s| s.trim().to_string()))
            }
            Ok(response) => {
                debug!(status = %response.status(), "metadata project lookup failed");
                None
            }
            Err(e) => {
                debug!(error = %e, "metadata project lookup failed");
                None
            }
        };

        Ok(ResolvedIdentity {
            project_id,
            access_token,
            source: CredentialSource::MetadataServer,
        })
    }

    async fn exchange(&self, url: &str, params: &[(&str, &str)]) -> Result<String> {
        let response = self
            .http
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| NotifyError::Identity(format!("token request to {} failed: {}", url, e)))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            NotifyError::Identity(format!("failed to read token response from {}: {}", url, e))
        })?;
        parse_token_response(status, &body)
    }
}

impl IdentityResolver for AmbientIdentity {
    async fn resolve(&self, scope: &str) -> Result<ResolvedIdentity> {
        let mut identity = self.discover(scope).await?;
        if let Some(project) = &self.sources.project_override {
            identity.project_id = Some(project.clone());
        }

        debug!(
            source = %identity.source,
            project = identity.project_id.as_deref().unwrap_or("<none>"),
            "resolved ambient credentials"
        );
        Ok(identity)
    }
}

/// Supported Application Default Credentials file formats.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialFile {
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        #[serde(default)]
        quota_project_id: Option<String>,
    },
    ServiceAccount {
        client_email: String,
        private_key: String,
        #[serde(default)]
        private_key_id: Option<String>,
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        token_uri: Option<String>,
    },
}

impl CredentialFile {
    fn parse(content: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(content)
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

fn sign_assertion(
    client_email: &str,
    private_key: &str,
    key_id: Option<String>,
    scope: &str,
    audience: &str,
    now: u64,
) -> Result<String> {
    let key = EncodingKey::from_rsa_pem(private_key.as_bytes()).map_err(|e| {
        NotifyError::Identity(format!("invalid service account private key: {}", e))
    })?;

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key_id;

    let claims = AssertionClaims {
        iss: client_email,
        scope,
        aud: audience,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|e| NotifyError::Identity(format!("failed to sign token assertion: {}", e)))
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Interpret an OAuth token endpoint response.
fn parse_token_response(status: StatusCode, body: &str) -> Result<String> {
    if !status.is_success() {
        let detail = match serde_json::from_str::<TokenErrorResponse>(body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => body.trim().to_string(),
        };
        return Err(NotifyError::Identity(format!(
            "token endpoint returned {}: {}",
            status, detail
        )));
    }

    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|e| NotifyError::Identity(format!("failed to parse token response: {}", e)))?;
    if parsed.access_token.is_empty() {
        return Err(NotifyError::Identity(
            "token endpoint returned an empty access token".to_string(),
        ));
    }
    Ok(parsed.access_token)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
