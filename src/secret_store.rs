//! Google Cloud Secret Manager access.
//!
//! Only the `versions/*:access` call is used. The handle returned by a
//! [`SecretStoreConnector`] lives for one fetch and must be closed afterwards,
//! whatever the outcome.

use crate::config::Settings;
use crate::error::{NotifyError, Result};
use crate::identity::ResolvedIdentity;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

/// Capability: read one secret version.
#[allow(async_fn_in_trait)]
pub trait SecretStore {
    /// Fetch the raw payload stored at a fully-qualified secret path.
    async fn access(&self, path: &str) -> Result<Vec<u8>>;

    /// Release the underlying connection.
    fn close(self);
}

/// Capability: open a [`SecretStore`] for an identity.
pub trait SecretStoreConnector {
    type Store: SecretStore;

    fn connect(&self, identity: &ResolvedIdentity) -> Result<Self::Store>;
}

/// Builds [`SecretManagerClient`]s from settings.
pub struct SecretManager {
    settings: Settings,
}

impl SecretManager {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }
}

impl SecretStoreConnector for SecretManager {
    type Store = SecretManagerClient;

    fn connect(&self, identity: &ResolvedIdentity) -> Result<SecretManagerClient> {
        SecretManagerClient::new(&self.settings, &identity.access_token)
    }
}

/// REST client for Secret Manager bound to one bearer token.
pub struct SecretManagerClient {
    http: reqwest::Client,
    endpoint: String,
    bearer: String,
}

impl SecretManagerClient {
    pub fn new(settings: &Settings, access_token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| {
                NotifyError::Config(format!("error creating secret manager client: {}", e))
            })?;

        Ok(Self {
            http,
            endpoint: settings.secret_manager_endpoint.clone(),
            bearer: format!("Bearer {}", access_token),
        })
    }
}

impl SecretStore for SecretManagerClient {
    async fn access(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}:access", self.endpoint, path);
        debug!(secret = %path, "accessing secret version");

        let response = self
            .http
            .get(url)
            .header("Authorization", &self.bearer)
            .send()
            .await
            .map_err(|e| NotifyError::secret_access(path, format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            NotifyError::secret_access(path, format!("failed to read response body: {}", e))
        })?;
        decode_access_response(path, status, &body)
    }

    fn close(self) {
        debug!("closing secret manager client");
        drop(self);
    }
}

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    #[serde(default)]
    payload: Option<SecretPayload>,
}

#[derive(Deserialize)]
struct SecretPayload {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorBody,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
}

/// Turn an `:access` response into the secret payload bytes.
fn decode_access_response(path: &str, status: StatusCode, body: &str) -> Result<Vec<u8>> {
    if !status.is_success() {
        let detail = serde_json::from_str::<GoogleErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.trim().to_string());

        let reason = match status {
            StatusCode::NOT_FOUND => "secret or version not found".to_string(),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => "permission denied".to_string(),
            status => format!("unexpected status {}", status),
        };
        let reason = if detail.is_empty() {
            reason
        } else {
            format!("{}: {}", reason, detail)
        };
        return Err(NotifyError::secret_access(path, reason));
    }

    let parsed: AccessSecretVersionResponse = serde_json::from_str(body).map_err(|e| {
        NotifyError::secret_access(path, format!("failed to parse access response: {}", e))
    })?;

    match parsed.payload.and_then(|payload| payload.data) {
        Some(data) => STANDARD.decode(data).map_err(|e| {
            NotifyError::secret_access(path, format!("payload is not valid base64: {}", e))
        }),
        None => Ok(Vec::new()),
    }
}
