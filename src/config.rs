// Abandonship Configuration Module
//
// Constants the pipeline needs, bundled into one immutable value so tests can
// substitute endpoints and templates.

use crate::error::{NotifyError, Result};
use std::time::Duration;

pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const DEFAULT_SECRET_VERSION: &str = "latest";
pub const SECRET_PATH_TEMPLATE: &str = "projects/{project}/secrets/{secret}/versions/{version}";
pub const SECRET_MANAGER_ENDPOINT: &str = "https://secretmanager.googleapis.com/v1";
pub const PUSHOVER_ENDPOINT: &str = "https://api.pushover.net";
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Runtime settings for a single invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// OAuth scope requested for ambient credentials
    pub scope: String,

    /// Template with `{project}`, `{secret}` and `{version}` placeholders
    pub secret_path_template: String,

    /// Version used when none is given on the command line
    pub default_version: String,

    /// Base URL of the Secret Manager REST API
    pub secret_manager_endpoint: String,

    /// Base URL of the Pushover API
    pub pushover_endpoint: String,

    /// OAuth token endpoint used for credential-file grants
    pub token_endpoint: String,

    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scope: DEFAULT_SCOPE.to_string(),
            secret_path_template: SECRET_PATH_TEMPLATE.to_string(),
            default_version: DEFAULT_SECRET_VERSION.to_string(),
            secret_manager_endpoint: SECRET_MANAGER_ENDPOINT.to_string(),
            pushover_endpoint: PUSHOVER_ENDPOINT.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset. Recognized variables:
    ///
    /// - `ABANDONSHIP_SECRET_MANAGER_ENDPOINT`
    /// - `ABANDONSHIP_PUSHOVER_ENDPOINT`
    /// - `ABANDONSHIP_TOKEN_ENDPOINT`
    /// - `ABANDONSHIP_HTTP_TIMEOUT_SECS`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut settings = Self::default();

        if let Some(endpoint) = get("ABANDONSHIP_SECRET_MANAGER_ENDPOINT") {
            settings.secret_manager_endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(endpoint) = get("ABANDONSHIP_PUSHOVER_ENDPOINT") {
            settings.pushover_endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(endpoint) = get("ABANDONSHIP_TOKEN_ENDPOINT") {
            settings.token_endpoint = endpoint;
        }
        if let Some(raw) = get("ABANDONSHIP_HTTP_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                NotifyError::Config(format!(
                    "ABANDONSHIP_HTTP_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    raw
                ))
            })?;
            if secs == 0 {
                return Err(NotifyError::Config(
                    "ABANDONSHIP_HTTP_TIMEOUT_SECS must be greater than zero".to_string(),
                ));
            }
            settings.timeout = Duration::from_secs(secs);
        }

        Ok(settings)
    }

    /// Build the fully-qualified secret reference.
    ///
    /// An empty `version` falls back to [`Settings::default_version`].
    pub fn secret_path(&self, project: &str, secret: &str, version: &str) -> String {
        let version = if version.is_empty() {
            self.default_version.as_str()
        } else {
            version
        };

        self.secret_path_template
            .replace("{project}", project)
            .replace("{secret}", secret)
            .replace("{version}", version)
    }
}
