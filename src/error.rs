//! Error taxonomy for the notification pipeline.
//!
//! Every failure is terminal. Variants only exist so callers and tests can
//! tell which step gave up; the binary maps all of them to exit code 1.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    /// Invalid arguments or settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// Ambient credentials missing, unusable, or without a project id.
    #[error("identity error: {0}")]
    Identity(String),

    /// The secret store could not be reached or refused the request.
    #[error("error accessing secret {path}: {reason}")]
    SecretAccess { path: String, reason: String },

    /// The secret payload is not a usable YAML document.
    #[error("failed to decode credentials: {0}")]
    Decode(#[from] serde_yaml::Error),

    /// The notification API rejected the message or could not be reached.
    #[error("failed to deliver notification: {0}")]
    Delivery(String),
}

impl NotifyError {
    pub(crate) fn secret_access(path: impl ToString, reason: impl ToString) -> Self {
        Self::SecretAccess {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
