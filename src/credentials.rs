//! Pushover credentials stored in the secret payload.
//!
//! The payload is a YAML mapping:
//!
//! ```yaml
//! token: azGDORePK8gMaC0QOYAMyEEuzJnyUi
//! user: uQiRzpo4DXghDmr9QzzfQu27cmVRsG
//! ```
//!
//! Unknown keys are ignored. Missing or null keys decode to empty strings;
//! whether those are acceptable is left to the notification client.

use crate::error::Result;
use serde::Deserialize;
use std::fmt;

/// Application token and recipient key for the notification API.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub user: String,
}

#[derive(Deserialize)]
struct RawCredentials {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<String>,
}

impl Credentials {
    /// Decode credentials from a raw secret payload.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Decode`](crate::error::NotifyError::Decode) if
    /// the payload is not well-formed YAML or is not a mapping.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let raw: Option<RawCredentials> = serde_yaml::from_slice(payload)?;
        let raw = match raw {
            Some(raw) => raw,
            None => return Ok(Self::default()),
        };

        Ok(Self {
            token: raw.token.unwrap_or_default(),
            user: raw.user.unwrap_or_default(),
        })
    }
}

// Never print secret material.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &redact(&self.token))
            .field("user", &redact(&self.user))
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}
