//! Common testing utilities for Abandonship integration tests.
//!
//! Each mock records what it was asked to do into a shared [`CallLog`], so
//! tests can assert both which collaborators ran and in what order.

use abandonship::error::{NotifyError, Result};
use abandonship::identity::{CredentialSource, IdentityResolver, ResolvedIdentity};
use abandonship::notify::{Notifier, Receipt};
use abandonship::secret_store::{SecretStore, SecretStoreConnector};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Resolve { scope: String },
    Connect,
    Access { path: String },
    Close,
    Send {
        app_token: String,
        recipient: String,
        body: String,
    },
}

/// Shared, append-only record of calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    #[allow(dead_code)]
    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.0.borrow().iter().filter(|call| matches(call)).count()
    }
}

/// Identity resolver returning a fixed project (or a fixed failure).
pub struct MockIdentity {
    log: CallLog,
    project: Option<String>,
    failure: Option<String>,
}

impl MockIdentity {
    pub fn with_project(log: &CallLog, project: &str) -> Self {
        Self {
            log: log.clone(),
            project: Some(project.to_string()),
            failure: None,
        }
    }

    #[allow(dead_code)]
    pub fn without_project(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            project: None,
            failure: None,
        }
    }

    #[allow(dead_code)]
    pub fn failing(log: &CallLog, reason: &str) -> Self {
        Self {
            log: log.clone(),
            project: None,
            failure: Some(reason.to_string()),
        }
    }
}

impl IdentityResolver for MockIdentity {
    async fn resolve(&self, scope: &str) -> Result<ResolvedIdentity> {
        self.log.push(Call::Resolve {
            scope: scope.to_string(),
        });

        if let Some(reason) = &self.failure {
            return Err(NotifyError::Identity(reason.clone()));
        }

        Ok(ResolvedIdentity {
            project_id: self.project.clone(),
            access_token: "ya29.mock".to_string(),
            source: CredentialSource::Environment,
        })
    }
}

/// Secret store serving payloads from an in-memory map.
pub struct MockSecretManager {
    log: CallLog,
    secrets: HashMap<String, Vec<u8>>,
    connect_failure: Option<NotifyError>,
}

impl MockSecretManager {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            secrets: HashMap::new(),
            connect_failure: None,
        }
    }

    /// Connector whose client construction fails.
    #[allow(dead_code)]
    pub fn unreachable(log: &CallLog, failure: NotifyError) -> Self {
        Self {
            log: log.clone(),
            secrets: HashMap::new(),
            connect_failure: Some(failure),
        }
    }

    pub fn with_secret(mut self, path: &str, payload: impl Into<Vec<u8>>) -> Self {
        self.secrets.insert(path.to_string(), payload.into());
        self
    }
}

impl SecretStoreConnector for MockSecretManager {
    type Store = MockSecretStore;

    fn connect(&self, _identity: &ResolvedIdentity) -> Result<MockSecretStore> {
        self.log.push(Call::Connect);
        if let Some(failure) = &self.connect_failure {
            return Err(match failure {
                NotifyError::SecretAccess { path, reason } => NotifyError::SecretAccess {
                    path: path.clone(),
                    reason: reason.clone(),
                },
                NotifyError::Config(reason) => NotifyError::Config(reason.clone()),
                other => NotifyError::Config(other.to_string()),
            });
        }
        Ok(MockSecretStore {
            log: self.log.clone(),
            secrets: self.secrets.clone(),
        })
    }
}

pub struct MockSecretStore {
    log: CallLog,
    secrets: HashMap<String, Vec<u8>>,
}

impl SecretStore for MockSecretStore {
    async fn access(&self, path: &str) -> Result<Vec<u8>> {
        self.log.push(Call::Access {
            path: path.to_string(),
        });

        self.secrets.get(path).cloned().ok_or_else(|| NotifyError::SecretAccess {
            path: path.to_string(),
            reason: "secret or version not found".to_string(),
        })
    }

    fn close(self) {
        self.log.push(Call::Close);
    }
}

/// Notifier that records messages instead of sending them.
pub struct MockPushover {
    log: CallLog,
    rejection: Option<String>,
}

impl MockPushover {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            rejection: None,
        }
    }

    #[allow(dead_code)]
    pub fn rejecting(log: &CallLog, reason: &str) -> Self {
        Self {
            log: log.clone(),
            rejection: Some(reason.to_string()),
        }
    }
}

impl Notifier for MockPushover {
    async fn send(&self, app_token: &str, recipient: &str, body: &str) -> Result<Receipt> {
        self.log.push(Call::Send {
            app_token: app_token.to_string(),
            recipient: recipient.to_string(),
            body: body.to_string(),
        });

        match &self.rejection {
            Some(reason) => Err(NotifyError::Delivery(reason.clone())),
            None => Ok(Receipt {
                request_id: Some("mock-request".to_string()),
            }),
        }
    }
}

/// Build a YAML credentials payload.
#[allow(dead_code)]
pub fn yaml_payload(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut yaml_map = serde_yaml::Mapping::new();
    for (key, value) in entries {
        yaml_map.insert(
            serde_yaml::Value::String(key.to_string()),
            serde_yaml::Value::String(value.to_string()),
        );
    }

    serde_yaml::to_string(&yaml_map).unwrap().into_bytes()
}
