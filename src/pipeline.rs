//! The notification pipeline.
//!
//! `resolve identity → fetch secret → decode credentials → send notification`
//!
//! Each step either succeeds or ends the run with a [`NotifyError`]. Nothing
//! is retried and nothing needs rolling back.

use crate::cli::InvocationArgs;
use crate::config::Settings;
use crate::credentials::Credentials;
use crate::error::{NotifyError, Result};
use crate::identity::{IdentityResolver, ResolvedIdentity};
use crate::notify::{Notifier, Receipt};
use crate::secret_store::{SecretStore, SecretStoreConnector};
use tracing::{debug, info};

/// Run one invocation against the given collaborators.
pub async fn run<I, C, N>(
    args: &InvocationArgs,
    settings: &Settings,
    resolver: &I,
    connector: &C,
    notifier: &N,
) -> Result<Receipt>
where
    I: IdentityResolver,
    C: SecretStoreConnector,
    N: Notifier,
{
    let identity = resolver.resolve(&settings.scope).await?;
    let project = identity
        .project_id
        .as_deref()
        .filter(|project| !project.is_empty())
        .ok_or_else(|| {
            NotifyError::Identity(
                "unable to determine project from default credentials".to_string(),
            )
        })?;

    let path = settings.secret_path(project, &args.secret_name, &args.secret_version);
    let payload = fetch_secret(connector, &identity, &path).await?;
    debug!(bytes = payload.len(), "fetched secret payload");

    let credentials = Credentials::decode(&payload)?;

    let receipt = notifier
        .send(&credentials.token, &credentials.user, &args.message)
        .await?;
    info!(
        request = receipt.request_id.as_deref().unwrap_or("-"),
        "notification delivered"
    );

    Ok(receipt)
}

/// Fetch one secret version, closing the store on every path.
///
/// Connection failures are reported against `path`, whatever the connector
/// returned.
async fn fetch_secret<C: SecretStoreConnector>(
    connector: &C,
    identity: &ResolvedIdentity,
    path: &str,
) -> Result<Vec<u8>> {
    let store = connector.connect(identity).map_err(|e| match e {
        NotifyError::SecretAccess { reason, .. } => NotifyError::secret_access(path, reason),
        NotifyError::Config(reason) => NotifyError::secret_access(path, reason),
        other => NotifyError::secret_access(path, other),
    })?;
    let result = store.access(path).await;
    store.close();
    result
}
