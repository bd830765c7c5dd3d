//! Broker credential resolution from Secrets
//!
//! A WorkloadAction may reference a username and a password, each stored under
//! a key of a Secret in the WorkloadAction's namespace. Both references are
//! resolved on every pass; nothing is cached.

use futures::join;
use tracing::debug;

use crate::controller::KubeClient;
use crate::crd::{RabbitCredentials, SecretKeyRef};
use crate::Error;

/// Resolved basic auth credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username sent to the admin API
    pub username: String,
    /// Password sent to the admin API
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Read one key of one Secret, describing the failure as a cause string
async fn lookup(
    kube: &dyn KubeClient,
    namespace: &str,
    field: &str,
    reference: &SecretKeyRef,
) -> Result<String, String> {
    if reference.name.is_empty() || reference.key.is_empty() {
        return Err(format!("{field}: secret reference needs both name and key"));
    }

    let secret = kube
        .get_secret(namespace, &reference.name)
        .await
        .map_err(|e| format!("{field}: failed to get secret {namespace}/{}: {e}", reference.name))?
        .ok_or_else(|| format!("{field}: secret {namespace}/{} not found", reference.name))?;

    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(&reference.key))
        .ok_or_else(|| {
            format!(
                "{field}: key '{}' not found in secret {namespace}/{}",
                reference.key, reference.name
            )
        })?;

    String::from_utf8(bytes.0.clone()).map_err(|_| {
        format!(
            "{field}: key '{}' in secret {namespace}/{} is not valid UTF-8",
            reference.key, reference.name
        )
    })
}

/// Resolve the configured credentials, if any
///
/// `None` means anonymous access and never fails. Otherwise both lookups run
/// and every failing one contributes a cause to
/// [`Error::CredentialsNotFound`].
pub async fn resolve_credentials(
    kube: &dyn KubeClient,
    credentials: Option<&RabbitCredentials>,
    namespace: &str,
) -> Result<Option<Credentials>, Error> {
    let Some(credentials) = credentials else {
        debug!("no credentials configured, using anonymous access");
        return Ok(None);
    };

    let (username, password) = join!(
        lookup(kube, namespace, "username", &credentials.username.secret_ref),
        lookup(kube, namespace, "password", &credentials.password.secret_ref),
    );

    match (username, password) {
        (Ok(username), Ok(password)) => Ok(Some(Credentials { username, password })),
        (username, password) => Err(Error::CredentialsNotFound {
            causes: [username.err(), password.err()].into_iter().flatten().collect(),
        }),
    }
}
