//! Sign-in lifecycle: verify a credential, keep it, restore it, forget it.

use tracing::{debug, info};

use crate::{
    error::DashboardError,
    store::CredentialStore,
    types::{Credential, Forge, Identity},
};

/// A verified credential together with the identity it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub credential: Credential,
    pub identity: Identity,
}

impl Session {
    pub fn login(&self) -> &str {
        &self.identity.login
    }
}

/// Resolves the identity behind a credential. Any failure, whether a
/// rejected token or an unreachable API, surfaces as an invalid credential.
pub async fn verify_credential<F>(
    forge: &F,
    credential: &Credential,
) -> Result<Identity, DashboardError>
where
    F: Forge + ?Sized,
{
    let identity = forge
        .current_user(credential)
        .await
        .map_err(|source| DashboardError::InvalidCredential { source })?;

    if identity.login.trim().is_empty() {
        return Err(DashboardError::InvalidIdentity);
    }
    Ok(identity)
}

/// Verifies and persists a credential. Nothing is stored if verification
/// fails.
pub async fn login<F, S>(
    forge: &F,
    store: &S,
    credential: Credential,
) -> Result<Session, DashboardError>
where
    F: Forge + ?Sized,
    S: CredentialStore + ?Sized,
{
    let identity = verify_credential(forge, &credential).await?;
    store.set(&credential).await?;
    info!(login = %identity.login, "signed in");
    Ok(Session {
        credential,
        identity,
    })
}

/// Re-verifies a stored credential. A stored credential that no longer
/// verifies is left in place and reported as an error.
pub async fn restore_session<F, S>(
    forge: &F,
    store: &S,
) -> Result<Option<Session>, DashboardError>
where
    F: Forge + ?Sized,
    S: CredentialStore + ?Sized,
{
    let Some(credential) = store.get().await? else {
        debug!("no stored credential");
        return Ok(None);
    };

    let identity = verify_credential(forge, &credential).await?;
    debug!(login = %identity.login, "restored session");
    Ok(Some(Session {
        credential,
        identity,
    }))
}

pub async fn logout<S>(store: &S) -> Result<(), DashboardError>
where
    S: CredentialStore + ?Sized,
{
    store.remove().await?;
    info!("signed out");
    Ok(())
}
