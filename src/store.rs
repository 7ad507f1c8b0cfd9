//! Credential storage: the only state that outlives a single invocation.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{error::DashboardError, types::Credential};

/// A key-value secret store holding at most one credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> Result<Option<Credential>, DashboardError>;
    async fn set(&self, credential: &Credential) -> Result<(), DashboardError>;
    /// Removing an absent credential is not an error.
    async fn remove(&self) -> Result<(), DashboardError>;
}

/// Keychain service name under which tokens are filed.
pub const KEYRING_SERVICE: &str = "prhub";

/// Keeps the token in the OS keychain, one entry per API root so that
/// GitHub and an Enterprise host do not share a slot.
pub struct KeyringCredentialStore {
    entry: Entry,
    account: String,
}

impl KeyringCredentialStore {
    pub fn new(api_base: &str) -> Result<Self, DashboardError> {
        let account = keyring_account(api_base);
        let entry = Entry::new(KEYRING_SERVICE, &account)
            .map_err(|error| DashboardError::store("open keychain entry", error))?;
        Ok(Self { entry, account })
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

fn keyring_account(api_base: &str) -> String {
    api_base.trim_end_matches('/').to_lowercase()
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn get(&self) -> Result<Option<Credential>, DashboardError> {
        match self.entry.get_password() {
            Ok(token) => Ok(Credential::new(token).ok()),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(DashboardError::store("read credential from keychain", error)),
        }
    }

    async fn set(&self, credential: &Credential) -> Result<(), DashboardError> {
        self.entry
            .set_password(credential.expose())
            .map_err(|error| DashboardError::store("write credential to keychain", error))?;
        debug!(account = %self.account, "stored credential in keychain");
        Ok(())
    }

    async fn remove(&self) -> Result<(), DashboardError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(DashboardError::store("remove credential from keychain", error)),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSecrets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gh_token: Option<String>,
}

/// Stores the credential as JSON in a single file, readable only by the
/// owner on Unix. The file is restricted before any secret is written.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> Result<Option<Credential>, DashboardError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(DashboardError::store("read credential", error)),
        };

        let secrets: StoredSecrets = serde_json::from_slice(&bytes)
            .map_err(|error| DashboardError::store("parse credential file", error))?;

        Ok(secrets
            .gh_token
            .and_then(|token| Credential::new(token).ok()))
    }

    async fn set(&self, credential: &Credential) -> Result<(), DashboardError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| DashboardError::store("create credential directory", error))?;
        }

        let secrets = StoredSecrets {
            gh_token: Some(credential.expose().to_string()),
        };
        let json = serde_json::to_vec_pretty(&secrets)
            .map_err(|error| DashboardError::store("encode credential", error))?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&self.path)
            .await
            .map_err(|error| DashboardError::store("open credential file", error))?;

        // An existing file keeps its old mode through `open`.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|error| DashboardError::store("restrict credential file", error))?;
        }

        file.write_all(&json)
            .await
            .map_err(|error| DashboardError::store("write credential", error))?;
        file.flush()
            .await
            .map_err(|error| DashboardError::store("write credential", error))?;

        debug!(path = %self.path.display(), "stored credential");
        Ok(())
    }

    async fn remove(&self) -> Result<(), DashboardError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(DashboardError::store("remove credential", error)),
        }
    }
}

/// Process-local store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }

    fn with_slot<T>(&self, f: impl FnOnce(&mut Option<Credential>) -> T) -> Result<T, DashboardError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| DashboardError::store("memory store", "lock poisoned"))?;
        Ok(f(&mut slot))
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<Credential>, DashboardError> {
        self.with_slot(|slot| slot.clone())
    }

    async fn set(&self, credential: &Credential) -> Result<(), DashboardError> {
        self.with_slot(|slot| *slot = Some(credential.clone()))
    }

    async fn remove(&self) -> Result<(), DashboardError> {
        self.with_slot(|slot| *slot = None)
    }
}
