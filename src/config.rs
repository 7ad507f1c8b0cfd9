//! Runtime configuration shared by the client and the aggregator.

use std::{path::PathBuf, time::Duration};

use crate::{github::DEFAULT_API_URL, search::SearchWindows, types::Credential};

/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default deadline for loading one dashboard tab (or all of them).
pub const DEFAULT_AGGREGATE_TIMEOUT: Duration = Duration::from_secs(60);

const STORE_DIR: &str = "prhub";
const STORE_FILE: &str = "credentials.json";

/// Environment variables consulted, in order, when no token is stored.
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// REST API root, e.g. `https://api.github.com`.
    pub api_base: String,
    pub windows: SearchWindows,
    pub request_timeout: Duration,
    pub aggregate_timeout: Duration,
    pub store: StoreLocation,
}

/// Where the token is kept between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreLocation {
    /// The OS keychain.
    #[default]
    Keyring,
    /// A JSON file readable only by the owner.
    File(PathBuf),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_URL.to_string(),
            windows: SearchWindows::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            aggregate_timeout: DEFAULT_AGGREGATE_TIMEOUT,
            store: StoreLocation::default(),
        }
    }
}

/// `prhub/credentials.json` under the platform config directory, or the
/// working directory when there is none.
pub fn default_store_path() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join(STORE_DIR).join(STORE_FILE),
        None => PathBuf::from(format!("{STORE_DIR}-{STORE_FILE}")),
    }
}

/// Token from the environment, used when nothing is stored.
pub fn credential_from_env() -> Option<Credential> {
    TOKEN_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find_map(|token| Credential::new(token).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base, "https://api.github.com");
        assert_eq!(config.windows, SearchWindows::default());
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.store, StoreLocation::Keyring);
    }

    #[test]
    fn test_default_store_path_uses_config_dir() {
        let path = default_store_path();
        match dirs::config_dir() {
            Some(dir) => assert_eq!(path, dir.join("prhub").join("credentials.json")),
            None => assert_eq!(path, PathBuf::from("prhub-credentials.json")),
        }
    }
}
