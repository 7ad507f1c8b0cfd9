//! Error types for the dashboard pipeline.
//!
//! Failures fall into two tiers. Search-tier failures (`DashboardError`)
//! abort the collection being loaded. Enrichment-tier failures
//! (`EnrichmentFailed`) are caught per item and only ever logged.

use std::time::Duration;

use thiserror::Error;

/// Transport-level failures talking to the review platform.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The request never produced a response.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The platform answered with a non-success status.
    #[error("{url} returned {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// An item's repository reference is not an API repository URL.
    #[error("not an API repository URL: '{0}'")]
    InvalidRepository(String),

    /// The HTTP client could not be constructed or used.
    #[error("GitHub client error: {0}")]
    Client(String),
}

impl ForgeError {
    /// HTTP status code, when the platform produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ForgeError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors surfaced to the presentation layer.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Identity verification rejected the credential.
    #[error("invalid token: {source}")]
    InvalidCredential {
        #[source]
        source: ForgeError,
    },

    /// No credential was stored or supplied.
    #[error("no token available; run `prhub login` first")]
    MissingCredential,

    /// The caller identity was empty.
    #[error("identity must not be empty")]
    InvalidIdentity,

    /// A top-level search failed; the whole collection is unavailable.
    #[error("search failed for query '{query}': {source}")]
    SearchFailed {
        query: String,
        #[source]
        source: ForgeError,
    },

    /// The caller-level deadline elapsed before aggregation finished.
    #[error("loading pull requests timed out after {0:?}")]
    Timeout(Duration),

    /// The credential store could not be read or written.
    #[error("credential store error: {message}")]
    Store { message: String },
}

impl DashboardError {
    pub(crate) fn store(operation: &str, error: impl std::fmt::Display) -> Self {
        DashboardError::Store {
            message: format!("{operation}: {error}"),
        }
    }

    /// The message shown to an end user.
    ///
    /// Search queries and transport detail stay out of it; `Display` and
    /// the logs carry them.
    pub fn user_message(&self) -> String {
        match self {
            DashboardError::InvalidCredential { .. } => {
                "Invalid token. Make sure it has repo and read:user scopes.".to_string()
            }
            DashboardError::SearchFailed { .. } | DashboardError::Timeout(_) => {
                "Failed to load PRs.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// The offending query of a failed search.
    pub fn query(&self) -> Option<&str> {
        match self {
            DashboardError::SearchFailed { query, .. } => Some(query),
            _ => None,
        }
    }
}

/// A single item's enrichment failed. Never returned to callers; the item is
/// passed through unenriched and this is logged.
#[derive(Debug, Error)]
#[error("enrichment of pull request {item_id} failed: {source}")]
pub struct EnrichmentFailed {
    pub item_id: u64,
    #[source]
    pub source: ForgeError,
}

impl EnrichmentFailed {
    pub fn new(item_id: u64, source: ForgeError) -> Self {
        Self { item_id, source }
    }
}
