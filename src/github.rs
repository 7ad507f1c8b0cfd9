//! GitHub REST implementation of [`Forge`].

use std::time::Duration;

use async_trait::async_trait;
use octocrab::Octocrab;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    config::Config,
    error::ForgeError,
    types::{
        CheckRunList, CombinedStatus, Credential, Forge, Identity, PullRequestDetail,
        PullRequestItem, Repo, Review, SearchResponse,
    },
};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Largest page the search endpoint serves. Only the first page is ever
/// requested, so users with more matches see a truncated list.
pub const SEARCH_PAGE_SIZE: u32 = 100;

const GITHUB_JSON: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("prhub/", env!("CARGO_PKG_VERSION"));

/// Error body GitHub returns alongside non-success statuses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Client for the GitHub REST API.
///
/// Holds no credential: every call is authorised with the credential it is
/// given.
#[derive(Debug, Clone)]
pub struct GitHub {
    client: reqwest::Client,
    api_base: String,
}

impl GitHub {
    pub fn new(config: &Config) -> Result<Self, ForgeError> {
        let api_base = url::Url::parse(&config.api_base)
            .map_err(|error| ForgeError::Client(format!("invalid API URL '{}': {error}", config.api_base)))?
            .as_str()
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| ForgeError::Client(error.to_string()))?;

        Ok(Self { client, api_base })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn get_json<T>(
        &self,
        credential: &Credential,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<T, ForgeError>
    where
        T: DeserializeOwned,
    {
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .bearer_auth(credential.expose())
            .header(ACCEPT, HeaderValue::from_static(GITHUB_JSON))
            .query(query)
            .send()
            .await
            .map_err(|source| ForgeError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ForgeError::Transport {
                url: url.clone(),
                source,
            })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|error| error.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_string());
            return Err(ForgeError::Status {
                url,
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|error| ForgeError::Decode {
            url,
            message: error.to_string(),
        })
    }

    fn octocrab(&self, credential: &Credential) -> Result<Octocrab, ForgeError> {
        Octocrab::builder()
            .personal_token(credential.expose().to_string())
            .add_header(ACCEPT, GITHUB_JSON.to_string())
            .base_uri(self.api_base.as_str())
            .map_err(|error| ForgeError::Client(format!("invalid API URL: {error}")))?
            .build()
            .map_err(|error| ForgeError::Client(format!("build client failed: {error}")))
    }
}

fn map_octocrab_error(route: &str, error: octocrab::Error) -> ForgeError {
    match error {
        octocrab::Error::GitHub { source, .. } => ForgeError::Status {
            url: route.to_string(),
            status: source.status_code.as_u16(),
            message: source.message.clone(),
        },
        other => ForgeError::Client(format!("{route}: {other}")),
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn current_user(&self, credential: &Credential) -> Result<Identity, ForgeError> {
        let octocrab = self.octocrab(credential)?;
        octocrab
            .get::<Identity, _, ()>("/user", None)
            .await
            .map_err(|error| map_octocrab_error("/user", error))
    }

    async fn search_issues(
        &self,
        credential: &Credential,
        query: &str,
    ) -> Result<Vec<PullRequestItem>, ForgeError> {
        let per_page = SEARCH_PAGE_SIZE.to_string();
        let response: SearchResponse = self
            .get_json(
                credential,
                self.endpoint("/search/issues"),
                &[("q", query), ("per_page", per_page.as_str())],
            )
            .await?;

        if response.total_count > response.items.len() as u64 {
            warn!(
                query,
                total = response.total_count,
                shown = response.items.len(),
                "search results truncated to the first page"
            );
        }
        if response.incomplete_results {
            debug!(query, "search reported incomplete results");
        }

        Ok(response.items.into_iter().map(PullRequestItem::from).collect())
    }

    async fn pull_request(
        &self,
        credential: &Credential,
        repo: &Repo,
        number: u64,
    ) -> Result<PullRequestDetail, ForgeError> {
        let url = self.endpoint(&format!("/repos/{repo}/pulls/{number}"));
        self.get_json(credential, url, &[]).await
    }

    async fn reviews(
        &self,
        credential: &Credential,
        repo: &Repo,
        number: u64,
    ) -> Result<Vec<Review>, ForgeError> {
        let url = self.endpoint(&format!("/repos/{repo}/pulls/{number}/reviews"));
        self.get_json(credential, url, &[("per_page", "100")]).await
    }

    async fn combined_status(
        &self,
        credential: &Credential,
        repo: &Repo,
        sha: &str,
    ) -> Result<CombinedStatus, ForgeError> {
        let url = self.endpoint(&format!("/repos/{repo}/commits/{sha}/status"));
        self.get_json(credential, url, &[]).await
    }

    async fn check_runs(
        &self,
        credential: &Credential,
        repo: &Repo,
        sha: &str,
    ) -> Result<CheckRunList, ForgeError> {
        let url = self.endpoint(&format!("/repos/{repo}/commits/{sha}/check-runs"));
        self.get_json(credential, url, &[("per_page", "100")]).await
    }
}
