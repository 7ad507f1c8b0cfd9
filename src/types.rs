use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, ForgeError};

/// Prefix carried by classic personal access tokens.
pub const CLASSIC_TOKEN_PREFIX: &str = "ghp_";

/// Opaque bearer secret authorising API calls on behalf of one identity.
///
/// The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Result<Self, DashboardError> {
        let raw = raw.into();
        let token = raw.trim();
        if token.is_empty() {
            return Err(DashboardError::MissingCredential);
        }
        Ok(Self(token.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_classic_token(&self) -> bool {
        self.0.starts_with(CLASSIC_TOKEN_PREFIX)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// A platform account: the subject of authored/review/merged queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// Repository reference in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    pub owner: String,
    pub name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, ForgeError> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() || name.is_empty() || owner.contains('/') || name.contains('/') {
            return Err(ForgeError::InvalidRepository(format!("{owner}/{name}")));
        }
        Ok(Self { owner, name })
    }

    /// Parses an API repository URL such as
    /// `https://api.github.com/repos/owner/name`.
    ///
    /// The `repos` segment is located from the end so APIs mounted under a
    /// path prefix (`/api/v3/repos/...`) parse too.
    pub fn from_repository_url(repository_url: &str) -> Result<Self, ForgeError> {
        let invalid = || ForgeError::InvalidRepository(repository_url.to_string());

        let url = url::Url::parse(repository_url).map_err(|_| invalid())?;
        let segments: Vec<&str> = url
            .path_segments()
            .ok_or_else(invalid)?
            .filter(|segment| !segment.is_empty())
            .collect();

        match segments.iter().rposition(|segment| *segment == "repos") {
            Some(index) if segments.len() == index + 3 => {
                Repo::new(segments[index + 1], segments[index + 2]).map_err(|_| invalid())
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Tri-state summary of a commit's CI signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Failure,
    Pending,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Success => "success",
            CheckStatus::Failure => "failure",
            CheckStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller's own latest verdict on a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Approved,
    ChangesRequested,
    Commented,
    /// No qualifying review from the caller yet.
    Pending,
}

impl ReviewStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewStatus::Approved => "Approved",
            ReviewStatus::ChangesRequested => "Changes requested",
            ReviewStatus::Commented => "Commented",
            ReviewStatus::Pending => "Pending review",
        }
    }
}

/// State of a single review submission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Unknown,
}

/// A pull request as listed by search, plus optional enrichment.
///
/// Base fields come from the search step and are never rewritten.
/// Enrichment fields stay `None` until an enrichment procedure succeeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestItem {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub repository_url: String,
    pub created_at: DateTime<Utc>,
    /// Issue-comment count from search.
    pub comments: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_status: Option<CheckStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approvals: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes_requested: Option<u32>,
    /// Issue comments plus review comments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_comments: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_review_status: Option<ReviewStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_ref: Option<String>,
}

impl PullRequestItem {
    pub fn repo(&self) -> Result<Repo, ForgeError> {
        Repo::from_repository_url(&self.repository_url)
    }

    /// `owner/name` for display, falling back to the raw reference.
    pub fn repo_label(&self) -> String {
        self.repo()
            .map(|repo| repo.to_string())
            .unwrap_or_else(|_| self.repository_url.clone())
    }

    pub fn author_login(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.login.as_str())
    }
}

impl From<SearchItem> for PullRequestItem {
    fn from(item: SearchItem) -> Self {
        PullRequestItem {
            id: item.id,
            number: item.number,
            title: item.title,
            html_url: item.html_url,
            repository_url: item.repository_url,
            created_at: item.created_at,
            comments: item.comments,
            user: item.user,
            merged_at: item.pull_request.and_then(|links| links.merged_at),
            check_status: None,
            approvals: None,
            changes_requested: None,
            total_comments: None,
            my_review_status: None,
            base_ref: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub repository_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub user: Option<Identity>,
    #[serde(default)]
    pub pull_request: Option<SearchPullRequestLinks>,
}

#[derive(Debug, Deserialize)]
pub struct SearchPullRequestLinks {
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

/// `GET /repos/{repo}/pulls/{number}`, reduced to the fields we read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestDetail {
    #[serde(default)]
    pub head: Option<CommitRef>,
    #[serde(default)]
    pub base: Option<BranchRef>,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub review_comments: u64,
}

impl PullRequestDetail {
    pub fn head_sha(&self) -> Option<&str> {
        self.head
            .as_ref()
            .map(|head| head.sha.as_str())
            .filter(|sha| !sha.is_empty())
    }

    pub fn base_ref(&self) -> Option<&str> {
        self.base
            .as_ref()
            .map(|base| base.ref_name.as_str())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitRef {
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref", default)]
    pub ref_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub state: ReviewState,
    #[serde(default)]
    pub user: Option<Identity>,
}

impl Review {
    /// Reviews from deleted accounts carry no user.
    pub fn login(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.login.as_str())
    }
}

/// Combined commit status state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Success,
    Pending,
    Failure,
    Error,
    #[serde(other)]
    Unknown,
}

/// `GET /repos/{repo}/commits/{sha}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct CombinedStatus {
    pub state: CheckState,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRunStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    Pending,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Stale,
    StartupFailure,
    #[serde(other)]
    Unknown,
}

impl CheckConclusion {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CheckConclusion::Failure | CheckConclusion::TimedOut | CheckConclusion::Cancelled
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRun {
    pub status: CheckRunStatus,
    #[serde(default)]
    pub conclusion: Option<CheckConclusion>,
}

/// `GET /repos/{repo}/commits/{sha}/check-runs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckRunList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub check_runs: Vec<CheckRun>,
}

/// The three classified collections of one dashboard load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dashboard {
    pub authored: Vec<PullRequestItem>,
    pub reviews: Vec<PullRequestItem>,
    pub merged: Vec<PullRequestItem>,
}

impl Dashboard {
    pub fn review_queue(&self) -> ReviewQueue<'_> {
        ReviewQueue::split(&self.reviews)
    }
}

/// Review-tab items split by whether the caller has reviewed yet.
#[derive(Debug, Default, PartialEq)]
pub struct ReviewQueue<'a> {
    pub pending: Vec<&'a PullRequestItem>,
    pub reviewed: Vec<&'a PullRequestItem>,
}

impl<'a> ReviewQueue<'a> {
    /// Items without a derived verdict are treated as pending.
    pub fn split(items: &'a [PullRequestItem]) -> Self {
        let (pending, reviewed) = items.iter().partition(|item| {
            matches!(item.my_review_status, None | Some(ReviewStatus::Pending))
        });
        ReviewQueue { pending, reviewed }
    }
}

/// The review platform, as seen by the aggregation pipeline.
///
/// Every call carries the credential explicitly; implementations hold no
/// ambient token.
#[async_trait]
pub trait Forge: Send + Sync {
    /// `GET /user`.
    async fn current_user(&self, credential: &Credential) -> Result<Identity, ForgeError>;

    /// One page (at most 100 items) of `GET /search/issues`.
    async fn search_issues(
        &self,
        credential: &Credential,
        query: &str,
    ) -> Result<Vec<PullRequestItem>, ForgeError>;

    async fn pull_request(
        &self,
        credential: &Credential,
        repo: &Repo,
        number: u64,
    ) -> Result<PullRequestDetail, ForgeError>;

    /// Reviews in the platform's (chronological) order.
    async fn reviews(
        &self,
        credential: &Credential,
        repo: &Repo,
        number: u64,
    ) -> Result<Vec<Review>, ForgeError>;

    async fn combined_status(
        &self,
        credential: &Credential,
        repo: &Repo,
        sha: &str,
    ) -> Result<CombinedStatus, ForgeError>;

    async fn check_runs(
        &self,
        credential: &Credential,
        repo: &Repo,
        sha: &str,
    ) -> Result<CheckRunList, ForgeError>;
}
