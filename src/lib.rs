//! prhub: a personal pull request dashboard for GitHub.
//!
//! Finds the pull requests that involve the signed-in user (authored, awaiting
//! or carrying their review, recently merged), deduplicates them, and
//! enriches each one with review tallies, comment counts and CI status
//! before handing them to presentation.

pub mod cli;
pub mod config;
pub mod enrich;
pub mod error;
pub mod github;
pub mod query;
pub mod search;
pub mod session;
pub mod store;
pub mod types;

pub use cli::{Command, DisplayMode, DisplayOptions, Invocation, Tab, parse_args};
pub use config::Config;
pub use error::{DashboardError, EnrichmentFailed, ForgeError};
pub use github::GitHub;
pub use query::{
    QuerySpec, aggregate, aggregate_within, fetch_authored, fetch_merged, fetch_reviews,
    merge_unique, within,
};
pub use search::{DashboardQueries, SearchWindows};
pub use session::{Session, login, logout, restore_session, verify_credential};
pub use store::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
};
pub use types::{
    CheckStatus, Credential, Dashboard, Forge, Identity, PullRequestItem, Repo, ReviewQueue,
    ReviewStatus,
};
