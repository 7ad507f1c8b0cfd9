use std::{collections::HashSet, future::Future, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    enrich::{enrich_all_authored, enrich_all_merged, enrich_all_reviews},
    error::DashboardError,
    search::{DashboardQueries, SearchWindows},
    types::{Credential, Dashboard, Forge, Identity, PullRequestItem},
};

/// Who the dashboard is for and which windows bound its searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub login: String,
    pub windows: SearchWindows,
    /// Reference instant for the trailing windows.
    pub now: DateTime<Utc>,
}

impl QuerySpec {
    /// Rejects an empty identity before any query is built.
    pub fn new(login: impl Into<String>) -> Result<Self, DashboardError> {
        let login = login.into().trim().to_string();
        if login.is_empty() {
            return Err(DashboardError::InvalidIdentity);
        }
        Ok(Self {
            login,
            windows: SearchWindows::default(),
            now: Utc::now(),
        })
    }

    pub fn for_identity(identity: &Identity) -> Result<Self, DashboardError> {
        Self::new(identity.login.clone())
    }

    pub fn with_windows(mut self, windows: SearchWindows) -> Self {
        self.windows = windows;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn queries(&self) -> DashboardQueries {
        DashboardQueries::build(&self.login, &self.windows, self.now)
    }
}

/// Runs one search. Any failure is fatal for the collection it feeds and
/// carries the offending query; nothing is retried.
pub async fn search<F>(
    forge: &F,
    credential: &Credential,
    query: &str,
) -> Result<Vec<PullRequestItem>, DashboardError>
where
    F: Forge + ?Sized,
{
    match forge.search_issues(credential, query).await {
        Ok(items) => {
            debug!(query, count = items.len(), "search complete");
            Ok(items)
        }
        Err(source) => {
            warn!(query, error = %source, "search failed");
            Err(DashboardError::SearchFailed {
                query: query.to_string(),
                source,
            })
        }
    }
}

/// Concatenates two result sets, keeping the first occurrence of each
/// identity in first-seen order.
pub fn merge_unique(
    first: Vec<PullRequestItem>,
    second: Vec<PullRequestItem>,
) -> Vec<PullRequestItem> {
    let mut seen = HashSet::with_capacity(first.len() + second.len());
    first
        .into_iter()
        .chain(second)
        .filter(|item| seen.insert(item.id))
        .collect()
}

/// Open pull requests the caller authored, with review tallies and checks.
pub async fn fetch_authored<F>(
    forge: &F,
    credential: &Credential,
    spec: &QuerySpec,
) -> Result<Vec<PullRequestItem>, DashboardError>
where
    F: Forge + ?Sized,
{
    let queries = spec.queries();
    let items = search(forge, credential, &queries.authored).await?;
    Ok(enrich_all_authored(forge, credential, items).await)
}

/// Open pull requests where the caller's review was requested or given,
/// with the caller's own verdict.
pub async fn fetch_reviews<F>(
    forge: &F,
    credential: &Credential,
    spec: &QuerySpec,
) -> Result<Vec<PullRequestItem>, DashboardError>
where
    F: Forge + ?Sized,
{
    let queries = spec.queries();
    let (requested, reviewed) = futures::try_join!(
        search(forge, credential, &queries.review_requested),
        search(forge, credential, &queries.reviewed_by)
    )?;

    let candidates = merge_unique(requested, reviewed);
    Ok(enrich_all_reviews(forge, credential, candidates, &spec.login).await)
}

/// Pull requests the caller authored that merged within the window.
pub async fn fetch_merged<F>(
    forge: &F,
    credential: &Credential,
    spec: &QuerySpec,
) -> Result<Vec<PullRequestItem>, DashboardError>
where
    F: Forge + ?Sized,
{
    let queries = spec.queries();
    let items = search(forge, credential, &queries.merged).await?;
    Ok(enrich_all_merged(forge, credential, items).await)
}

/// Loads every tab in one call.
///
/// All four searches run concurrently and any failure fails the whole
/// call. Enrichment of the three collections then runs concurrently and
/// never fails.
pub async fn aggregate<F>(
    forge: &F,
    credential: &Credential,
    spec: &QuerySpec,
) -> Result<Dashboard, DashboardError>
where
    F: Forge + ?Sized,
{
    let queries = spec.queries();

    let (authored, requested, reviewed, merged) = futures::try_join!(
        search(forge, credential, &queries.authored),
        search(forge, credential, &queries.review_requested),
        search(forge, credential, &queries.reviewed_by),
        search(forge, credential, &queries.merged)
    )?;

    let review_candidates = merge_unique(requested, reviewed);

    let (authored, reviews, merged) = futures::join!(
        enrich_all_authored(forge, credential, authored),
        enrich_all_reviews(forge, credential, review_candidates, &spec.login),
        enrich_all_merged(forge, credential, merged)
    );

    Ok(Dashboard {
        authored,
        reviews,
        merged,
    })
}

/// Bounds a load with a deadline. In-flight requests are dropped when it
/// elapses; no state survives them.
pub async fn within<T, Fut>(timeout: Duration, load: Fut) -> Result<T, DashboardError>
where
    Fut: Future<Output = Result<T, DashboardError>>,
{
    match tokio::time::timeout(timeout, load).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?timeout, "dashboard load timed out");
            Err(DashboardError::Timeout(timeout))
        }
    }
}

pub async fn aggregate_within<F>(
    timeout: Duration,
    forge: &F,
    credential: &Credential,
    spec: &QuerySpec,
) -> Result<Dashboard, DashboardError>
where
    F: Forge + ?Sized,
{
    within(timeout, aggregate(forge, credential, spec)).await
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn item(id: u64, title: &str) -> PullRequestItem {
        PullRequestItem {
            id,
            number: id,
            title: title.to_string(),
            html_url: format!("https://github.com/o/r/pull/{id}"),
            repository_url: "https://api.github.com/repos/o/r".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
            comments: 0,
            user: None,
            merged_at: None,
            check_status: None,
            approvals: None,
            changes_requested: None,
            total_comments: None,
            my_review_status: None,
            base_ref: None,
        }
    }

    fn ids(items: &[PullRequestItem]) -> Vec<u64> {
        items.iter().map(|item| item.id).collect()
    }

    #[test]
    fn test_merge_unique_keeps_first_seen_order() {
        let merged = merge_unique(
            vec![item(3, "c"), item(1, "a")],
            vec![item(2, "b"), item(3, "c-again"), item(4, "d")],
        );

        assert_eq!(ids(&merged), vec![3, 1, 2, 4]);
        assert_eq!(merged[0].title, "c");
    }

    #[test]
    fn test_merge_unique_removes_duplicates_within_one_input() {
        let merged = merge_unique(vec![item(1, "a"), item(1, "a2")], vec![]);
        assert_eq!(ids(&merged), vec![1]);
        assert_eq!(merged[0].title, "a");
    }

    #[test]
    fn test_merge_unique_bounds() {
        let first: Vec<_> = (0..20).map(|i| item(i % 7, "x")).collect();
        let second: Vec<_> = (0..15).map(|i| item(i % 11, "y")).collect();
        let total = first.len() + second.len();

        let merged = merge_unique(first, second);
        let unique: HashSet<u64> = merged.iter().map(|item| item.id).collect();

        assert!(merged.len() <= total);
        assert_eq!(unique.len(), merged.len());
        assert_eq!(ids(&merged), vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_query_spec_rejects_empty_login() {
        assert!(matches!(
            QuerySpec::new(""),
            Err(DashboardError::InvalidIdentity)
        ));
        assert!(matches!(
            QuerySpec::new("  "),
            Err(DashboardError::InvalidIdentity)
        ));
    }

    #[test]
    fn test_query_spec_trims_login() {
        let spec = QuerySpec::new(" alice\n").unwrap();
        assert_eq!(spec.login, "alice");
        assert_eq!(spec.queries().authored, "type:pr author:alice is:open");
    }

    #[test]
    fn test_query_spec_queries_use_reference_instant() {
        let spec = QuerySpec::new("alice")
            .unwrap()
            .at(Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap())
            .with_windows(SearchWindows {
                review_days: 7,
                merged_days: 7,
            });

        let queries = spec.queries();
        assert_eq!(queries.authored, "type:pr author:alice is:open");
        assert!(queries.review_requested.ends_with("created:>2026-10-09"));
        assert!(queries.merged.ends_with("merged:>2026-10-09"));
    }

    #[tokio::test]
    async fn test_within_times_out() {
        let result: Result<(), DashboardError> = within(Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(DashboardError::Timeout(_))));
    }
}
