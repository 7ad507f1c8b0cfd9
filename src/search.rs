//! Search-query construction for the dashboard's logical sets.
//!
//! Queries use the platform's issue-search syntax. Building them is pure:
//! the reference instant is passed in, so the same inputs always produce
//! the same strings.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Trailing window, in days, for the review-requested and reviewed-by sets.
pub const DEFAULT_REVIEW_WINDOW_DAYS: u32 = 30;

/// Trailing window, in days, for the recently-merged set.
pub const DEFAULT_MERGED_WINDOW_DAYS: u32 = 7;

/// Longest window the CLI accepts.
pub const MAX_WINDOW_DAYS: u32 = 3650;

/// Pull request states for search queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Open,
    Merged,
}

impl SearchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchState::Open => "open",
            SearchState::Merged => "merged",
        }
    }
}

#[derive(Debug, Default)]
pub struct SearchQueryBuilder {
    terms: Vec<String>,
}

impl SearchQueryBuilder {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn pr_type(&mut self) -> &mut Self {
        self.terms.push("type:pr".to_string());
        self
    }

    pub fn author(&mut self, login: &str) -> &mut Self {
        self.terms.push(format!("author:{}", login));
        self
    }

    pub fn review_requested(&mut self, login: &str) -> &mut Self {
        self.terms.push(format!("review-requested:{}", login));
        self
    }

    pub fn reviewed_by(&mut self, login: &str) -> &mut Self {
        self.terms.push(format!("reviewed-by:{}", login));
        self
    }

    pub fn state(&mut self, state: SearchState) -> &mut Self {
        self.terms.push(format!("is:{}", state.as_str()));
        self
    }

    pub fn created_after(&mut self, date: NaiveDate) -> &mut Self {
        self.terms.push(format!("created:>{}", date));
        self
    }

    pub fn merged_after(&mut self, date: NaiveDate) -> &mut Self {
        self.terms.push(format!("merged:>{}", date));
        self
    }

    pub fn build(&self) -> String {
        self.terms.join(" ")
    }
}

/// Trailing windows bounding the time-limited sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindows {
    pub review_days: u32,
    pub merged_days: u32,
}

impl Default for SearchWindows {
    fn default() -> Self {
        Self {
            review_days: DEFAULT_REVIEW_WINDOW_DAYS,
            merged_days: DEFAULT_MERGED_WINDOW_DAYS,
        }
    }
}

/// First day excluded from a window ending at `now`. Windows reaching past
/// the representable range start at the earliest representable day.
pub fn window_start(now: DateTime<Utc>, days: u32) -> NaiveDate {
    Duration::try_days(i64::from(days))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .date_naive()
}

pub fn authored_query(login: &str) -> String {
    SearchQueryBuilder::new()
        .pr_type()
        .author(login)
        .state(SearchState::Open)
        .build()
}

pub fn review_requested_query(login: &str, since: NaiveDate) -> String {
    SearchQueryBuilder::new()
        .pr_type()
        .review_requested(login)
        .state(SearchState::Open)
        .created_after(since)
        .build()
}

pub fn reviewed_by_query(login: &str, since: NaiveDate) -> String {
    SearchQueryBuilder::new()
        .pr_type()
        .reviewed_by(login)
        .state(SearchState::Open)
        .created_after(since)
        .build()
}

pub fn merged_query(login: &str, since: NaiveDate) -> String {
    SearchQueryBuilder::new()
        .pr_type()
        .author(login)
        .state(SearchState::Merged)
        .merged_after(since)
        .build()
}

/// Every query string issued by one aggregation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardQueries {
    pub authored: String,
    pub review_requested: String,
    pub reviewed_by: String,
    pub merged: String,
}

impl DashboardQueries {
    pub fn build(login: &str, windows: &SearchWindows, now: DateTime<Utc>) -> Self {
        let review_since = window_start(now, windows.review_days);
        let merged_since = window_start(now, windows.merged_days);

        Self {
            authored: authored_query(login),
            review_requested: review_requested_query(login, review_since),
            reviewed_by: reviewed_by_query(login, review_since),
            merged: merged_query(login, merged_since),
        }
    }
}
