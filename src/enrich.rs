//! Per-item enrichment: folds detail, review and CI lookups into the
//! derived status fields of a `PullRequestItem`.
//!
//! Enrichment is best-effort. Each procedure returns a new record built
//! from its input; when a lookup fails the input comes back unchanged (or,
//! for review enrichment, with the `Pending` verdict) and the failure is
//! logged at `debug`.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::debug;

use crate::{
    error::EnrichmentFailed,
    types::{
        CheckRunList, CheckRunStatus, CheckState, CheckStatus, CombinedStatus, Credential, Forge,
        PullRequestItem, Review, ReviewState, ReviewStatus,
    },
};

/// Distinct approvers and changes-requesters after collapsing each
/// reviewer to their latest verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewTally {
    pub approvals: u32,
    pub changes_requested: u32,
}

/// Latest counting verdict per reviewer, in the platform's return order.
///
/// Only `APPROVED` and `CHANGES_REQUESTED` count; a later comment-only
/// review does not replace an earlier approval.
pub fn latest_verdicts(reviews: &[Review]) -> HashMap<&str, ReviewState> {
    let mut latest = HashMap::new();
    for review in reviews {
        if !matches!(
            review.state,
            ReviewState::Approved | ReviewState::ChangesRequested
        ) {
            continue;
        }
        if let Some(login) = review.login() {
            latest.insert(login, review.state);
        }
    }
    latest
}

pub fn tally_verdicts(reviews: &[Review]) -> ReviewTally {
    latest_verdicts(reviews)
        .values()
        .fold(ReviewTally::default(), |mut tally, state| {
            match state {
                ReviewState::Approved => tally.approvals += 1,
                ReviewState::ChangesRequested => tally.changes_requested += 1,
                _ => {}
            }
            tally
        })
}

/// The caller's own latest verdict; `Pending` when they have not reviewed.
pub fn my_review_status(reviews: &[Review], login: &str) -> ReviewStatus {
    reviews
        .iter()
        .filter(|review| review.login() == Some(login))
        .filter_map(|review| match review.state {
            ReviewState::Approved => Some(ReviewStatus::Approved),
            ReviewState::ChangesRequested => Some(ReviewStatus::ChangesRequested),
            ReviewState::Commented => Some(ReviewStatus::Commented),
            _ => None,
        })
        .last()
        .unwrap_or(ReviewStatus::Pending)
}

/// What one CI signal source says on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Pending,
    Success,
    Failure,
}

fn combined_status_signal(status: &CombinedStatus) -> Signal {
    match status.state {
        CheckState::Failure | CheckState::Error => Signal::Failure,
        CheckState::Success => Signal::Success,
        CheckState::Pending | CheckState::Unknown => Signal::Pending,
    }
}

/// A commit with no check runs has nothing resolved yet.
fn check_runs_signal(checks: &CheckRunList) -> Signal {
    let runs = &checks.check_runs;

    if checks.total_count == 0 && runs.is_empty() {
        Signal::Pending
    } else if runs
        .iter()
        .any(|run| run.conclusion.is_some_and(|conclusion| conclusion.is_failure()))
    {
        Signal::Failure
    } else if runs
        .iter()
        .all(|run| run.status == CheckRunStatus::Completed)
    {
        Signal::Success
    } else {
        Signal::Pending
    }
}

/// Derives the tri-state check status of a commit.
///
/// Precedence is failure > pending > success, and `Success` requires both
/// sources to be resolved. A combined status of `pending` with no contexts
/// (the usual state on Actions-only repositories) therefore keeps the
/// commit `Pending` even when every check run passed.
pub fn derive_check_status(status: &CombinedStatus, checks: &CheckRunList) -> CheckStatus {
    match (combined_status_signal(status), check_runs_signal(checks)) {
        (Signal::Failure, _) | (_, Signal::Failure) => CheckStatus::Failure,
        (Signal::Success, Signal::Success) => CheckStatus::Success,
        _ => CheckStatus::Pending,
    }
}

async fn try_enrich_authored<F>(
    forge: &F,
    credential: &Credential,
    item: &PullRequestItem,
) -> Result<PullRequestItem, EnrichmentFailed>
where
    F: Forge + ?Sized,
{
    let failed = |source| EnrichmentFailed::new(item.id, source);
    let repo = item.repo().map_err(failed)?;

    let (detail, reviews) = futures::try_join!(
        forge.pull_request(credential, &repo, item.number),
        forge.reviews(credential, &repo, item.number)
    )
    .map_err(failed)?;

    let tally = tally_verdicts(&reviews);

    let check_status = match detail.head_sha() {
        Some(sha) => {
            let (status, checks) = futures::try_join!(
                forge.combined_status(credential, &repo, sha),
                forge.check_runs(credential, &repo, sha)
            )
            .map_err(failed)?;
            derive_check_status(&status, &checks)
        }
        None => CheckStatus::Pending,
    };

    Ok(PullRequestItem {
        check_status: Some(check_status),
        approvals: Some(tally.approvals),
        changes_requested: Some(tally.changes_requested),
        total_comments: Some(item.comments + detail.review_comments),
        base_ref: detail.base_ref().map(str::to_string),
        ..item.clone()
    })
}

/// Enriches an item the caller authored with review tallies, total
/// comments, target branch and check status.
pub async fn enrich_authored<F>(
    forge: &F,
    credential: &Credential,
    item: PullRequestItem,
) -> PullRequestItem
where
    F: Forge + ?Sized,
{
    match try_enrich_authored(forge, credential, &item).await {
        Ok(enriched) => enriched,
        Err(failure) => {
            debug!(url = %item.html_url, error = %failure, "keeping pull request unenriched");
            item
        }
    }
}

/// Attaches the caller's latest review verdict.
pub async fn enrich_review<F>(
    forge: &F,
    credential: &Credential,
    item: PullRequestItem,
    login: &str,
) -> PullRequestItem
where
    F: Forge + ?Sized,
{
    let reviews = match item.repo() {
        Ok(repo) => forge.reviews(credential, &repo, item.number).await,
        Err(error) => Err(error),
    };

    let verdict = match reviews {
        Ok(reviews) => my_review_status(&reviews, login),
        Err(source) => {
            let failure = EnrichmentFailed::new(item.id, source);
            debug!(url = %item.html_url, error = %failure, "defaulting review verdict to pending");
            ReviewStatus::Pending
        }
    };

    PullRequestItem {
        my_review_status: Some(verdict),
        ..item
    }
}

/// Attaches the target branch of a merged item.
pub async fn fetch_base_ref<F>(
    forge: &F,
    credential: &Credential,
    item: PullRequestItem,
) -> PullRequestItem
where
    F: Forge + ?Sized,
{
    let detail = match item.repo() {
        Ok(repo) => forge.pull_request(credential, &repo, item.number).await,
        Err(error) => Err(error),
    };

    match detail {
        Ok(detail) => match detail.base_ref() {
            Some(base_ref) => PullRequestItem {
                base_ref: Some(base_ref.to_string()),
                ..item
            },
            None => item,
        },
        Err(source) => {
            let failure = EnrichmentFailed::new(item.id, source);
            debug!(url = %item.html_url, error = %failure, "keeping merged pull request without base ref");
            item
        }
    }
}

/// Enriches every item concurrently; output order matches input order.
pub async fn enrich_all_authored<F>(
    forge: &F,
    credential: &Credential,
    items: Vec<PullRequestItem>,
) -> Vec<PullRequestItem>
where
    F: Forge + ?Sized,
{
    join_all(
        items
            .into_iter()
            .map(|item| enrich_authored(forge, credential, item)),
    )
    .await
}

pub async fn enrich_all_reviews<F>(
    forge: &F,
    credential: &Credential,
    items: Vec<PullRequestItem>,
    login: &str,
) -> Vec<PullRequestItem>
where
    F: Forge + ?Sized,
{
    join_all(
        items
            .into_iter()
            .map(|item| enrich_review(forge, credential, item, login)),
    )
    .await
}

pub async fn enrich_all_merged<F>(
    forge: &F,
    credential: &Credential,
    items: Vec<PullRequestItem>,
) -> Vec<PullRequestItem>
where
    F: Forge + ?Sized,
{
    join_all(
        items
            .into_iter()
            .map(|item| fetch_base_ref(forge, credential, item)),
    )
    .await
}
