//! Label-driven branch membership
//!
//! The labels on an original pull request decide which release branches it
//! must reach. These functions keep each tracked entry's branch mapping in
//! line with those labels and pick up newly merged labelled pull requests.

use crate::labels::{branches_for_labels, LABEL_PREFIX};
use crate::model::{BranchStatus, RepoRef, TrackedPullRequest};
use crate::store::TrackerState;
use chrono::{DateTime, Duration, Utc};
use gh_client::{GitHubClient, PullRequestQuery};
use std::collections::BTreeMap;

/// Reconcile a branch mapping against the current labels
///
/// Branches implied by a label but missing from the mapping are added as
/// Pending. Branches whose label is gone are removed only while Pending or
/// Failed; anything further along is kept for history. Returns whether the
/// mapping changed.
pub fn sync_branches<I, S>(branches: &mut BTreeMap<String, BranchStatus>, labels: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let wanted = branches_for_labels(labels);
    let mut changed = false;

    for branch in &wanted {
        if !branches.contains_key(branch) {
            branches.insert(branch.clone(), BranchStatus::pending());
            changed = true;
        }
    }

    let before = branches.len();
    branches.retain(|name, status| wanted.contains(name) || !status.status().is_removable());
    changed |= branches.len() != before;

    changed
}

/// Drop every tracked pull request whose branch mapping is empty
///
/// Returns the removed numbers.
pub fn prune_untracked(state: &mut TrackerState) -> Vec<u64> {
    let empty: Vec<u64> = state
        .pull_requests()
        .filter(|pr| pr.branches.is_empty())
        .map(|pr| pr.number)
        .collect();

    for number in &empty {
        state.delete_pull_request(*number);
        log::info!("Stopped tracking #{}: no target branches left", number);
    }

    empty
}

/// Outcome of [`sync_labels`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    /// Pull requests whose branch mapping changed
    pub changed: Vec<u64>,
    /// Pull requests whose labels could not be fetched
    pub errors: usize,
}

/// Re-read the labels of every tracked pull request and reconcile its branches
///
/// A pull request whose labels cannot be fetched is left untouched.
pub async fn sync_labels(
    client: &dyn GitHubClient,
    repo: &RepoRef,
    state: &mut TrackerState,
) -> SyncSummary {
    let mut summary = SyncSummary::default();

    for number in state.pull_request_numbers() {
        let labels = match client
            .fetch_issue_labels(&repo.owner, &repo.name, number)
            .await
        {
            Ok(labels) => labels,
            Err(e) => {
                log::warn!("Failed to fetch labels for #{}: {:#}", number, e);
                summary.errors += 1;
                continue;
            }
        };

        let Some(pr) = state.pull_request_mut(number) else {
            continue;
        };
        if sync_branches(&mut pr.branches, &labels) {
            log::info!(
                "#{} now targets {:?}",
                number,
                pr.branch_names().into_iter().collect::<Vec<_>>()
            );
            summary.changed.push(number);
        }
    }

    summary
}

/// Outcome of [`discover_labelled_pull_requests`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiscoverySummary {
    /// Newly tracked pull requests
    pub added: Vec<u64>,
    /// Already tracked pull requests seen again
    pub refreshed: Vec<u64>,
    /// Whether the search ran and succeeded
    pub searched: bool,
}

/// Start tracking merged pull requests that carry a cherry-pick label
///
/// Searches pull requests merged into `source_branch` since the last fetch
/// (or `lookback_days` before `now` on the first run). The last-fetch
/// timestamp moves to `now` only when the search succeeds.
pub async fn discover_labelled_pull_requests(
    client: &dyn GitHubClient,
    repo: &RepoRef,
    source_branch: &str,
    lookback_days: i64,
    now: DateTime<Utc>,
    state: &mut TrackerState,
) -> DiscoverySummary {
    let mut summary = DiscoverySummary::default();

    let labels = match client
        .fetch_repository_labels(&repo.owner, &repo.name)
        .await
    {
        Ok(labels) => labels,
        Err(e) => {
            log::warn!("Failed to list labels of {}: {:#}", repo, e);
            return summary;
        }
    };

    let pick_labels: Vec<String> = labels
        .into_iter()
        .filter(|label| label.starts_with(LABEL_PREFIX))
        .collect();
    if pick_labels.is_empty() {
        log::debug!("{} has no {}* labels", repo, LABEL_PREFIX);
        return summary;
    }

    let since = state
        .last_fetch()
        .unwrap_or_else(|| now - Duration::days(lookback_days));
    let query = PullRequestQuery::merged()
        .with_base_branch(source_branch)
        .with_labels(pick_labels)
        .since(since.date_naive());

    let hits = match client
        .search_pull_requests(&repo.owner, &repo.name, &query)
        .await
    {
        Ok(hits) => hits,
        Err(e) => {
            log::warn!("Failed to search merged pull requests: {:#}", e);
            return summary;
        }
    };
    summary.searched = true;

    for hit in hits {
        match state.pull_request_mut(hit.number) {
            Some(pr) => {
                pr.title = hit.title;
                sync_branches(&mut pr.branches, &hit.labels);
                summary.refreshed.push(hit.number);
            }
            None => {
                let branches = branches_for_labels(&hit.labels);
                if branches.is_empty() {
                    continue;
                }

                let mut pr = TrackedPullRequest::new(hit.number, hit.title);
                for branch in branches {
                    pr.branches.insert(branch, BranchStatus::pending());
                }
                log::info!(
                    "Tracking #{} for {:?}",
                    pr.number,
                    pr.branch_names().into_iter().collect::<Vec<_>>()
                );
                summary.added.push(pr.number);
                state.set_pull_request(pr);
            }
        }
    }

    state.set_last_fetch(now);
    summary
}
