//! Maintenance operations on tracked cherry-picks
//!
//! Ignoring pull requests, re-running failed CI of open cherry-picks, and
//! merging cherry-picks whose CI passes. Ignored pull requests are skipped
//! by both forge operations.

use crate::error::{Result, TrackerError};
use crate::model::{BranchEvent, CiState, PickPullRequest, PickStatus, RepoRef, Transition};
use crate::store::TrackerState;
use crate::updater::BranchTransition;
use gh_client::{GitHubClient, MergeMethod};

/// Set or clear the ignored flag of a tracked pull request
///
/// Returns whether the flag changed.
pub fn set_ignored(state: &mut TrackerState, number: u64, ignored: bool) -> Result<bool> {
    let pr = state
        .pull_request_mut(number)
        .ok_or(TrackerError::UnknownPullRequest(number))?;

    if pr.ignored == ignored {
        return Ok(false);
    }
    pr.ignored = ignored;
    log::info!(
        "#{} is now {}",
        number,
        if ignored { "ignored" } else { "tracked" }
    );
    Ok(true)
}

/// An open cherry-pick selected for a maintenance action
struct OpenPick {
    number: u64,
    branch: String,
    pick: PickPullRequest,
}

fn open_picks(state: &TrackerState, ci_status: CiState) -> Vec<OpenPick> {
    state
        .pull_requests()
        .filter(|pr| !pr.ignored)
        .flat_map(|pr| {
            pr.branches.iter().filter_map(move |(name, branch)| {
                let pick = branch.pick()?;
                (branch.status() == PickStatus::Picked && pick.ci_status == ci_status).then(|| {
                    OpenPick {
                        number: pr.number,
                        branch: name.clone(),
                        pick: pick.clone(),
                    }
                })
            })
        })
        .collect()
}

/// Re-run the failed workflow jobs of every cherry-pick with failing CI
///
/// Returns how many workflow runs were restarted. Forge errors are logged
/// and the cherry-pick is skipped.
pub async fn retry_failed_ci(client: &dyn GitHubClient, repo: &RepoRef, state: &TrackerState) -> usize {
    let mut restarted = 0;

    for open in open_picks(state, CiState::Failing) {
        let pr = match client
            .fetch_pull_request(&repo.owner, &repo.name, open.pick.number)
            .await
        {
            Ok(pr) => pr,
            Err(e) => {
                log::warn!("Failed to fetch cherry-pick #{}: {:#}", open.pick.number, e);
                continue;
            }
        };

        let runs = match client
            .fetch_workflow_runs(&repo.owner, &repo.name, &pr.head_sha)
            .await
        {
            Ok(runs) => runs,
            Err(e) => {
                log::warn!(
                    "Failed to list workflow runs of #{}: {:#}",
                    open.pick.number,
                    e
                );
                continue;
            }
        };

        for run in runs.iter().filter(|run| run.is_failed()) {
            match client
                .rerun_failed_jobs(&repo.owner, &repo.name, run.id)
                .await
            {
                Ok(()) => {
                    log::info!(
                        "Re-running '{}' for #{} ({} of #{})",
                        run.name,
                        open.pick.number,
                        open.branch,
                        open.number
                    );
                    restarted += 1;
                }
                Err(e) => log::warn!("Failed to re-run workflow {}: {:#}", run.id, e),
            }
        }
    }

    restarted
}

/// Outcome of [`merge_ready_picks`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub merged: Vec<BranchTransition>,
    /// Merges the forge refused or that failed
    pub errors: usize,
}

/// Squash-merge every cherry-pick whose CI passes
///
/// A successful merge moves the branch from Picked to Merged.
pub async fn merge_ready_picks(
    client: &dyn GitHubClient,
    repo: &RepoRef,
    state: &mut TrackerState,
) -> MergeSummary {
    let mut summary = MergeSummary::default();

    for open in open_picks(state, CiState::Passing) {
        let result = client
            .merge_pull_request(
                &repo.owner,
                &repo.name,
                open.pick.number,
                MergeMethod::Squash,
                None,
                None,
            )
            .await;

        match result {
            Ok(result) if result.merged => {}
            Ok(result) => {
                log::warn!("#{} was not merged: {}", open.pick.number, result.message);
                summary.errors += 1;
                continue;
            }
            Err(e) => {
                log::warn!("Failed to merge #{}: {:#}", open.pick.number, e);
                summary.errors += 1;
                continue;
            }
        }

        let Some(branch) = state
            .pull_request_mut(open.number)
            .and_then(|pr| pr.branch_mut(&open.branch))
        else {
            continue;
        };

        let event = BranchEvent::CandidateResolved {
            pick: open.pick,
            merged: true,
        };
        if let Transition::Changed { from, to } = branch.apply(event) {
            log::info!("#{} {}: merged cherry-pick", open.number, open.branch);
            summary.merged.push(BranchTransition {
                number: open.number,
                branch: open.branch,
                from,
                to,
            });
        }
    }

    summary
}
