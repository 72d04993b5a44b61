//! Branch status updates
//!
//! Walks every tracked (pull request, branch) pair that is not yet Merged
//! or Released, runs the [`Detector`] and the [`CiGateway`], and feeds the
//! findings to the branch state machine.

use crate::ci::{CiGateway, PickDetails};
use crate::detector::{Candidate, Detector};
use crate::model::{BranchEvent, BranchStatus, PickPullRequest, PickStatus, RepoRef, Transition};
use crate::store::TrackerState;
use gh_client::GitHubClient;
use std::collections::BTreeSet;

/// A status change on one branch of one pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchTransition {
    pub number: u64,
    pub branch: String,
    pub from: PickStatus,
    pub to: PickStatus,
}

/// Outcome of [`update_branch_statuses`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    pub transitions: Vec<BranchTransition>,
    /// Branches whose candidate CI status changed without a transition
    pub ci_refreshes: usize,
    /// Candidate lookups that failed
    pub errors: usize,
}

impl UpdateSummary {
    fn record(&mut self, number: u64, branch: &str, transition: Transition) {
        match transition {
            Transition::Changed { from, to } => {
                log::info!("#{} {}: {} -> {}", number, branch, from, to);
                self.transitions.push(BranchTransition {
                    number,
                    branch: branch.to_string(),
                    from,
                    to,
                });
            }
            Transition::CiRefreshed => {
                log::debug!("#{} {}: CI status refreshed", number, branch);
                self.ci_refreshes += 1;
            }
            Transition::Unchanged => {}
        }
    }
}

fn resolved(details: PickDetails) -> BranchEvent {
    BranchEvent::CandidateResolved {
        merged: details.merged,
        pick: PickPullRequest::new(details.number, details.title, details.ci_status),
    }
}

/// Advance every open branch of every tracked pull request
///
/// Ignored pull requests are updated too; the flag only hides them from
/// reports and maintenance commands.
pub async fn update_branch_statuses(
    client: &dyn GitHubClient,
    repo: &RepoRef,
    detector: &Detector,
    state: &mut TrackerState,
) -> UpdateSummary {
    let gateway = CiGateway::new(client, repo);
    let mut summary = UpdateSummary::default();

    for number in state.pull_request_numbers() {
        let open: BTreeSet<String> = match state.pull_request(number) {
            Some(pr) => pr
                .branches
                .iter()
                .filter(|(_, branch)| !branch.status().is_protected())
                .map(|(name, _)| name.clone())
                .collect(),
            None => continue,
        };
        if open.is_empty() {
            continue;
        }

        let candidates = detector.detect(client, repo, number, &open).await;

        for branch_name in &open {
            let Some(branch) = state
                .pull_request_mut(number)
                .and_then(|pr| pr.branch_mut(branch_name))
            else {
                continue;
            };

            update_branch(
                &gateway,
                number,
                branch_name,
                branch,
                candidates.get(branch_name),
                &mut summary,
            )
            .await;
        }
    }

    summary
}

async fn update_branch(
    gateway: &CiGateway<'_>,
    number: u64,
    branch_name: &str,
    branch: &mut BranchStatus,
    candidate: Option<&Candidate>,
    summary: &mut UpdateSummary,
) {
    let mut fetched_pick = None;

    match candidate {
        Some(candidate) if candidate.failed => {
            let transition = branch.apply(BranchEvent::AttemptFailed);
            summary.record(number, branch_name, transition);
        }
        Some(Candidate {
            pick_number: Some(pick_number),
            ..
        }) => match gateway.pick_details(*pick_number).await {
            Ok(details) => {
                fetched_pick = Some(details.number);
                let transition = branch.apply(resolved(details));
                summary.record(number, branch_name, transition);
            }
            Err(e) => {
                log::warn!(
                    "Failed to fetch candidate #{} for #{} {}: {:#}",
                    pick_number,
                    number,
                    branch_name,
                    e
                );
                summary.errors += 1;
            }
        },
        _ => {}
    }

    // A Picked branch gets fresh merge and CI state every cycle, even when
    // no detector signal pointed at its candidate this time
    let stored = match (branch.status(), branch.pick()) {
        (PickStatus::Picked, Some(pick)) if Some(pick.number) != fetched_pick => pick.number,
        _ => return,
    };

    match gateway.pick_details(stored).await {
        Ok(details) if details.merged => {
            let transition = branch.apply(resolved(details));
            summary.record(number, branch_name, transition);
        }
        Ok(details) => {
            let transition = branch.apply(BranchEvent::CiRefreshed(details.ci_status));
            summary.record(number, branch_name, transition);
        }
        Err(e) => {
            log::warn!(
                "Failed to refresh candidate #{} for #{} {}: {:#}",
                stored,
                number,
                branch_name,
                e
            );
            summary.errors += 1;
        }
    }
}
