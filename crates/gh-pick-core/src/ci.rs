//! CI and merge status of candidate pull requests
//!
//! Two forge signals describe a commit's health: the legacy combined
//! status and the check-run list. Both are filtered to drop DCO checks and
//! then folded into one [`CiState`] by [`aggregate`].

use crate::model::{CiState, RepoRef};
use gh_client::{
    CheckConclusion, CheckRun, CheckRunStatus, CheckState, CheckStatus, GitHubClient,
};

/// Substrings (lowercase) marking a Developer Certificate of Origin check
pub const DCO_CHECK_PATTERNS: &[&str] = &[
    "dco",
    "developer certificate of origin",
    "signed-off-by",
    "sign-off",
    "signoff",
];

/// Whether a status context or check-run name is a DCO check
pub fn is_dco_check(name: &str) -> bool {
    let name = name.to_lowercase();
    DCO_CHECK_PATTERNS
        .iter()
        .any(|pattern| name.contains(pattern))
}

/// Health of the legacy combined status, ignoring DCO contexts
///
/// The forge's own rollup is not used since it still counts DCO contexts.
pub fn combined_state(status: &CheckStatus) -> CiState {
    let states: Vec<CheckState> = status
        .statuses
        .iter()
        .filter(|s| !is_dco_check(&s.context))
        .map(|s| s.state)
        .collect();

    if states.is_empty() {
        CiState::Unknown
    } else if states.contains(&CheckState::Pending) {
        CiState::Pending
    } else if states
        .iter()
        .any(|s| matches!(s, CheckState::Failure | CheckState::Error))
    {
        CiState::Failing
    } else {
        CiState::Passing
    }
}

/// Health of the check-run list, ignoring DCO checks
pub fn check_runs_state(runs: &[CheckRun]) -> CiState {
    let runs: Vec<&CheckRun> = runs.iter().filter(|r| !is_dco_check(&r.name)).collect();

    if runs.is_empty() {
        return CiState::Unknown;
    }

    if runs.iter().any(|r| r.status != CheckRunStatus::Completed) {
        return CiState::Pending;
    }

    let failed = runs.iter().any(|r| {
        matches!(
            r.conclusion,
            Some(
                CheckConclusion::Failure
                    | CheckConclusion::TimedOut
                    | CheckConclusion::Cancelled
                    | CheckConclusion::ActionRequired
            )
        )
    });

    if failed {
        CiState::Failing
    } else {
        CiState::Passing
    }
}

/// Fold the (combined, check-runs) pair into one state
///
/// Pending wins over everything, failing wins over passing, two passing
/// signals pass, and any other pair falls back to the combined value.
pub fn aggregate(combined: CiState, check_runs: CiState) -> CiState {
    match (combined, check_runs) {
        (CiState::Pending, _) | (_, CiState::Pending) => CiState::Pending,
        (CiState::Failing, _) | (_, CiState::Failing) => CiState::Failing,
        (CiState::Passing, CiState::Passing) => CiState::Passing,
        (combined, _) => combined,
    }
}

/// A candidate pull request as the forge currently sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickDetails {
    pub number: u64,
    pub title: String,
    pub merged: bool,
    pub head_sha: String,
    pub ci_status: CiState,
}

/// Resolves merge and CI state for candidate pull requests
pub struct CiGateway<'a> {
    client: &'a dyn GitHubClient,
    repo: &'a RepoRef,
}

impl<'a> CiGateway<'a> {
    pub fn new(client: &'a dyn GitHubClient, repo: &'a RepoRef) -> Self {
        Self { client, repo }
    }

    /// Aggregated CI state of a commit
    ///
    /// A signal that cannot be fetched counts as unknown.
    pub async fn commit_ci_state(&self, sha: &str) -> CiState {
        let combined = match self
            .client
            .fetch_commit_status(&self.repo.owner, &self.repo.name, sha)
            .await
        {
            Ok(status) => combined_state(&status),
            Err(e) => {
                log::warn!("Failed to fetch combined status for {}: {:#}", sha, e);
                CiState::Unknown
            }
        };

        let check_runs = match self
            .client
            .fetch_check_runs(&self.repo.owner, &self.repo.name, sha)
            .await
        {
            Ok(runs) => check_runs_state(&runs),
            Err(e) => {
                log::warn!("Failed to fetch check runs for {}: {:#}", sha, e);
                CiState::Unknown
            }
        };

        let state = aggregate(combined, check_runs);
        log::debug!(
            "CI for {}: combined={:?} checks={:?} -> {:?}",
            sha,
            combined,
            check_runs,
            state
        );
        state
    }

    /// Fetch a candidate's merge state, title and CI state
    pub async fn pick_details(&self, number: u64) -> anyhow::Result<PickDetails> {
        let pr = self
            .client
            .fetch_pull_request(&self.repo.owner, &self.repo.name, number)
            .await?;
        let ci_status = self.commit_ci_state(&pr.head_sha).await;

        Ok(PickDetails {
            number: pr.number,
            title: pr.title,
            merged: pr.merged,
            head_sha: pr.head_sha,
            ci_status,
        })
    }
}
