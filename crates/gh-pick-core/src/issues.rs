//! Per-branch tracker issues
//!
//! A release branch can have a tracker issue where the current cherry-pick
//! report is kept up to date as a single comment.

use crate::error::{Result, TrackerError};
use crate::model::RepoRef;
use crate::store::TrackerState;
use gh_client::{GitHubClient, IssueComment};

pub fn set_tracker_issue(state: &mut TrackerState, branch: &str, issue: u64) {
    log::info!("Tracker issue for {} is #{}", branch, issue);
    state.set_tracker_issue(branch, issue);
}

/// Forget the tracker issue of `branch`, returning it
pub fn clear_tracker_issue(state: &mut TrackerState, branch: &str) -> Result<u64> {
    let issue = state
        .delete_tracker_issue(branch)
        .ok_or_else(|| TrackerError::UnknownBranch(branch.to_string()))?;
    log::info!("Cleared tracker issue #{} of {}", issue, branch);
    Ok(issue)
}

/// Post `body` to the tracker issue of `branch`
///
/// Our own newest comment on the issue is edited in place; without one a
/// new comment is created.
pub async fn publish_tracker_comment(
    client: &dyn GitHubClient,
    repo: &RepoRef,
    state: &TrackerState,
    branch: &str,
    body: &str,
) -> Result<IssueComment> {
    let issue = state
        .tracker_issue(branch)
        .ok_or_else(|| TrackerError::UnknownBranch(branch.to_string()))?;

    let me = client.fetch_current_user().await.map_err(TrackerError::Forge)?;
    let comments = client
        .fetch_issue_comments(&repo.owner, &repo.name, issue)
        .await
        .map_err(TrackerError::Forge)?;

    let own = comments
        .iter()
        .filter(|comment| comment.author.eq_ignore_ascii_case(&me.login))
        .max_by_key(|comment| comment.created_at);

    let comment = match own {
        Some(existing) => {
            log::info!("Updating comment {} on #{}", existing.id, issue);
            client
                .update_issue_comment(&repo.owner, &repo.name, existing.id, body)
                .await
        }
        None => {
            log::info!("Creating report comment on #{}", issue);
            client
                .create_issue_comment(&repo.owner, &repo.name, issue, body)
                .await
        }
    }
    .map_err(TrackerError::Forge)?;

    Ok(comment)
}
