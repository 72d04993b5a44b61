//! GitHub API data transfer objects
//!
//! These types represent the data returned from the GitHub API.
//! They are intentionally separate from the tracker's domain model
//! to keep this crate pure and reusable.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A pull request from the GitHub API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number (e.g., 123)
    pub number: u64,

    /// PR title
    pub title: String,

    /// PR body/description
    pub body: Option<String>,

    /// Author's GitHub username
    pub author: String,

    /// Open or closed
    pub state: IssueState,

    /// Whether the PR has been merged
    pub merged: bool,

    /// When the PR was merged
    pub merged_at: Option<DateTime<Utc>>,

    /// SHA of the merge (or squash) commit
    pub merge_commit_sha: Option<String>,

    /// HEAD commit SHA
    pub head_sha: String,

    /// Base branch name (e.g., "main")
    pub base_branch: String,

    /// HEAD branch name (e.g., "feature/foo")
    pub head_branch: String,

    /// Label names currently attached to the PR
    pub labels: Vec<String>,

    /// PR URL for opening in browser
    pub html_url: String,
}

/// A pull request as returned by the search API
///
/// Search results carry no branch information; fetch the full
/// [`PullRequest`] when the base branch is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    pub state: IssueState,
    pub labels: Vec<String>,
    pub html_url: String,
}

/// Open/closed state shared by issues and pull requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    #[default]
    Open,
    Closed,
}

/// Search filter for pull requests
///
/// Renders to a GitHub search string via [`PullRequestQuery::to_search_string`].
/// Labels are OR-combined; title terms must all appear in the title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestQuery {
    /// `Some(true)` for merged only, `Some(false)` for unmerged only
    pub merged: Option<bool>,
    /// Base branch filter
    pub base_branch: Option<String>,
    /// Label names, any of which must be present
    pub labels: Vec<String>,
    /// Terms that must appear in the title
    pub title_terms: Vec<String>,
    /// Lower bound on the merge date (merged queries) or update date
    pub since: Option<NaiveDate>,
}

impl PullRequestQuery {
    pub fn merged() -> Self {
        Self {
            merged: Some(true),
            ..Self::default()
        }
    }

    pub fn with_base_branch(mut self, branch: impl Into<String>) -> Self {
        self.base_branch = Some(branch.into());
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_title_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.title_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn since(mut self, date: NaiveDate) -> Self {
        self.since = Some(date);
        self
    }

    /// Build the `q` parameter for the issue search endpoint
    pub fn to_search_string(&self, owner: &str, repo: &str) -> String {
        let mut parts = vec![format!("repo:{}/{}", owner, repo), "is:pr".to_string()];

        match self.merged {
            Some(true) => parts.push("is:merged".to_string()),
            Some(false) => parts.push("is:unmerged".to_string()),
            None => {}
        }

        if let Some(base) = &self.base_branch {
            parts.push(format!("base:{}", base));
        }

        if !self.labels.is_empty() {
            let labels: Vec<String> = self.labels.iter().map(|l| format!("\"{}\"", l)).collect();
            parts.push(format!("label:{}", labels.join(",")));
        }

        if !self.title_terms.is_empty() {
            parts.push("in:title".to_string());
            parts.extend(self.title_terms.iter().cloned());
        }

        if let Some(date) = self.since {
            let qualifier = if self.merged == Some(true) {
                "merged"
            } else {
                "updated"
            };
            parts.push(format!("{}:>={}", qualifier, date.format("%Y-%m-%d")));
        }

        parts.join(" ")
    }
}

/// A comment on an issue or pull request conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    pub body: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// The user the client is authenticated as
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

/// A git tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    /// SHA of the tagged commit
    pub sha: String,
}

/// A published (or draft) release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub id: u64,
    /// Tag the release points at (e.g., "v3.6.2")
    pub tag_name: String,
    pub name: Option<String>,
    pub draft: bool,
    pub prerelease: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// A commit with its full message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
}

/// A CI check run from the GitHub API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRun {
    /// Check run ID
    pub id: u64,

    /// Name of the check (e.g., "build", "test")
    pub name: String,

    /// Current status
    pub status: CheckRunStatus,

    /// Conclusion (only set when status is Completed)
    pub conclusion: Option<CheckConclusion>,

    /// URL to the check run details
    pub details_url: Option<String>,

    /// When the check started
    pub started_at: Option<DateTime<Utc>>,

    /// When the check completed
    pub completed_at: Option<DateTime<Utc>>,
}

/// Status of a check run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRunStatus {
    /// Check is queued
    Queued,
    /// Check is in progress
    InProgress,
    /// Check has completed
    Completed,
}

/// Conclusion of a completed check run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    /// Check passed
    Success,
    /// Check failed
    Failure,
    /// Check was neutral (neither success nor failure)
    Neutral,
    /// Check was cancelled
    Cancelled,
    /// Check was skipped
    Skipped,
    /// Check timed out
    TimedOut,
    /// Action is required from the user
    ActionRequired,
    /// Check is stale (superseded by newer run)
    Stale,
}

/// Combined commit status from the GitHub API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckStatus {
    /// Overall state combining all statuses
    pub state: CheckState,

    /// Total number of status checks
    pub total_count: u64,

    /// Individual statuses
    pub statuses: Vec<CommitStatus>,
}

/// Overall state of combined commit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    /// All checks passed
    Success,
    /// At least one check is pending
    Pending,
    /// At least one check failed
    Failure,
    /// Error retrieving status
    Error,
}

/// Individual commit status (from the Status API, not Checks API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitStatus {
    /// Status context (e.g., "ci/circleci")
    pub context: String,

    /// Current state
    pub state: CheckState,

    /// Description of the status
    pub description: Option<String>,

    /// URL for more details
    pub target_url: Option<String>,
}

/// Merge method for pull requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMethod {
    /// Create a merge commit
    Merge,
    /// Squash all commits into one
    #[default]
    Squash,
    /// Rebase commits onto the base branch
    Rebase,
}

/// Result of a merge operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    /// Whether the merge was successful
    pub merged: bool,
    /// Commit SHA of the merge commit (if successful)
    pub sha: Option<String>,
    /// Message from the merge operation
    pub message: String,
}

/// A GitHub Actions workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Workflow run ID
    pub id: u64,
    /// Name of the workflow
    pub name: String,
    /// Status of the run
    pub status: WorkflowRunStatus,
    /// Conclusion (only set when completed)
    pub conclusion: Option<WorkflowRunConclusion>,
    /// HEAD SHA the workflow ran on
    pub head_sha: String,
    /// URL to view the workflow run
    pub html_url: String,
}

impl WorkflowRun {
    /// Whether the run concluded in a way that re-running failed jobs can fix
    pub fn is_failed(&self) -> bool {
        matches!(
            self.conclusion,
            Some(WorkflowRunConclusion::Failure | WorkflowRunConclusion::TimedOut)
        )
    }
}

/// Status of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunStatus {
    /// Workflow is queued
    Queued,
    /// Workflow is waiting
    Waiting,
    /// Workflow is in progress
    InProgress,
    /// Workflow has completed
    Completed,
    /// Workflow is pending
    Pending,
}

/// Conclusion of a completed workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunConclusion {
    /// Workflow succeeded
    Success,
    /// Workflow failed
    Failure,
    /// Workflow was neutral
    Neutral,
    /// Workflow was cancelled
    Cancelled,
    /// Workflow was skipped
    Skipped,
    /// Workflow timed out
    TimedOut,
    /// Action required
    ActionRequired,
    /// Workflow is stale
    Stale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_label_query() {
        let query = PullRequestQuery::merged()
            .with_base_branch("main")
            .with_labels(["cherry-pick/3.6", "cherry-pick/3.7"])
            .since(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());

        assert_eq!(
            query.to_search_string("octo", "repo"),
            "repo:octo/repo is:pr is:merged base:main \
             label:\"cherry-pick/3.6\",\"cherry-pick/3.7\" merged:>=2024-01-15"
        );
    }

    #[test]
    fn test_title_query_without_merge_filter() {
        let query = PullRequestQuery::default().with_title_terms(["cherry-pick", "123"]);

        assert_eq!(
            query.to_search_string("octo", "repo"),
            "repo:octo/repo is:pr in:title cherry-pick 123"
        );
    }

    #[test]
    fn test_unmerged_since_uses_updated_qualifier() {
        let query = PullRequestQuery {
            merged: Some(false),
            since: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..PullRequestQuery::default()
        };

        assert_eq!(
            query.to_search_string("o", "r"),
            "repo:o/r is:pr is:unmerged updated:>=2024-03-01"
        );
    }

    #[test]
    fn test_workflow_run_is_failed() {
        let mut run = WorkflowRun {
            id: 1,
            name: "ci".to_string(),
            status: WorkflowRunStatus::Completed,
            conclusion: Some(WorkflowRunConclusion::Failure),
            head_sha: "abc".to_string(),
            html_url: String::new(),
        };
        assert!(run.is_failed());

        run.conclusion = Some(WorkflowRunConclusion::TimedOut);
        assert!(run.is_failed());

        run.conclusion = Some(WorkflowRunConclusion::Cancelled);
        assert!(!run.is_failed());

        run.conclusion = None;
        assert!(!run.is_failed());
    }

    #[test]
    fn test_issue_state_serde() {
        assert_eq!(serde_json::to_string(&IssueState::Open).unwrap(), "\"open\"");
        assert_eq!(
            serde_json::from_str::<IssueState>("\"closed\"").unwrap(),
            IssueState::Closed
        );
    }
}
