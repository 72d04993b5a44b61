//! GitHub client trait
//!
//! This module defines the `GitHubClient` trait: every forge operation the
//! tracker needs. The tracker core only ever talks to this trait, so tests
//! can substitute an in-memory implementation.

use crate::types::{
    CheckRun, CheckStatus, Commit, IssueComment, MergeMethod, MergeResult, PullRequest,
    PullRequestQuery, PullRequestSummary, Release, Tag, User, WorkflowRun,
};
use async_trait::async_trait;

/// GitHub API client trait
///
/// Defines the interface for interacting with the GitHub API.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow sharing across
/// async tasks and threads.
///
/// # Example
///
/// ```rust,ignore
/// use gh_client::{GitHubClient, PullRequest};
///
/// async fn show(client: &dyn GitHubClient) -> anyhow::Result<PullRequest> {
///     client.fetch_pull_request("rust-lang", "rust", 1).await
/// }
/// ```
#[async_trait]
pub trait GitHubClient: Send + Sync {
    // === Labels ===

    /// Fetch the names of all labels defined in a repository
    async fn fetch_repository_labels(&self, owner: &str, repo: &str)
        -> anyhow::Result<Vec<String>>;

    /// Fetch the names of the labels attached to an issue or pull request
    async fn fetch_issue_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> anyhow::Result<Vec<String>>;

    // === Pull requests ===

    /// Search pull requests
    ///
    /// # Arguments
    ///
    /// * `owner` - Repository owner (user or organization)
    /// * `repo` - Repository name
    /// * `query` - Merge state, base branch, labels (OR) and title filters
    ///
    /// # Returns
    ///
    /// Every matching pull request across all result pages.
    async fn search_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        query: &PullRequestQuery,
    ) -> anyhow::Result<Vec<PullRequestSummary>>;

    /// Fetch a single pull request by number
    ///
    /// Includes the merge state, head SHA and base branch, which the
    /// search endpoint does not return.
    async fn fetch_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<PullRequest>;

    /// Merge a pull request
    ///
    /// # Arguments
    ///
    /// * `owner` - Repository owner
    /// * `repo` - Repository name
    /// * `pr_number` - Pull request number
    /// * `merge_method` - How to merge (merge commit, squash, or rebase)
    /// * `commit_title` - Optional custom commit title
    /// * `commit_message` - Optional custom commit message
    async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        merge_method: MergeMethod,
        commit_title: Option<&str>,
        commit_message: Option<&str>,
    ) -> anyhow::Result<MergeResult>;

    // === Comments ===

    /// Fetch all conversation comments on an issue or pull request, oldest first
    async fn fetch_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> anyhow::Result<Vec<IssueComment>>;

    /// Create a conversation comment, returning it
    async fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> anyhow::Result<IssueComment>;

    /// Replace the body of an existing conversation comment
    async fn update_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> anyhow::Result<IssueComment>;

    /// Fetch the user the client is authenticated as
    async fn fetch_current_user(&self) -> anyhow::Result<User>;

    // === CI ===

    /// Fetch CI check runs for a specific commit
    async fn fetch_check_runs(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> anyhow::Result<Vec<CheckRun>>;

    /// Fetch combined commit status
    ///
    /// This uses the legacy Status API which some CI systems still use
    /// (as opposed to the newer Checks API).
    async fn fetch_commit_status(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> anyhow::Result<CheckStatus>;

    /// Fetch workflow runs for a commit
    async fn fetch_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        head_sha: &str,
    ) -> anyhow::Result<Vec<WorkflowRun>>;

    /// Rerun failed workflow jobs for a specific run
    async fn rerun_failed_jobs(&self, owner: &str, repo: &str, run_id: u64) -> anyhow::Result<()>;

    // === Tags, releases and history ===

    /// Fetch all tags of a repository
    async fn fetch_tags(&self, owner: &str, repo: &str) -> anyhow::Result<Vec<Tag>>;

    /// Fetch all releases of a repository, newest first
    async fn fetch_releases(&self, owner: &str, repo: &str) -> anyhow::Result<Vec<Release>>;

    /// Fetch the commits reachable from `head` but not from `base`
    ///
    /// `head` is inclusive, `base` exclusive.
    async fn compare_commits(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> anyhow::Result<Vec<Commit>>;

    /// Fetch the history of a ref, newest first
    async fn fetch_commits(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> anyhow::Result<Vec<Commit>>;
}
