//! Octocrab-based GitHub API client
//!
//! Direct implementation of the `GitHubClient` trait using the octocrab library.
//! Endpoints octocrab has no typed builder for are reached through raw
//! `get`/`post` calls with local response shapes.

use crate::client::GitHubClient;
use crate::types::{
    CheckConclusion, CheckRun, CheckRunStatus, CheckState, CheckStatus, Commit, CommitStatus,
    IssueComment, IssueState, MergeMethod, MergeResult, PullRequest, PullRequestQuery,
    PullRequestSummary, Release, Tag, User, WorkflowRun, WorkflowRunConclusion,
    WorkflowRunStatus,
};
use anyhow::Context;
use async_trait::async_trait;
use log::{debug, warn};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PER_PAGE: u8 = 100;

/// Upper bound on pages fetched when walking the full history of a ref
const MAX_HISTORY_PAGES: u32 = 10;

/// Upper bound on pages fetched for a single listing (compare, checks, runs)
const MAX_LIST_PAGES: u32 = 30;

/// Whether a paged listing is exhausted after the latest page
///
/// `total` is the item count the endpoint reports, when it reports one.
fn is_last_page(batch_len: usize, fetched: usize, total: Option<u64>) -> bool {
    batch_len < PER_PAGE as usize || total.is_some_and(|total| fetched as u64 >= total)
}

/// Direct GitHub API client using octocrab
#[derive(Debug, Clone)]
pub struct OctocrabClient {
    octocrab: Arc<Octocrab>,
}

impl OctocrabClient {
    /// Create a new client with the given octocrab instance
    pub fn new(octocrab: Arc<Octocrab>) -> Self {
        Self { octocrab }
    }

    /// Get a reference to the underlying octocrab instance
    pub fn octocrab(&self) -> &Octocrab {
        &self.octocrab
    }
}

/// Response shape of `GET /repos/{owner}/{repo}/compare/{base}...{head}`
#[derive(Debug, Deserialize)]
struct CompareResponse {
    #[serde(default)]
    total_commits: Option<u64>,
    commits: Vec<RawCommit>,
}

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    sha: String,
    commit: RawCommitDetail,
}

#[derive(Debug, Deserialize)]
struct RawCommitDetail {
    message: String,
}

impl From<RawCommit> for Commit {
    fn from(raw: RawCommit) -> Self {
        Commit {
            sha: raw.sha,
            message: raw.commit.message,
        }
    }
}

#[derive(Debug, Serialize)]
struct CommitListParams<'a> {
    sha: &'a str,
    per_page: u8,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsResponse {
    #[serde(default)]
    total_count: Option<u64>,
    workflow_runs: Vec<RawWorkflowRun>,
}

#[derive(Debug, Serialize)]
struct WorkflowRunParams<'a> {
    head_sha: &'a str,
    per_page: u8,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct RawWorkflowRun {
    id: u64,
    name: Option<String>,
    status: Option<String>,
    conclusion: Option<String>,
    head_sha: String,
    html_url: String,
}

#[async_trait]
impl GitHubClient for OctocrabClient {
    async fn fetch_repository_labels(
        &self,
        owner: &str,
        repo: &str,
    ) -> anyhow::Result<Vec<String>> {
        debug!("Fetching labels for {}/{}", owner, repo);

        let page = self
            .octocrab
            .issues(owner, repo)
            .list_labels_for_repo()
            .per_page(PER_PAGE)
            .send()
            .await?;
        let labels = self.octocrab.all_pages(page).await?;

        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    async fn fetch_issue_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> anyhow::Result<Vec<String>> {
        debug!("Fetching labels for {}/{}#{}", owner, repo, number);

        let page = self
            .octocrab
            .issues(owner, repo)
            .list_labels_for_issue(number)
            .per_page(PER_PAGE)
            .send()
            .await?;
        let labels = self.octocrab.all_pages(page).await?;

        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    async fn search_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        query: &PullRequestQuery,
    ) -> anyhow::Result<Vec<PullRequestSummary>> {
        let q = query.to_search_string(owner, repo);
        debug!("Searching pull requests: {}", q);

        let page = self
            .octocrab
            .search()
            .issues_and_pull_requests(&q)
            .per_page(PER_PAGE)
            .send()
            .await
            .with_context(|| format!("Search failed for query '{}'", q))?;
        let issues = self.octocrab.all_pages(page).await?;

        let prs: Vec<PullRequestSummary> = issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_some())
            .map(|issue| PullRequestSummary {
                number: issue.number,
                title: issue.title,
                state: convert_issue_state(&issue.state),
                labels: issue.labels.into_iter().map(|l| l.name).collect(),
                html_url: issue.html_url.to_string(),
            })
            .collect();

        debug!("Search returned {} pull requests", prs.len());
        Ok(prs)
    }

    async fn fetch_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<PullRequest> {
        debug!("Fetching PR #{} for {}/{}", pr_number, owner, repo);

        let pr = self
            .octocrab
            .pulls(owner, repo)
            .get(pr_number)
            .await
            .with_context(|| format!("Failed to fetch PR #{}", pr_number))?;

        Ok(convert_pull_request(&pr))
    }

    async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        merge_method: MergeMethod,
        commit_title: Option<&str>,
        commit_message: Option<&str>,
    ) -> anyhow::Result<MergeResult> {
        debug!(
            "Merging PR #{} in {}/{} ({:?})",
            pr_number, owner, repo, merge_method
        );

        let method = match merge_method {
            MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
            MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
            MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
        };

        let pulls = self.octocrab.pulls(owner, repo);
        let mut request = pulls.merge(pr_number).method(method);
        if let Some(title) = commit_title {
            request = request.title(title);
        }
        if let Some(message) = commit_message {
            request = request.message(message);
        }

        let merge = request.send().await?;

        Ok(MergeResult {
            merged: merge.merged,
            sha: merge.sha,
            message: merge.message.unwrap_or_default(),
        })
    }

    async fn fetch_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> anyhow::Result<Vec<IssueComment>> {
        debug!("Fetching comments for {}/{}#{}", owner, repo, number);

        let page = self
            .octocrab
            .issues(owner, repo)
            .list_comments(number)
            .per_page(PER_PAGE)
            .send()
            .await?;
        let comments = self.octocrab.all_pages(page).await?;

        Ok(comments.iter().map(convert_comment).collect())
    }

    async fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> anyhow::Result<IssueComment> {
        debug!("Creating comment on {}/{}#{}", owner, repo, number);

        let comment = self
            .octocrab
            .issues(owner, repo)
            .create_comment(number, body)
            .await?;

        Ok(convert_comment(&comment))
    }

    async fn update_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> anyhow::Result<IssueComment> {
        debug!("Updating comment {} in {}/{}", comment_id, owner, repo);

        let comment = self
            .octocrab
            .issues(owner, repo)
            .update_comment(octocrab::models::CommentId(comment_id), body)
            .await?;

        Ok(convert_comment(&comment))
    }

    async fn fetch_current_user(&self) -> anyhow::Result<User> {
        let author = self.octocrab.current().user().await?;
        Ok(User {
            login: author.login,
        })
    }

    async fn fetch_check_runs(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> anyhow::Result<Vec<CheckRun>> {
        debug!(
            "Fetching check runs for {}/{} @ {}",
            owner, repo, commit_sha
        );

        let mut runs = Vec::new();
        let mut complete = false;

        for page in 1..=MAX_LIST_PAGES {
            let checks = self
                .octocrab
                .checks(owner, repo)
                .list_check_runs_for_git_ref(commit_sha.to_string().into())
                .per_page(PER_PAGE)
                .page(page)
                .send()
                .await?;

            let batch_len = checks.check_runs.len();
            runs.extend(checks.check_runs.into_iter().map(convert_check_run));

            if is_last_page(batch_len, runs.len(), Some(checks.total_count)) {
                complete = true;
                break;
            }
        }

        if !complete {
            warn!(
                "Check runs for {}/{} @ {} truncated at {} entries",
                owner,
                repo,
                commit_sha,
                runs.len()
            );
        }

        Ok(runs)
    }

    async fn fetch_commit_status(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> anyhow::Result<CheckStatus> {
        debug!(
            "Fetching commit status for {}/{} @ {}",
            owner, repo, commit_sha
        );

        // Use raw GET request since octocrab's Reference type doesn't support commit SHAs
        let route = format!("/repos/{}/{}/commits/{}/status", owner, repo, commit_sha);
        let status: octocrab::models::CombinedStatus =
            self.octocrab.get(route, None::<&()>).await?;

        let state = convert_status_state(&status.state);
        let statuses = status
            .statuses
            .into_iter()
            .map(|s| CommitStatus {
                context: s.context.unwrap_or_else(|| "unknown".to_string()),
                state: convert_status_state(&s.state),
                description: s.description,
                target_url: s.target_url,
            })
            .collect();

        Ok(CheckStatus {
            state,
            total_count: status.total_count as u64,
            statuses,
        })
    }

    async fn fetch_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        head_sha: &str,
    ) -> anyhow::Result<Vec<WorkflowRun>> {
        debug!(
            "Fetching workflow runs for {}/{} @ {}",
            owner, repo, head_sha
        );

        let route = format!("/repos/{}/{}/actions/runs", owner, repo);
        let mut runs = Vec::new();
        let mut complete = false;

        for page in 1..=MAX_LIST_PAGES {
            let params = WorkflowRunParams {
                head_sha,
                per_page: PER_PAGE,
                page,
            };
            let response: WorkflowRunsResponse = self.octocrab.get(&route, Some(&params)).await?;

            let batch_len = response.workflow_runs.len();
            runs.extend(response.workflow_runs.into_iter().map(convert_workflow_run));

            if is_last_page(batch_len, runs.len(), response.total_count) {
                complete = true;
                break;
            }
        }

        if !complete {
            warn!(
                "Workflow runs for {}/{} @ {} truncated at {} entries",
                owner,
                repo,
                head_sha,
                runs.len()
            );
        }

        Ok(runs)
    }

    async fn rerun_failed_jobs(&self, owner: &str, repo: &str, run_id: u64) -> anyhow::Result<()> {
        debug!("Rerunning failed jobs of run {} in {}/{}", run_id, owner, repo);

        let route = format!(
            "/repos/{}/{}/actions/runs/{}/rerun-failed-jobs",
            owner, repo, run_id
        );

        // Use serde_json::Value as response type for POST requests
        self.octocrab
            .post::<(), serde_json::Value>(route, None::<&()>)
            .await
            .with_context(|| format!("Failed to rerun workflow run {}", run_id))?;

        Ok(())
    }

    async fn fetch_tags(&self, owner: &str, repo: &str) -> anyhow::Result<Vec<Tag>> {
        debug!("Fetching tags for {}/{}", owner, repo);

        let page = self
            .octocrab
            .repos(owner, repo)
            .list_tags()
            .per_page(PER_PAGE)
            .send()
            .await?;
        let tags = self.octocrab.all_pages(page).await?;

        Ok(tags
            .into_iter()
            .map(|t| Tag {
                name: t.name,
                sha: t.commit.sha,
            })
            .collect())
    }

    async fn fetch_releases(&self, owner: &str, repo: &str) -> anyhow::Result<Vec<Release>> {
        debug!("Fetching releases for {}/{}", owner, repo);

        let page = self
            .octocrab
            .repos(owner, repo)
            .releases()
            .list()
            .per_page(PER_PAGE)
            .send()
            .await?;
        let releases = self.octocrab.all_pages(page).await?;

        debug!("Fetched {} releases for {}/{}", releases.len(), owner, repo);
        Ok(releases
            .into_iter()
            .map(|r| Release {
                id: r.id.0,
                tag_name: r.tag_name,
                name: r.name,
                draft: r.draft,
                prerelease: r.prerelease,
                published_at: r.published_at,
            })
            .collect())
    }

    async fn compare_commits(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> anyhow::Result<Vec<Commit>> {
        debug!("Comparing {}...{} in {}/{}", base, head, owner, repo);

        let route = format!("/repos/{}/{}/compare/{}...{}", owner, repo, base, head);
        let mut commits = Vec::new();
        let mut complete = false;

        for page in 1..=MAX_LIST_PAGES {
            let params = PageParams {
                per_page: PER_PAGE,
                page,
            };
            let response: CompareResponse = self
                .octocrab
                .get(&route, Some(&params))
                .await
                .with_context(|| format!("Failed to compare {}...{}", base, head))?;

            let batch_len = response.commits.len();
            commits.extend(response.commits.into_iter().map(Commit::from));

            if is_last_page(batch_len, commits.len(), response.total_commits) {
                complete = true;
                break;
            }
        }

        if !complete {
            warn!(
                "Comparison {}...{} truncated at {} commits",
                base,
                head,
                commits.len()
            );
        }

        debug!("Compared {}...{}: {} commits", base, head, commits.len());
        Ok(commits)
    }

    async fn fetch_commits(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> anyhow::Result<Vec<Commit>> {
        debug!("Fetching history of {} in {}/{}", git_ref, owner, repo);

        let route = format!("/repos/{}/{}/commits", owner, repo);
        let mut commits = Vec::new();

        for page in 1..=MAX_HISTORY_PAGES {
            let params = CommitListParams {
                sha: git_ref,
                per_page: PER_PAGE,
                page,
            };
            let batch: Vec<RawCommit> = self.octocrab.get(&route, Some(&params)).await?;
            let batch_len = batch.len();
            commits.extend(batch.into_iter().map(Commit::from));

            if is_last_page(batch_len, commits.len(), None) {
                break;
            }
        }

        debug!("Fetched {} commits of {}", commits.len(), git_ref);
        Ok(commits)
    }
}

/// Convert an octocrab check run, deriving status from its timestamps
fn convert_check_run(run: octocrab::models::checks::CheckRun) -> CheckRun {
    let status = if run.completed_at.is_some() {
        CheckRunStatus::Completed
    } else if run.started_at.is_some() {
        CheckRunStatus::InProgress
    } else {
        CheckRunStatus::Queued
    };

    CheckRun {
        id: run.id.0,
        name: run.name,
        status,
        conclusion: run.conclusion.as_ref().map(|c| convert_conclusion_string(c)),
        details_url: run.details_url,
        started_at: run.started_at,
        completed_at: run.completed_at,
    }
}

/// Convert octocrab PullRequest to our PullRequest type
fn convert_pull_request(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        title: pr.title.clone().unwrap_or_default(),
        body: pr.body.clone(),
        author: pr
            .user
            .as_ref()
            .map(|u| u.login.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        state: pr
            .state
            .as_ref()
            .map(convert_issue_state)
            .unwrap_or_default(),
        merged: pr.merged.unwrap_or(false) || pr.merged_at.is_some(),
        merged_at: pr.merged_at,
        merge_commit_sha: pr.merge_commit_sha.clone(),
        head_sha: pr.head.sha.clone(),
        base_branch: pr.base.ref_field.clone(),
        head_branch: pr.head.ref_field.clone(),
        labels: pr
            .labels
            .as_ref()
            .map(|labels| labels.iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default(),
        html_url: pr
            .html_url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_default(),
    }
}

fn convert_issue_state(state: &octocrab::models::IssueState) -> IssueState {
    match state {
        octocrab::models::IssueState::Closed => IssueState::Closed,
        _ => IssueState::Open,
    }
}

fn convert_comment(comment: &octocrab::models::issues::Comment) -> IssueComment {
    IssueComment {
        id: comment.id.0,
        body: comment.body.clone().unwrap_or_default(),
        author: comment.user.login.clone(),
        created_at: comment.created_at,
    }
}

fn convert_workflow_run(run: RawWorkflowRun) -> WorkflowRun {
    WorkflowRun {
        id: run.id,
        name: run.name.unwrap_or_default(),
        status: convert_run_status(run.status.as_deref()),
        conclusion: run.conclusion.as_deref().map(convert_run_conclusion),
        head_sha: run.head_sha,
        html_url: run.html_url,
    }
}

fn convert_run_status(status: Option<&str>) -> WorkflowRunStatus {
    match status {
        Some("queued") => WorkflowRunStatus::Queued,
        Some("waiting") => WorkflowRunStatus::Waiting,
        Some("in_progress") => WorkflowRunStatus::InProgress,
        Some("completed") => WorkflowRunStatus::Completed,
        _ => WorkflowRunStatus::Pending,
    }
}

fn convert_run_conclusion(conclusion: &str) -> WorkflowRunConclusion {
    match conclusion {
        "success" => WorkflowRunConclusion::Success,
        "failure" => WorkflowRunConclusion::Failure,
        "cancelled" => WorkflowRunConclusion::Cancelled,
        "skipped" => WorkflowRunConclusion::Skipped,
        "timed_out" => WorkflowRunConclusion::TimedOut,
        "action_required" => WorkflowRunConclusion::ActionRequired,
        "stale" => WorkflowRunConclusion::Stale,
        _ => WorkflowRunConclusion::Neutral,
    }
}

/// Convert conclusion string from GitHub API to our enum
fn convert_conclusion_string(conclusion: &str) -> CheckConclusion {
    match conclusion.to_lowercase().as_str() {
        "success" => CheckConclusion::Success,
        "failure" => CheckConclusion::Failure,
        "neutral" => CheckConclusion::Neutral,
        "cancelled" => CheckConclusion::Cancelled,
        "skipped" => CheckConclusion::Skipped,
        "timed_out" => CheckConclusion::TimedOut,
        "action_required" => CheckConclusion::ActionRequired,
        "stale" => CheckConclusion::Stale,
        _ => CheckConclusion::Neutral,
    }
}

/// Convert octocrab StatusState to our CheckState
fn convert_status_state(state: &octocrab::models::StatusState) -> CheckState {
    match state {
        octocrab::models::StatusState::Success => CheckState::Success,
        octocrab::models::StatusState::Pending => CheckState::Pending,
        octocrab::models::StatusState::Failure => CheckState::Failure,
        octocrab::models::StatusState::Error => CheckState::Error,
        _ => CheckState::Pending,
    }
}
