//! In-memory forge for tests
//!
//! `MockForge` implements [`GitHubClient`] over fixtures set up by each
//! test and records which methods were called.

use crate::model::RepoRef;
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gh_client::{
    CheckConclusion, CheckRun, CheckRunStatus, CheckState, CheckStatus, Commit, CommitStatus,
    GitHubClient, IssueComment, IssueState, MergeMethod, MergeResult, PullRequest,
    PullRequestQuery, PullRequestSummary, Release, Tag, User, WorkflowRun, WorkflowRunConclusion,
    WorkflowRunStatus,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct Fixtures {
    repository_labels: Vec<String>,
    issue_labels: HashMap<u64, Vec<String>>,
    pull_requests: BTreeMap<u64, PullRequest>,
    comments: HashMap<u64, Vec<IssueComment>>,
    next_comment_id: u64,
    ci: HashMap<String, (Vec<CommitStatus>, Vec<CheckRun>)>,
    workflow_runs: HashMap<String, Vec<WorkflowRun>>,
    releases: Vec<Release>,
    compare: HashMap<(String, String), Vec<Commit>>,
    history: HashMap<String, Vec<Commit>>,
    fail_searches: bool,
    fail_releases: bool,
    last_search: Option<PullRequestQuery>,
    reruns: Vec<u64>,
    merged: Vec<u64>,
    calls: Vec<&'static str>,
}

pub(crate) struct MockForge {
    fixtures: Mutex<Fixtures>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

fn commits(messages: &[&str]) -> Vec<Commit> {
    messages
        .iter()
        .enumerate()
        .map(|(i, message)| Commit {
            sha: format!("{:040x}", i + 1),
            message: message.to_string(),
        })
        .collect()
}

impl MockForge {
    pub const LOGIN: &'static str = "tracker-bot";

    pub fn new() -> Self {
        Self {
            fixtures: Mutex::new(Fixtures {
                next_comment_id: 1,
                ..Fixtures::default()
            }),
        }
    }

    pub fn repo(&self) -> RepoRef {
        RepoRef::new("acme", "widgets")
    }

    /// Head commit of fixture pull request `number`
    pub fn head_sha(number: u64) -> String {
        format!("{:040x}", 0xbeef_0000 + number)
    }

    fn with<T>(&self, f: impl FnOnce(&mut Fixtures) -> T) -> T {
        f(&mut self.fixtures.lock().unwrap())
    }

    fn record(&self, call: &'static str) {
        self.with(|fx| fx.calls.push(call));
    }

    // === Fixture setup ===

    pub fn set_repository_labels(&self, labels: &[&str]) {
        self.with(|fx| fx.repository_labels = labels.iter().map(|l| l.to_string()).collect());
    }

    pub fn set_issue_labels(&self, number: u64, labels: &[&str]) {
        self.with(|fx| {
            fx.issue_labels
                .insert(number, labels.iter().map(|l| l.to_string()).collect())
        });
    }

    fn add_pull_request(&self, number: u64, title: &str, labels: &[&str], base: &str, merged: bool) {
        let pr = PullRequest {
            number,
            title: title.to_string(),
            body: None,
            author: "dev".to_string(),
            state: if merged {
                IssueState::Closed
            } else {
                IssueState::Open
            },
            merged,
            merged_at: merged.then(epoch),
            merge_commit_sha: merged.then(|| Self::head_sha(number)),
            head_sha: Self::head_sha(number),
            base_branch: base.to_string(),
            head_branch: format!("pick-{}", number),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            html_url: format!("https://github.com/acme/widgets/pull/{}", number),
        };
        self.with(|fx| fx.pull_requests.insert(number, pr));
    }

    /// A pull request merged into `main`
    pub fn add_merged_pull_request(&self, number: u64, title: &str, labels: &[&str]) {
        self.add_pull_request(number, title, labels, "main", true);
    }

    pub fn add_merged_pull_request_on(&self, number: u64, title: &str, labels: &[&str], base: &str) {
        self.add_pull_request(number, title, labels, base, true);
    }

    pub fn add_open_pull_request(&self, number: u64, title: &str, base: &str) {
        self.add_pull_request(number, title, &[], base, false);
    }

    /// Merge a fixture pull request behind the tracker's back
    pub fn merge(&self, number: u64) {
        self.with(|fx| {
            if let Some(pr) = fx.pull_requests.get_mut(&number) {
                pr.merged = true;
                pr.state = IssueState::Closed;
                pr.merged_at = Some(epoch());
            }
        });
    }

    pub fn add_comment(&self, issue: u64, author: &str, body: &str) {
        self.with(|fx| {
            let id = fx.next_comment_id;
            fx.next_comment_id += 1;
            fx.comments.entry(issue).or_default().push(IssueComment {
                id,
                body: body.to_string(),
                author: author.to_string(),
                created_at: epoch() + Duration::seconds(id as i64),
            });
        });
    }

    pub fn comments(&self, issue: u64) -> Vec<IssueComment> {
        self.with(|fx| fx.comments.get(&issue).cloned().unwrap_or_default())
    }

    pub fn set_ci(&self, sha: &str, statuses: Vec<CommitStatus>, runs: Vec<CheckRun>) {
        self.with(|fx| fx.ci.insert(sha.to_string(), (statuses, runs)));
    }

    pub fn add_workflow_run(&self, sha: &str, id: u64, failed: bool) {
        let run = WorkflowRun {
            id,
            name: format!("workflow-{}", id),
            status: WorkflowRunStatus::Completed,
            conclusion: Some(if failed {
                WorkflowRunConclusion::Failure
            } else {
                WorkflowRunConclusion::Success
            }),
            head_sha: sha.to_string(),
            html_url: format!("https://github.com/acme/widgets/actions/runs/{}", id),
        };
        self.with(|fx| fx.workflow_runs.entry(sha.to_string()).or_default().push(run));
    }

    pub fn set_releases(&self, releases: Vec<Release>) {
        self.with(|fx| fx.releases = releases);
    }

    pub fn set_compare(&self, base: &str, head: &str, messages: &[&str]) {
        self.with(|fx| {
            fx.compare
                .insert((base.to_string(), head.to_string()), commits(messages))
        });
    }

    pub fn set_history(&self, git_ref: &str, messages: &[&str]) {
        self.with(|fx| fx.history.insert(git_ref.to_string(), commits(messages)));
    }

    pub fn fail_searches(&self) {
        self.with(|fx| fx.fail_searches = true);
    }

    pub fn fail_releases(&self) {
        self.with(|fx| fx.fail_releases = true);
    }

    // === Inspection ===

    pub fn call_count(&self, call: &str) -> usize {
        self.with(|fx| fx.calls.iter().filter(|c| **c == call).count())
    }

    pub fn last_search(&self) -> Option<PullRequestQuery> {
        self.with(|fx| fx.last_search.clone())
    }

    pub fn reruns(&self) -> Vec<u64> {
        self.with(|fx| fx.reruns.clone())
    }

    pub fn merged_numbers(&self) -> Vec<u64> {
        self.with(|fx| fx.merged.clone())
    }
}

pub(crate) fn check_run(
    name: &str,
    status: CheckRunStatus,
    conclusion: Option<CheckConclusion>,
) -> CheckRun {
    CheckRun {
        id: 1,
        name: name.to_string(),
        status,
        conclusion,
        details_url: None,
        started_at: None,
        completed_at: None,
    }
}

pub(crate) fn commit_status(context: &str, state: CheckState) -> CommitStatus {
    CommitStatus {
        context: context.to_string(),
        state,
        description: None,
        target_url: None,
    }
}

pub(crate) fn release(tag: &str) -> Release {
    Release {
        id: 1,
        tag_name: tag.to_string(),
        name: Some(tag.to_string()),
        draft: false,
        prerelease: tag.contains('-'),
        published_at: Some(epoch()),
    }
}

fn matches_query(pr: &PullRequest, query: &PullRequestQuery) -> bool {
    if query.merged.is_some_and(|merged| merged != pr.merged) {
        return false;
    }
    if query
        .base_branch
        .as_ref()
        .is_some_and(|base| *base != pr.base_branch)
    {
        return false;
    }
    if !query.labels.is_empty() && !query.labels.iter().any(|l| pr.labels.contains(l)) {
        return false;
    }
    let title = pr.title.to_lowercase();
    query
        .title_terms
        .iter()
        .all(|term| title.contains(&term.to_lowercase()))
}

#[async_trait]
impl GitHubClient for MockForge {
    async fn fetch_repository_labels(&self, _owner: &str, _repo: &str) -> anyhow::Result<Vec<String>> {
        self.record("fetch_repository_labels");
        Ok(self.with(|fx| fx.repository_labels.clone()))
    }

    async fn fetch_issue_labels(
        &self,
        _owner: &str,
        _repo: &str,
        number: u64,
    ) -> anyhow::Result<Vec<String>> {
        self.record("fetch_issue_labels");
        self.with(|fx| {
            fx.issue_labels
                .get(&number)
                .cloned()
                .or_else(|| fx.pull_requests.get(&number).map(|pr| pr.labels.clone()))
                .ok_or_else(|| anyhow!("issue #{} not found", number))
        })
    }

    async fn search_pull_requests(
        &self,
        _owner: &str,
        _repo: &str,
        query: &PullRequestQuery,
    ) -> anyhow::Result<Vec<PullRequestSummary>> {
        self.record("search_pull_requests");
        self.with(|fx| {
            if fx.fail_searches {
                bail!("search unavailable");
            }
            fx.last_search = Some(query.clone());
            Ok(fx
                .pull_requests
                .values()
                .filter(|pr| matches_query(pr, query))
                .map(|pr| PullRequestSummary {
                    number: pr.number,
                    title: pr.title.clone(),
                    state: pr.state,
                    labels: pr.labels.clone(),
                    html_url: pr.html_url.clone(),
                })
                .collect())
        })
    }

    async fn fetch_pull_request(
        &self,
        _owner: &str,
        _repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<PullRequest> {
        self.record("fetch_pull_request");
        self.with(|fx| {
            fx.pull_requests
                .get(&pr_number)
                .cloned()
                .ok_or_else(|| anyhow!("pull request #{} not found", pr_number))
        })
    }

    async fn merge_pull_request(
        &self,
        _owner: &str,
        _repo: &str,
        pr_number: u64,
        _merge_method: MergeMethod,
        _commit_title: Option<&str>,
        _commit_message: Option<&str>,
    ) -> anyhow::Result<MergeResult> {
        self.record("merge_pull_request");
        self.with(|fx| {
            let pr = fx
                .pull_requests
                .get_mut(&pr_number)
                .ok_or_else(|| anyhow!("pull request #{} not found", pr_number))?;
            if pr.merged {
                return Ok(MergeResult {
                    merged: false,
                    sha: None,
                    message: "Pull Request is not mergeable".to_string(),
                });
            }
            pr.merged = true;
            pr.state = IssueState::Closed;
            fx.merged.push(pr_number);
            Ok(MergeResult {
                merged: true,
                sha: Some(Self::head_sha(pr_number)),
                message: "Pull Request successfully merged".to_string(),
            })
        })
    }

    async fn fetch_issue_comments(
        &self,
        _owner: &str,
        _repo: &str,
        number: u64,
    ) -> anyhow::Result<Vec<IssueComment>> {
        self.record("fetch_issue_comments");
        Ok(self.comments(number))
    }

    async fn create_issue_comment(
        &self,
        _owner: &str,
        _repo: &str,
        number: u64,
        body: &str,
    ) -> anyhow::Result<IssueComment> {
        self.record("create_issue_comment");
        self.add_comment(number, Self::LOGIN, body);
        self.comments(number)
            .pop()
            .ok_or_else(|| anyhow!("comment was not stored"))
    }

    async fn update_issue_comment(
        &self,
        _owner: &str,
        _repo: &str,
        comment_id: u64,
        body: &str,
    ) -> anyhow::Result<IssueComment> {
        self.record("update_issue_comment");
        self.with(|fx| {
            let comment = fx
                .comments
                .values_mut()
                .flatten()
                .find(|c| c.id == comment_id)
                .ok_or_else(|| anyhow!("comment {} not found", comment_id))?;
            comment.body = body.to_string();
            Ok(comment.clone())
        })
    }

    async fn fetch_current_user(&self) -> anyhow::Result<User> {
        self.record("fetch_current_user");
        Ok(User {
            login: Self::LOGIN.to_string(),
        })
    }

    async fn fetch_check_runs(
        &self,
        _owner: &str,
        _repo: &str,
        commit_sha: &str,
    ) -> anyhow::Result<Vec<CheckRun>> {
        self.record("fetch_check_runs");
        self.with(|fx| {
            fx.ci
                .get(commit_sha)
                .map(|(_, runs)| runs.clone())
                .ok_or_else(|| anyhow!("no commit {}", commit_sha))
        })
    }

    async fn fetch_commit_status(
        &self,
        _owner: &str,
        _repo: &str,
        commit_sha: &str,
    ) -> anyhow::Result<CheckStatus> {
        self.record("fetch_commit_status");
        self.with(|fx| {
            let (statuses, _) = fx
                .ci
                .get(commit_sha)
                .ok_or_else(|| anyhow!("no commit {}", commit_sha))?;
            Ok(CheckStatus {
                state: CheckState::Pending,
                total_count: statuses.len() as u64,
                statuses: statuses.clone(),
            })
        })
    }

    async fn fetch_workflow_runs(
        &self,
        _owner: &str,
        _repo: &str,
        head_sha: &str,
    ) -> anyhow::Result<Vec<WorkflowRun>> {
        self.record("fetch_workflow_runs");
        Ok(self.with(|fx| fx.workflow_runs.get(head_sha).cloned().unwrap_or_default()))
    }

    async fn rerun_failed_jobs(&self, _owner: &str, _repo: &str, run_id: u64) -> anyhow::Result<()> {
        self.record("rerun_failed_jobs");
        self.with(|fx| fx.reruns.push(run_id));
        Ok(())
    }

    async fn fetch_tags(&self, _owner: &str, _repo: &str) -> anyhow::Result<Vec<Tag>> {
        self.record("fetch_tags");
        Ok(self.with(|fx| {
            fx.releases
                .iter()
                .map(|r| Tag {
                    name: r.tag_name.clone(),
                    sha: format!("{:040x}", r.id),
                })
                .collect()
        }))
    }

    async fn fetch_releases(&self, _owner: &str, _repo: &str) -> anyhow::Result<Vec<Release>> {
        self.record("fetch_releases");
        self.with(|fx| {
            if fx.fail_releases {
                bail!("releases unavailable");
            }
            Ok(fx.releases.clone())
        })
    }

    async fn compare_commits(
        &self,
        _owner: &str,
        _repo: &str,
        base: &str,
        head: &str,
    ) -> anyhow::Result<Vec<Commit>> {
        self.record("compare_commits");
        self.with(|fx| {
            fx.compare
                .get(&(base.to_string(), head.to_string()))
                .cloned()
                .ok_or_else(|| anyhow!("cannot compare {}...{}", base, head))
        })
    }

    async fn fetch_commits(
        &self,
        _owner: &str,
        _repo: &str,
        git_ref: &str,
    ) -> anyhow::Result<Vec<Commit>> {
        self.record("fetch_commits");
        self.with(|fx| {
            fx.history
                .get(git_ref)
                .cloned()
                .ok_or_else(|| anyhow!("no ref {}", git_ref))
        })
    }
}
