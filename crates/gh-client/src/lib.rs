//! GitHub API gateway for the cherry-pick tracker
//!
//! This crate provides a trait-based GitHub API client. The tracker core
//! depends only on the [`GitHubClient`] trait; [`OctocrabClient`] is the
//! production implementation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              GitHubClient trait                  │
//! │  - labels, search, pull requests, merge          │
//! │  - issue comments, current user                  │
//! │  - check runs, commit status, workflow runs      │
//! │  - tags, releases, compare, history              │
//! └─────────────────────────────────────────────────┘
//!                        │
//!                        ▼
//!              ┌─────────────────┐
//!              │ OctocrabClient  │
//!              │ (direct API)    │
//!              └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use gh_client::{GitHubClient, OctocrabClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let octocrab = octocrab::Octocrab::builder()
//!     .personal_token("token".to_string())
//!     .build()?;
//!
//! let client = OctocrabClient::new(Arc::new(octocrab));
//! let releases = client.fetch_releases("owner", "repo").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod client_manager;
pub mod octocrab_client;
pub mod types;

/// Default GitHub host (public GitHub)
pub const DEFAULT_HOST: &str = "github.com";

pub use client::GitHubClient;
pub use client_manager::{ClientManager, TokenResolver};
pub use octocrab_client::OctocrabClient;
pub use types::{
    CheckConclusion, CheckRun, CheckRunStatus, CheckState, CheckStatus, Commit, CommitStatus,
    IssueComment, IssueState, MergeMethod, MergeResult, PullRequest, PullRequestQuery,
    PullRequestSummary, Release, Tag, User, WorkflowRun, WorkflowRunConclusion,
    WorkflowRunStatus,
};

// Re-export octocrab so consumers don't need to depend on it directly
pub use octocrab;
