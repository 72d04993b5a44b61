//! Tracked-state model
//!
//! A [`TrackedPullRequest`] owns one [`BranchStatus`] per release branch it
//! must reach. Every status change goes through [`BranchStatus::apply`],
//! which is the single place the transition rules live:
//!
//! ```text
//!  Pending ──failed──▶ Failed
//!     │                  │
//!     └──candidate───────┴──▶ Picked ──merged──▶ Merged ──released──▶ Released
//!                               │                  ▲
//!                               └──(merged)────────┘
//! ```
//!
//! Merged only moves to Released, and nothing leaves Released.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Repository the tracker operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Per-branch cherry-pick status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickStatus {
    /// Waiting for the bot or a human to open a cherry-pick
    #[default]
    Pending,
    /// The automated cherry-pick attempt failed
    Failed,
    /// A cherry-pick pull request is open
    Picked,
    /// The cherry-pick pull request is merged
    Merged,
    /// The cherry-pick shipped in a tagged release
    Released,
}

impl PickStatus {
    /// Merged and Released are never moved backwards by the updater
    pub fn is_protected(self) -> bool {
        matches!(self, PickStatus::Merged | PickStatus::Released)
    }

    /// Only these may be dropped when their label disappears
    pub fn is_removable(self) -> bool {
        matches!(self, PickStatus::Pending | PickStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PickStatus::Pending => "pending",
            PickStatus::Failed => "failed",
            PickStatus::Picked => "picked",
            PickStatus::Merged => "merged",
            PickStatus::Released => "released",
        }
    }
}

impl fmt::Display for PickStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CI health of a candidate pull request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiState {
    Passing,
    Failing,
    Pending,
    #[default]
    Unknown,
}

/// The cherry-pick pull request believed to carry a tracked change onto a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickPullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub ci_status: CiState,
}

impl PickPullRequest {
    pub fn new(number: u64, title: impl Into<String>, ci_status: CiState) -> Self {
        Self {
            number,
            title: title.into(),
            ci_status,
        }
    }
}

/// Something the forge told us about one (pull request, branch) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchEvent {
    /// The automated cherry-pick reported a failure
    AttemptFailed,
    /// A candidate pull request was found and looked up
    CandidateResolved { pick: PickPullRequest, merged: bool },
    /// Fresh CI status for the stored candidate
    CiRefreshed(CiState),
    /// The candidate's commit was found in a release
    Released,
}

/// Outcome of [`BranchStatus::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Event rejected, or nothing differed
    Unchanged,
    /// Only the stored candidate's CI status changed
    CiRefreshed,
    /// The status or the candidate number changed
    Changed { from: PickStatus, to: PickStatus },
}

impl Transition {
    pub fn is_change(&self) -> bool {
        matches!(self, Transition::Changed { .. })
    }
}

/// State of one (pull request, branch) pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchStatus {
    status: PickStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pick: Option<PickPullRequest>,
}

impl BranchStatus {
    pub fn pending() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn with_pick(status: PickStatus, pick: Option<PickPullRequest>) -> Self {
        Self { status, pick }
    }

    pub fn status(&self) -> PickStatus {
        self.status
    }

    pub fn pick(&self) -> Option<&PickPullRequest> {
        self.pick.as_ref()
    }

    /// Apply an event, enforcing the transition rules
    pub fn apply(&mut self, event: BranchEvent) -> Transition {
        match event {
            BranchEvent::AttemptFailed => match self.status {
                PickStatus::Pending => {
                    self.status = PickStatus::Failed;
                    Transition::Changed {
                        from: PickStatus::Pending,
                        to: PickStatus::Failed,
                    }
                }
                _ => Transition::Unchanged,
            },
            BranchEvent::CandidateResolved { pick, merged } => {
                if self.status.is_protected() {
                    return Transition::Unchanged;
                }

                let from = self.status;
                let to = if merged {
                    PickStatus::Merged
                } else {
                    PickStatus::Picked
                };
                let number_changed = self.pick.as_ref().map(|p| p.number) != Some(pick.number);
                let ci_changed = self.pick.as_ref().map(|p| p.ci_status) != Some(pick.ci_status);

                self.status = to;
                self.pick = Some(pick);

                if from != to || number_changed {
                    Transition::Changed { from, to }
                } else if ci_changed {
                    Transition::CiRefreshed
                } else {
                    Transition::Unchanged
                }
            }
            BranchEvent::CiRefreshed(ci_status) => match (self.status, self.pick.as_mut()) {
                (PickStatus::Picked, Some(pick)) if pick.ci_status != ci_status => {
                    pick.ci_status = ci_status;
                    Transition::CiRefreshed
                }
                _ => Transition::Unchanged,
            },
            BranchEvent::Released => match self.status {
                PickStatus::Merged => {
                    self.status = PickStatus::Released;
                    Transition::Changed {
                        from: PickStatus::Merged,
                        to: PickStatus::Released,
                    }
                }
                _ => Transition::Unchanged,
            },
        }
    }
}

/// An originally merged pull request watched for cherry-pick completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedPullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub branches: BTreeMap<String, BranchStatus>,
}

impl TrackedPullRequest {
    pub fn new(number: u64, title: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            ignored: false,
            branches: BTreeMap::new(),
        }
    }

    pub fn branch(&self, name: &str) -> Option<&BranchStatus> {
        self.branches.get(name)
    }

    pub fn branch_mut(&mut self, name: &str) -> Option<&mut BranchStatus> {
        self.branches.get_mut(name)
    }

    pub fn branch_names(&self) -> BTreeSet<String> {
        self.branches.keys().cloned().collect()
    }
}
