//! Tracked-state store
//!
//! [`TrackerState`] holds everything the tracker remembers between runs.
//! It is loaded once at the start of a command and saved after every stage
//! through a [`StateStore`].
//!
//! # Layout
//!
//! ```json
//! {
//!   "last_fetch": "2024-05-01T12:00:00Z",
//!   "pull_requests": {
//!     "123": {
//!       "number": 123,
//!       "title": "Fix crash",
//!       "ignored": false,
//!       "branches": { "release-3.6": { "status": "picked", "pick": { "number": 500, "title": "...", "ci_status": "passing" } } }
//!     }
//!   },
//!   "release_checkpoints": { "release-3.6": "v3.6.2" },
//!   "tracker_issues": { "release-3.6": 77 }
//! }
//! ```

use crate::error::StoreError;
use crate::model::TrackedPullRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Everything the tracker persists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_fetch: Option<DateTime<Utc>>,
    #[serde(default)]
    pull_requests: BTreeMap<u64, TrackedPullRequest>,
    #[serde(default)]
    release_checkpoints: BTreeMap<String, String>,
    #[serde(default)]
    tracker_issues: BTreeMap<String, u64>,
}

impl TrackerState {
    // === Last fetch ===

    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.last_fetch
    }

    pub fn set_last_fetch(&mut self, at: DateTime<Utc>) {
        self.last_fetch = Some(at);
    }

    // === Tracked pull requests ===

    pub fn pull_request(&self, number: u64) -> Option<&TrackedPullRequest> {
        self.pull_requests.get(&number)
    }

    pub fn pull_request_mut(&mut self, number: u64) -> Option<&mut TrackedPullRequest> {
        self.pull_requests.get_mut(&number)
    }

    pub fn pull_requests(&self) -> impl Iterator<Item = &TrackedPullRequest> {
        self.pull_requests.values()
    }

    pub fn pull_requests_mut(&mut self) -> impl Iterator<Item = &mut TrackedPullRequest> {
        self.pull_requests.values_mut()
    }

    /// Tracked numbers in ascending order
    pub fn pull_request_numbers(&self) -> Vec<u64> {
        self.pull_requests.keys().copied().collect()
    }

    pub fn contains_pull_request(&self, number: u64) -> bool {
        self.pull_requests.contains_key(&number)
    }

    /// Insert or replace the entry keyed by the pull request's number
    pub fn set_pull_request(&mut self, pull_request: TrackedPullRequest) {
        self.pull_requests.insert(pull_request.number, pull_request);
    }

    pub fn delete_pull_request(&mut self, number: u64) -> Option<TrackedPullRequest> {
        self.pull_requests.remove(&number)
    }

    // === Release checkpoints ===

    /// Newest release tag already examined for `branch`
    pub fn release_checkpoint(&self, branch: &str) -> Option<&str> {
        self.release_checkpoints.get(branch).map(String::as_str)
    }

    pub fn set_release_checkpoint(&mut self, branch: impl Into<String>, tag: impl Into<String>) {
        self.release_checkpoints.insert(branch.into(), tag.into());
    }

    pub fn delete_release_checkpoint(&mut self, branch: &str) -> Option<String> {
        self.release_checkpoints.remove(branch)
    }

    // === Tracker issues ===

    pub fn tracker_issue(&self, branch: &str) -> Option<u64> {
        self.tracker_issues.get(branch).copied()
    }

    pub fn set_tracker_issue(&mut self, branch: impl Into<String>, issue: u64) {
        self.tracker_issues.insert(branch.into(), issue);
    }

    pub fn delete_tracker_issue(&mut self, branch: &str) -> Option<u64> {
        self.tracker_issues.remove(branch)
    }
}

/// Persistence boundary for [`TrackerState`]
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<TrackerState, StoreError>;

    fn save(&self, state: &TrackerState) -> Result<(), StoreError>;
}

/// Pretty-printed JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<TrackerState, StoreError> {
        if !self.path.exists() {
            log::info!("No state file at {:?}, starting empty", self.path);
            return Ok(TrackerState::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        let state: TrackerState =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        log::debug!(
            "Loaded {} tracked pull requests from {:?}",
            state.pull_requests.len(),
            self.path
        );
        Ok(state)
    }

    fn save(&self, state: &TrackerState) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(state)?;

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }

        fs::write(&self.path, content).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;

        log::debug!("Saved state to {:?}", self.path);
        Ok(())
    }
}

/// In-memory snapshot store
///
/// Used by `--dry-run` and by tests. Saves replace the snapshot and are
/// counted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<TrackerState>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new(state: TrackerState) -> Self {
        Self {
            snapshot: Mutex::new(state),
            ..Self::default()
        }
    }

    /// Most recently saved state
    pub fn snapshot(&self) -> TrackerState {
        match self.snapshot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every subsequent save fail
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<TrackerState, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &TrackerState) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Write {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::other("saves disabled"),
            });
        }

        match self.snapshot.lock() {
            Ok(mut guard) => *guard = state.clone(),
            Err(poisoned) => *poisoned.into_inner() = state.clone(),
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
