//! The fetch cycle
//!
//! One cycle reconciles the tracked state against the forge in four
//! stages. Each stage saves the state before the next one starts, so an
//! interrupted cycle loses at most the stage in flight.
//!
//! 1. Label sync over every tracked pull request, then drop entries left
//!    without branches
//! 2. Discovery of newly merged labelled pull requests
//! 3. Branch status updates
//! 4. Release containment scan
//!
//! Forge failures are logged and skipped; only a failed save ends the cycle.

use crate::detector::Detector;
use crate::error::StoreError;
use crate::model::RepoRef;
use crate::release::{scan_releases, ReleaseScanSummary};
use crate::store::{StateStore, TrackerState};
use crate::sync::{
    discover_labelled_pull_requests, prune_untracked, sync_labels, DiscoverySummary, SyncSummary,
};
use crate::updater::{update_branch_statuses, UpdateSummary};
use chrono::{DateTime, Utc};
use gh_client::GitHubClient;

/// Settings that shape a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSettings {
    /// Branch the tracked pull requests are merged into
    pub source_branch: String,
    /// Discovery window when nothing was fetched before
    pub initial_lookback_days: i64,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            source_branch: "main".to_string(),
            initial_lookback_days: 30,
        }
    }
}

/// What a cycle did, stage by stage
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub sync: SyncSummary,
    pub pruned: Vec<u64>,
    pub discovery: DiscoverySummary,
    pub update: UpdateSummary,
    pub release: ReleaseScanSummary,
}

impl CycleReport {
    /// Forge failures that were skipped over
    pub fn error_count(&self) -> usize {
        self.sync.errors + self.update.errors + self.release.errors
    }

    fn log(&self) {
        log::info!(
            "Cycle done: {} relabelled, {} dropped, {} new, {} transitions, {} released, {} errors",
            self.sync.changed.len(),
            self.pruned.len(),
            self.discovery.added.len(),
            self.update.transitions.len(),
            self.release.released.len(),
            self.error_count()
        );
    }
}

/// Runs the four reconciliation stages
pub struct FetchCycle<'a> {
    client: &'a dyn GitHubClient,
    repo: RepoRef,
    settings: CycleSettings,
    detector: Detector,
}

impl<'a> FetchCycle<'a> {
    pub fn new(client: &'a dyn GitHubClient, repo: RepoRef, settings: CycleSettings) -> Self {
        Self {
            client,
            repo,
            settings,
            detector: Detector::default(),
        }
    }

    /// Replace the default bot-then-manual detector
    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detector = detector;
        self
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// Run all stages on `state`, saving to `store` after each one
    pub async fn run(
        &self,
        state: &mut TrackerState,
        store: &dyn StateStore,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, StoreError> {
        let mut report = CycleReport::default();

        log::info!("Syncing labels of {} tracked pull requests", state.pull_request_numbers().len());
        report.sync = sync_labels(self.client, &self.repo, state).await;
        report.pruned = prune_untracked(state);
        save(store, state, "label sync")?;

        log::info!("Discovering merged pull requests into {}", self.settings.source_branch);
        report.discovery = discover_labelled_pull_requests(
            self.client,
            &self.repo,
            &self.settings.source_branch,
            self.settings.initial_lookback_days,
            now,
            state,
        )
        .await;
        save(store, state, "discovery")?;

        log::info!("Updating branch statuses");
        report.update = update_branch_statuses(self.client, &self.repo, &self.detector, state).await;
        save(store, state, "status update")?;

        log::info!("Scanning releases");
        report.release = scan_releases(self.client, &self.repo, state).await;
        save(store, state, "release scan")?;

        report.log();
        Ok(report)
    }
}

fn save(store: &dyn StateStore, state: &TrackerState, stage: &str) -> Result<(), StoreError> {
    store.save(state).map_err(|e| {
        log::error!("Failed to save state after {}: {}", stage, e);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BranchStatus, CiState, PickPullRequest, PickStatus, TrackedPullRequest};
    use crate::store::MemoryStore;
    use crate::testing::{release, MockForge};

    fn tracked(number: u64, branch: &str, status: BranchStatus) -> TrackerState {
        let mut pr = TrackedPullRequest::new(number, "Fix crash");
        pr.branches.insert(branch.to_string(), status);
        let mut state = TrackerState::default();
        state.set_pull_request(pr);
        state
    }

    fn picked(number: u64, status: PickStatus) -> BranchStatus {
        BranchStatus::with_pick(
            status,
            Some(PickPullRequest::new(number, "[3.6] Fix crash", CiState::Unknown)),
        )
    }

    fn status(state: &TrackerState, number: u64, branch: &str) -> PickStatus {
        state
            .pull_request(number)
            .unwrap()
            .branch(branch)
            .unwrap()
            .status()
    }

    async fn cycle(forge: &MockForge, state: &mut TrackerState, store: &MemoryStore) -> CycleReport {
        FetchCycle::new(forge, forge.repo(), CycleSettings::default())
            .run(state, store, Utc::now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_labelled_pull_request_becomes_tracked() {
        let forge = MockForge::new();
        forge.set_repository_labels(&["cherry-pick/3.6"]);
        forge.add_merged_pull_request(123, "Fix crash", &["cherry-pick/3.6"]);

        let store = MemoryStore::default();
        let mut state = TrackerState::default();
        let report = cycle(&forge, &mut state, &store).await;

        assert_eq!(report.discovery.added, vec![123]);
        assert_eq!(status(&state, 123, "release-3.6"), PickStatus::Pending);
        assert_eq!(store.snapshot(), state);
    }

    #[tokio::test]
    async fn test_bot_comment_moves_branch_to_picked() {
        let forge = MockForge::new();
        forge.set_issue_labels(123, &["cherry-pick/3.6"]);
        forge.add_comment(123, "bot", "Cherry-pick PR created for 3.6: #500");
        forge.add_open_pull_request(500, "[3.6] Fix crash", "release-3.6");

        let store = MemoryStore::default();
        let mut state = tracked(123, "release-3.6", BranchStatus::pending());
        cycle(&forge, &mut state, &store).await;

        assert_eq!(status(&state, 123, "release-3.6"), PickStatus::Picked);
        let branch = state.pull_request(123).unwrap().branch("release-3.6").unwrap();
        assert_eq!(branch.pick().unwrap().number, 500);
    }

    #[tokio::test]
    async fn test_merged_candidate_moves_branch_to_merged() {
        let forge = MockForge::new();
        forge.set_issue_labels(123, &["cherry-pick/3.6"]);
        forge.add_comment(123, "bot", "Cherry-pick PR created for 3.6: #500");
        forge.add_open_pull_request(500, "[3.6] Fix crash", "release-3.6");
        forge.merge(500);

        let store = MemoryStore::default();
        let mut state = tracked(123, "release-3.6", picked(500, PickStatus::Picked));
        cycle(&forge, &mut state, &store).await;

        assert_eq!(status(&state, 123, "release-3.6"), PickStatus::Merged);
    }

    #[tokio::test]
    async fn test_merged_pick_released_with_checkpoint() {
        let forge = MockForge::new();
        forge.set_issue_labels(123, &["cherry-pick/3.6"]);
        forge.set_releases(vec![release("v3.6.2"), release("v3.6.1")]);
        forge.set_compare(
            "v3.6.1",
            "v3.6.2",
            &["[3.6] Fix crash (#500)\n\nBackport of #123\n\n(cherry picked from commit abc123)"],
        );

        let store = MemoryStore::default();
        let mut state = tracked(123, "release-3.6", picked(500, PickStatus::Merged));
        let report = cycle(&forge, &mut state, &store).await;

        assert_eq!(status(&state, 123, "release-3.6"), PickStatus::Released);
        assert_eq!(state.release_checkpoint("release-3.6"), Some("v3.6.2"));
        assert_eq!(report.release.released.len(), 1);
    }

    #[tokio::test]
    async fn test_removed_label_drops_pending_branch_and_entry() {
        let forge = MockForge::new();
        forge.set_issue_labels(123, &["bug"]);

        let store = MemoryStore::default();
        let mut state = tracked(123, "release-3.6", BranchStatus::pending());
        let report = cycle(&forge, &mut state, &store).await;

        assert_eq!(report.pruned, vec![123]);
        assert!(state.pull_request(123).is_none());
    }

    #[tokio::test]
    async fn test_removed_label_keeps_other_branches() {
        let forge = MockForge::new();
        forge.set_issue_labels(123, &["cherry-pick/3.5"]);

        let mut state = tracked(123, "release-3.6", BranchStatus::pending());
        if let Some(pr) = state.pull_request_mut(123) {
            pr.branches
                .insert("release-3.5".to_string(), BranchStatus::pending());
        }

        let store = MemoryStore::default();
        cycle(&forge, &mut state, &store).await;

        let pr = state.pull_request(123).unwrap();
        assert_eq!(
            pr.branch_names().into_iter().collect::<Vec<_>>(),
            vec!["release-3.5"]
        );
    }

    #[tokio::test]
    async fn test_state_saved_after_every_stage() {
        let forge = MockForge::new();
        let store = MemoryStore::default();
        let mut state = TrackerState::default();

        cycle(&forge, &mut state, &store).await;
        assert_eq!(store.save_count(), 4);
    }

    #[tokio::test]
    async fn test_save_failure_stops_the_cycle() {
        let forge = MockForge::new();
        forge.set_issue_labels(123, &["cherry-pick/3.6"]);
        let store = MemoryStore::default();
        store.fail_saves(true);

        let mut state = tracked(123, "release-3.6", picked(500, PickStatus::Merged));
        let result = FetchCycle::new(&forge, forge.repo(), CycleSettings::default())
            .run(&mut state, &store, Utc::now())
            .await;

        assert!(matches!(result, Err(StoreError::Write { .. })));
        assert_eq!(forge.call_count("fetch_repository_labels"), 0);
        assert_eq!(forge.call_count("fetch_releases"), 0);
    }

    #[tokio::test]
    async fn test_repeated_cycles_settle() {
        let forge = MockForge::new();
        forge.set_repository_labels(&["cherry-pick/3.6"]);
        forge.add_merged_pull_request(123, "Fix crash", &["cherry-pick/3.6"]);
        forge.add_comment(123, "bot", "Cherry-pick PR created for 3.6: #500");
        forge.add_open_pull_request(500, "[3.6] Fix crash", "release-3.6");

        let store = MemoryStore::default();
        let mut state = TrackerState::default();
        let first = cycle(&forge, &mut state, &store).await;
        assert_eq!(first.update.transitions.len(), 1);

        let snapshot = state.clone();
        let second = cycle(&forge, &mut state, &store).await;
        assert!(second.sync.changed.is_empty());
        assert!(second.update.transitions.is_empty());
        assert_eq!(
            state.pull_request(123).unwrap(),
            snapshot.pull_request(123).unwrap()
        );
    }

    #[tokio::test]
    async fn test_forge_outage_is_not_fatal() {
        let forge = MockForge::new();
        forge.fail_searches();
        forge.fail_releases();

        let store = MemoryStore::default();
        let mut state = tracked(123, "release-3.6", picked(500, PickStatus::Merged));
        let report = cycle(&forge, &mut state, &store).await;

        // Labels for #123 are unknown to the mock, so sync skips it
        assert_eq!(report.sync.errors, 1);
        assert!(report.release.aborted);
        assert_eq!(status(&state, 123, "release-3.6"), PickStatus::Merged);
        assert_eq!(store.save_count(), 4);
    }
}
