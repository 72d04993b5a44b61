//! Tracker facade
//!
//! Loads the state once, runs one operation against the forge and saves
//! the result. This is what the command-line front end talks to.

use crate::cycle::{CycleReport, CycleSettings, FetchCycle};
use crate::error::Result;
use crate::issues;
use crate::maintenance::{self, MergeSummary};
use crate::model::RepoRef;
use crate::store::{StateStore, TrackerState};
use chrono::Utc;
use gh_client::{GitHubClient, IssueComment};

pub struct Tracker<'a> {
    client: &'a dyn GitHubClient,
    store: &'a dyn StateStore,
    repo: RepoRef,
    settings: CycleSettings,
    state: TrackerState,
}

impl<'a> Tracker<'a> {
    /// Load the state from `store`
    pub fn open(
        client: &'a dyn GitHubClient,
        store: &'a dyn StateStore,
        repo: RepoRef,
        settings: CycleSettings,
    ) -> Result<Self> {
        let state = store.load()?;
        Ok(Self {
            client,
            store,
            repo,
            settings,
            state,
        })
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    fn save(&self) -> Result<()> {
        self.store.save(&self.state)?;
        Ok(())
    }

    /// Run a full fetch cycle
    pub async fn fetch(&mut self) -> Result<CycleReport> {
        let cycle = FetchCycle::new(self.client, self.repo.clone(), self.settings.clone());
        let report = cycle.run(&mut self.state, self.store, Utc::now()).await?;
        Ok(report)
    }

    pub fn set_ignored(&mut self, number: u64, ignored: bool) -> Result<bool> {
        let changed = maintenance::set_ignored(&mut self.state, number, ignored)?;
        self.save()?;
        Ok(changed)
    }

    /// Re-run failed CI of open cherry-picks, returning the number of restarted runs
    pub async fn retry_failed_ci(&mut self) -> Result<usize> {
        let restarted = maintenance::retry_failed_ci(self.client, &self.repo, &self.state).await;
        self.save()?;
        Ok(restarted)
    }

    pub async fn merge_ready_picks(&mut self) -> Result<MergeSummary> {
        let summary = maintenance::merge_ready_picks(self.client, &self.repo, &mut self.state).await;
        self.save()?;
        Ok(summary)
    }

    pub fn set_tracker_issue(&mut self, branch: &str, issue: u64) -> Result<()> {
        issues::set_tracker_issue(&mut self.state, branch, issue);
        self.save()
    }

    pub fn clear_tracker_issue(&mut self, branch: &str) -> Result<u64> {
        let issue = issues::clear_tracker_issue(&mut self.state, branch)?;
        self.save()?;
        Ok(issue)
    }

    pub async fn publish_tracker_comment(&mut self, branch: &str, body: &str) -> Result<IssueComment> {
        let comment =
            issues::publish_tracker_comment(self.client, &self.repo, &self.state, branch, body)
                .await?;
        self.save()?;
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::model::PickStatus;
    use crate::store::MemoryStore;
    use crate::testing::MockForge;

    #[tokio::test]
    async fn test_fetch_then_ignore_persists() {
        let forge = MockForge::new();
        forge.set_repository_labels(&["cherry-pick/3.6"]);
        forge.add_merged_pull_request(123, "Fix crash", &["cherry-pick/3.6"]);
        let store = MemoryStore::default();

        let mut tracker =
            Tracker::open(&forge, &store, forge.repo(), CycleSettings::default()).unwrap();
        tracker.fetch().await.unwrap();
        assert_eq!(
            tracker.state().pull_request(123).unwrap().branch("release-3.6").unwrap().status(),
            PickStatus::Pending
        );

        assert!(tracker.set_ignored(123, true).unwrap());
        assert!(store.snapshot().pull_request(123).unwrap().ignored);

        // A new tracker sees what the previous one saved
        let reopened =
            Tracker::open(&forge, &store, forge.repo(), CycleSettings::default()).unwrap();
        assert!(reopened.state().pull_request(123).unwrap().ignored);
    }

    #[tokio::test]
    async fn test_tracker_issue_round_trip() {
        let forge = MockForge::new();
        let store = MemoryStore::default();
        let mut tracker =
            Tracker::open(&forge, &store, forge.repo(), CycleSettings::default()).unwrap();

        tracker.set_tracker_issue("release-3.6", 77).unwrap();
        assert_eq!(store.snapshot().tracker_issue("release-3.6"), Some(77));

        tracker
            .publish_tracker_comment("release-3.6", "report")
            .await
            .unwrap();
        assert_eq!(forge.comments(77).len(), 1);

        assert_eq!(tracker.clear_tracker_issue("release-3.6").unwrap(), 77);
        assert!(matches!(
            tracker.publish_tracker_comment("release-3.6", "report").await,
            Err(TrackerError::UnknownBranch(_))
        ));
    }

    #[test]
    fn test_failed_save_is_reported() {
        let forge = MockForge::new();
        let store = MemoryStore::default();
        let mut tracker =
            Tracker::open(&forge, &store, forge.repo(), CycleSettings::default()).unwrap();
        store.fail_saves(true);

        assert!(matches!(
            tracker.set_tracker_issue("release-3.6", 1),
            Err(TrackerError::Store(_))
        ));
    }
}
