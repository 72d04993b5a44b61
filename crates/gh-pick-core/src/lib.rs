//! Cherry-pick reconciliation engine
//!
//! Tracks which merged pull requests still have to reach which release
//! branches and reconciles that tracking state against the forge:
//!
//! - [`sync`] keeps each pull request's target branches in line with its
//!   `cherry-pick/X.Y` labels and discovers newly merged labelled ones
//! - [`detector`] finds cherry-pick pull requests from bot comments and
//!   manually titled pull requests
//! - [`updater`] advances each branch through the [`model`] state machine
//!   using the [`ci`] gateway
//! - [`release`] marks merged cherry-picks Released once they ship in a tag
//! - [`cycle`] runs those stages in order, saving through a [`store`]
//!   after each one
//!
//! ```rust,ignore
//! use gh_pick_core::{CycleSettings, JsonFileStore, RepoRef, Tracker};
//!
//! let store = JsonFileStore::new("state.json");
//! let mut tracker = Tracker::open(&client, &store, RepoRef::new("acme", "widgets"), CycleSettings::default())?;
//! let report = tracker.fetch().await?;
//! ```

pub mod ci;
pub mod cycle;
pub mod detector;
pub mod error;
pub mod issues;
pub mod labels;
pub mod maintenance;
pub mod markers;
pub mod model;
pub mod release;
pub mod store;
pub mod sync;
pub mod tracker;
pub mod updater;

#[cfg(test)]
mod testing;

pub use cycle::{CycleReport, CycleSettings, FetchCycle};
pub use detector::{Candidate, CandidateProvider, CandidateSource, Detector};
pub use error::{StoreError, TrackerError};
pub use maintenance::MergeSummary;
pub use model::{
    BranchEvent, BranchStatus, CiState, PickPullRequest, PickStatus, RepoRef, TrackedPullRequest,
    Transition,
};
pub use release::{ReleaseScanSummary, ReleaseVersion};
pub use store::{JsonFileStore, MemoryStore, StateStore, TrackerState};
pub use tracker::Tracker;
pub use updater::{BranchTransition, UpdateSummary};
