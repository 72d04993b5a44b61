//! Release containment scanning
//!
//! Finds out whether a merged cherry-pick has shipped in a tagged release
//! of its branch. Each branch keeps a checkpoint (the newest release tag
//! already examined), so a cycle only looks at releases published since
//! the previous one.

use crate::labels::branch_version;
use crate::markers::is_pick_of;
use crate::model::{BranchEvent, PickStatus, RepoRef, Transition};
use crate::store::TrackerState;
use crate::updater::BranchTransition;
use gh_client::{Commit, GitHubClient, Release};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A release tag parsed as `[v]MAJOR.MINOR.PATCH[-PRE][+BUILD]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl ReleaseVersion {
    pub fn parse(tag: &str) -> Option<Self> {
        let version = tag.strip_prefix('v').unwrap_or(tag);
        // Build metadata never affects ordering
        let version = match version.split_once('+') {
            Some((version, build)) if !build.is_empty() => version,
            Some(_) => return None,
            None => version,
        };
        let (core, pre) = match version.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return None,
            None => (version, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return None;
        }

        Some(Self {
            major: parts[0].parse().ok()?,
            minor: parts[1].parse().ok()?,
            patch: parts[2].parse().ok()?,
            pre,
        })
    }

    /// Whether this release belongs to the `major.minor` line
    pub fn is_line(&self, major: u64, minor: u64) -> bool {
        self.major == major && self.minor == minor
    }
}

fn compare_pre(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    // Numeric identifiers sort before alphanumeric ones
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_pre(a, b),
            })
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

/// A published release relevant to one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRelease {
    pub tag: String,
    pub version: ReleaseVersion,
}

/// Published releases of the `release-X.Y` branch, newest first
///
/// Drafts, unparsable tags and other release lines are dropped. A branch
/// not named `release-X.Y` has no relevant releases.
pub fn relevant_releases(branch: &str, releases: &[Release]) -> Vec<BranchRelease> {
    let Some((major, minor)) = branch_version(branch) else {
        return Vec::new();
    };

    let mut relevant: Vec<BranchRelease> = releases
        .iter()
        .filter(|release| !release.draft)
        .filter_map(|release| {
            let version = ReleaseVersion::parse(&release.tag_name)?;
            version.is_line(major, minor).then(|| BranchRelease {
                tag: release.tag_name.clone(),
                version,
            })
        })
        .collect();

    relevant.sort_by(|a, b| b.version.cmp(&a.version));
    relevant
}

/// Releases strictly newer than the checkpoint, newest first
///
/// Everything is unchecked when there is no checkpoint or it does not parse.
pub fn unchecked_releases(relevant: Vec<BranchRelease>, checkpoint: Option<&str>) -> Vec<BranchRelease> {
    match checkpoint.and_then(ReleaseVersion::parse) {
        Some(checked) => relevant
            .into_iter()
            .filter(|release| release.version > checked)
            .collect(),
        None => relevant,
    }
}

/// A commit range to search: `base` exclusive (None = start of history), `head` inclusive
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitRange {
    pub base: Option<String>,
    pub head: String,
}

/// Ranges covering the unchecked releases, newest first
///
/// One range per consecutive pair, then the start of history up to the
/// oldest unchecked release.
pub fn scan_ranges(unchecked: &[BranchRelease]) -> Vec<CommitRange> {
    let mut ranges: Vec<CommitRange> = unchecked
        .windows(2)
        .map(|pair| CommitRange {
            base: Some(pair[1].tag.clone()),
            head: pair[0].tag.clone(),
        })
        .collect();

    if let Some(oldest) = unchecked.last() {
        ranges.push(CommitRange {
            base: None,
            head: oldest.tag.clone(),
        });
    }

    ranges
}

/// Outcome of [`scan_releases`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReleaseScanSummary {
    pub released: Vec<BranchTransition>,
    /// New checkpoint per branch
    pub checkpoints: BTreeMap<String, String>,
    /// Commit ranges that could not be fetched
    pub errors: usize,
    /// Releases could not be listed, nothing was scanned
    pub aborted: bool,
}

/// Commit ranges fetched during one scan
struct RangeCache<'a> {
    client: &'a dyn GitHubClient,
    repo: &'a RepoRef,
    ranges: HashMap<CommitRange, Option<Vec<Commit>>>,
    errors: usize,
}

impl<'a> RangeCache<'a> {
    fn new(client: &'a dyn GitHubClient, repo: &'a RepoRef) -> Self {
        Self {
            client,
            repo,
            ranges: HashMap::new(),
            errors: 0,
        }
    }

    /// Commits of a range; `None` if it could not be fetched
    async fn commits(&mut self, range: &CommitRange) -> Option<&[Commit]> {
        if !self.ranges.contains_key(range) {
            let fetched = match &range.base {
                Some(base) => {
                    self.client
                        .compare_commits(&self.repo.owner, &self.repo.name, base, &range.head)
                        .await
                }
                None => {
                    self.client
                        .fetch_commits(&self.repo.owner, &self.repo.name, &range.head)
                        .await
                }
            };

            let commits = match fetched {
                Ok(commits) => Some(commits),
                Err(e) => {
                    log::warn!(
                        "Failed to fetch commits {}..{}: {:#}",
                        range.base.as_deref().unwrap_or("<root>"),
                        range.head,
                        e
                    );
                    self.errors += 1;
                    None
                }
            };
            self.ranges.insert(range.clone(), commits);
        }

        self.ranges.get(range).and_then(|commits| commits.as_deref())
    }
}

/// Mark Merged cherry-picks that shipped in a new release as Released
///
/// Advances each scanned branch's checkpoint to its newest unchecked
/// release, whether or not anything matched.
pub async fn scan_releases(
    client: &dyn GitHubClient,
    repo: &RepoRef,
    state: &mut TrackerState,
) -> ReleaseScanSummary {
    let mut summary = ReleaseScanSummary::default();

    let mut merged: BTreeMap<String, Vec<u64>> = BTreeMap::new();
    for pr in state.pull_requests() {
        for (name, branch) in &pr.branches {
            if branch.status() == PickStatus::Merged && branch.pick().is_some() {
                merged.entry(name.clone()).or_default().push(pr.number);
            }
        }
    }
    if merged.is_empty() {
        return summary;
    }

    let releases = match client.fetch_releases(&repo.owner, &repo.name).await {
        Ok(releases) => releases,
        Err(e) => {
            log::warn!("Failed to list releases, skipping release scan: {:#}", e);
            summary.aborted = true;
            return summary;
        }
    };
    if releases.is_empty() {
        return summary;
    }

    let mut cache = RangeCache::new(client, repo);

    for (branch_name, numbers) in merged {
        let relevant = relevant_releases(&branch_name, &releases);
        let unchecked = unchecked_releases(relevant, state.release_checkpoint(&branch_name));
        let Some(newest) = unchecked.first() else {
            continue;
        };

        log::debug!(
            "{}: {} unchecked releases up to {}",
            branch_name,
            unchecked.len(),
            newest.tag
        );
        state.set_release_checkpoint(branch_name.clone(), newest.tag.clone());
        summary
            .checkpoints
            .insert(branch_name.clone(), newest.tag.clone());

        let ranges = scan_ranges(&unchecked);
        for number in numbers {
            let mut shipped_in = None;
            for range in &ranges {
                let Some(commits) = cache.commits(range).await else {
                    continue;
                };
                if commits.iter().any(|commit| is_pick_of(&commit.message, number)) {
                    shipped_in = Some(range.head.clone());
                    break;
                }
            }

            let Some(tag) = shipped_in else {
                continue;
            };
            let Some(branch) = state
                .pull_request_mut(number)
                .and_then(|pr| pr.branch_mut(&branch_name))
            else {
                continue;
            };

            if let Transition::Changed { from, to } = branch.apply(BranchEvent::Released) {
                log::info!("#{} {}: shipped in {}", number, branch_name, tag);
                summary.released.push(BranchTransition {
                    number,
                    branch: branch_name.clone(),
                    from,
                    to,
                });
            }
        }
    }

    summary.errors = cache.errors;
    summary
}
