//! Label and branch naming conventions
//!
//! A label `cherry-pick/X.Y` asks for the change on branch `release-X.Y`.

use std::collections::BTreeSet;

pub const LABEL_PREFIX: &str = "cherry-pick/";
pub const BRANCH_PREFIX: &str = "release-";

/// `cherry-pick/3.6` → `release-3.6`
pub fn branch_for_label(label: &str) -> Option<String> {
    label
        .strip_prefix(LABEL_PREFIX)
        .filter(|version| !version.is_empty())
        .map(branch_for_version)
}

/// `release-3.6` → `cherry-pick/3.6`
pub fn label_for_branch(branch: &str) -> Option<String> {
    branch
        .strip_prefix(BRANCH_PREFIX)
        .filter(|version| !version.is_empty())
        .map(|version| format!("{}{}", LABEL_PREFIX, version))
}

/// `3.6` → `release-3.6`
pub fn branch_for_version(version: &str) -> String {
    format!("{}{}", BRANCH_PREFIX, version)
}

pub fn is_pick_label(label: &str) -> bool {
    branch_for_label(label).is_some()
}

/// Target branches implied by a set of labels; unrelated labels are ignored
pub fn branches_for_labels<I, S>(labels: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .filter_map(|label| branch_for_label(label.as_ref()))
        .collect()
}

/// `release-3.6` → `(3, 6)`; anything else is `None`
pub fn branch_version(branch: &str) -> Option<(u64, u64)> {
    let version = branch.strip_prefix(BRANCH_PREFIX)?;
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}
