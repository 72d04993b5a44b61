//! Textual cherry-pick signals
//!
//! Pure functions from comment bodies, titles and commit messages to
//! structured matches. Nothing here touches the network.

use crate::labels::branch_for_version;
use regex::Regex;
use std::sync::OnceLock;

/// What the cherry-pick bot reported for one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotOutcome {
    /// A cherry-pick pull request was opened
    Created(u64),
    /// The automated cherry-pick did not apply
    Failed,
}

/// One bot report found in a comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotMarker {
    /// Release version as written by the bot (e.g. `3.6`)
    pub version: String,
    pub outcome: BotOutcome,
}

impl BotMarker {
    pub fn branch(&self) -> String {
        branch_for_version(&self.version)
    }
}

fn created_regex() -> &'static Regex {
    static CREATED: OnceLock<Regex> = OnceLock::new();
    CREATED.get_or_init(|| {
        Regex::new(r"(?i)cherry-pick PR created for (\d+\.\d+):\s*#(\d+)").unwrap()
    })
}

fn manual_pick_regex() -> &'static Regex {
    static MANUAL: OnceLock<Regex> = OnceLock::new();
    MANUAL.get_or_init(|| Regex::new(r"(?i)cherry-pick\b").unwrap())
}

/// Whole numbers only, so `#1234` never yields `123`
fn number_regex() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"\b\d+\b").unwrap())
}

fn failed_regex() -> &'static Regex {
    static FAILED: OnceLock<Regex> = OnceLock::new();
    FAILED.get_or_init(|| Regex::new(r"(?i)cherry-pick failed for (\d+\.\d+)").unwrap())
}

fn trailer_regex() -> &'static Regex {
    static TRAILER: OnceLock<Regex> = OnceLock::new();
    TRAILER.get_or_init(|| Regex::new(r"\(cherry picked from commit [0-9a-fA-F]{4,40}\)").unwrap())
}

/// Reference patterns, highest priority first
fn reference_regexes() -> &'static [Regex; 3] {
    static REFERENCES: OnceLock<[Regex; 3]> = OnceLock::new();
    REFERENCES.get_or_init(|| {
        [
            // "Fix the thing (#123)"
            Regex::new(r"\(#(\d+)\)").unwrap(),
            // "Fixes #123", "Closes #123"
            Regex::new(r"(?i)\b(?:fix(?:e[sd])?|close[sd]?|resolve[sd]?)\s+#(\d+)\b").unwrap(),
            // bare "#123"
            Regex::new(r"#(\d+)\b").unwrap(),
        ]
    })
}

/// Extract every bot report from a comment body, in text order
pub fn parse_bot_comment(body: &str) -> Vec<BotMarker> {
    let mut markers: Vec<(usize, BotMarker)> = Vec::new();

    for caps in created_regex().captures_iter(body) {
        let (Some(whole), Some(version), Some(number)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let Ok(number) = number.as_str().parse::<u64>() else {
            continue;
        };
        if number == 0 {
            continue;
        }
        markers.push((
            whole.start(),
            BotMarker {
                version: version.as_str().to_string(),
                outcome: BotOutcome::Created(number),
            },
        ));
    }

    for caps in failed_regex().captures_iter(body) {
        let (Some(whole), Some(version)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        markers.push((
            whole.start(),
            BotMarker {
                version: version.as_str().to_string(),
                outcome: BotOutcome::Failed,
            },
        ));
    }

    markers.sort_by_key(|(offset, _)| *offset);
    markers.into_iter().map(|(_, marker)| marker).collect()
}

/// Whether a title names a manual cherry-pick of `original`
///
/// Matches "cherry-pick" followed later by the number, optionally
/// prefixed with `#`, without matching longer numbers that merely
/// contain it.
pub fn is_manual_pick_title(title: &str, original: u64) -> bool {
    let Some(keyword) = manual_pick_regex().find(title) else {
        return false;
    };
    let wanted = original.to_string();
    number_regex()
        .find_iter(&title[keyword.end()..])
        .any(|number| number.as_str() == wanted)
}

/// Whether a commit message carries a `(cherry picked from commit <sha>)` trailer
pub fn has_cherry_pick_trailer(message: &str) -> bool {
    trailer_regex().is_match(message)
}

/// Pull request numbers a message refers to, in priority order
///
/// An explicit `(#N)` suffix ranks first, then `Fixes #N` / `Closes #N`,
/// then any bare `#N`. Each number appears once, at its highest rank.
pub fn referenced_pr_numbers(message: &str) -> Vec<u64> {
    let mut numbers = Vec::new();

    for re in reference_regexes() {
        for caps in re.captures_iter(message) {
            if let Some(number) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
                if !numbers.contains(&number) {
                    numbers.push(number);
                }
            }
        }
    }

    numbers
}

/// The single most likely pull request a message belongs to
pub fn primary_pr_number(message: &str) -> Option<u64> {
    referenced_pr_numbers(message).into_iter().next()
}

/// Whether a commit message is a cherry-pick of pull request `original`
///
/// Textual only: the trailer must be present and the message must
/// reference `#original` somewhere.
pub fn is_pick_of(message: &str, original: u64) -> bool {
    has_cherry_pick_trailer(message) && referenced_pr_numbers(message).contains(&original)
}
