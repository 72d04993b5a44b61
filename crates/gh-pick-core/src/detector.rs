//! Cherry-pick origin detection
//!
//! Candidate cherry-pick pull requests come from more than one place. Each
//! place is a [`CandidateProvider`]; the [`Detector`] asks them in order and
//! merges their answers per branch, later providers overriding earlier ones.
//! The default order puts manually opened pull requests after bot comments,
//! so a human-confirmed pick wins over what the bot reported.

use crate::markers::{is_manual_pick_title, parse_bot_comment, BotOutcome};
use crate::model::RepoRef;
use async_trait::async_trait;
use gh_client::{GitHubClient, PullRequestQuery};
use std::collections::{BTreeMap, BTreeSet};

/// Where a candidate was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    BotComment,
    ManualPullRequest,
}

/// One provider's finding for one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub branch: String,
    /// Cherry-pick pull request, absent for failure reports
    pub pick_number: Option<u64>,
    pub failed: bool,
    pub source: CandidateSource,
}

impl Candidate {
    pub fn created(branch: impl Into<String>, pick_number: u64, source: CandidateSource) -> Self {
        Self {
            branch: branch.into(),
            pick_number: Some(pick_number),
            failed: false,
            source,
        }
    }

    pub fn failed(branch: impl Into<String>, source: CandidateSource) -> Self {
        Self {
            branch: branch.into(),
            pick_number: None,
            failed: true,
            source,
        }
    }
}

/// A source of cherry-pick candidates for an original pull request
#[async_trait]
pub trait CandidateProvider: Send + Sync {
    fn source(&self) -> CandidateSource;

    /// Candidates for `original` restricted to `branches`
    async fn candidates(
        &self,
        client: &dyn GitHubClient,
        repo: &RepoRef,
        original: u64,
        branches: &BTreeSet<String>,
    ) -> anyhow::Result<Vec<Candidate>>;
}

/// Reads the cherry-pick bot's comments on the original pull request
pub struct BotCommentProvider;

#[async_trait]
impl CandidateProvider for BotCommentProvider {
    fn source(&self) -> CandidateSource {
        CandidateSource::BotComment
    }

    async fn candidates(
        &self,
        client: &dyn GitHubClient,
        repo: &RepoRef,
        original: u64,
        branches: &BTreeSet<String>,
    ) -> anyhow::Result<Vec<Candidate>> {
        let comments = client
            .fetch_issue_comments(&repo.owner, &repo.name, original)
            .await?;

        let candidates = comments
            .iter()
            .flat_map(|comment| parse_bot_comment(&comment.body))
            .filter_map(|marker| {
                let branch = marker.branch();
                if !branches.contains(&branch) {
                    return None;
                }
                Some(match marker.outcome {
                    BotOutcome::Created(number) => {
                        Candidate::created(branch, number, CandidateSource::BotComment)
                    }
                    BotOutcome::Failed => Candidate::failed(branch, CandidateSource::BotComment),
                })
            })
            .collect();

        Ok(candidates)
    }
}

/// Searches for pull requests whose title marks them as a manual cherry-pick
pub struct ManualPullRequestProvider;

#[async_trait]
impl CandidateProvider for ManualPullRequestProvider {
    fn source(&self) -> CandidateSource {
        CandidateSource::ManualPullRequest
    }

    async fn candidates(
        &self,
        client: &dyn GitHubClient,
        repo: &RepoRef,
        original: u64,
        branches: &BTreeSet<String>,
    ) -> anyhow::Result<Vec<Candidate>> {
        let query =
            PullRequestQuery::default().with_title_terms(["cherry-pick".to_string(), original.to_string()]);
        let hits = client
            .search_pull_requests(&repo.owner, &repo.name, &query)
            .await?;

        let mut candidates = Vec::new();
        for hit in hits {
            if hit.number == original || !is_manual_pick_title(&hit.title, original) {
                continue;
            }

            let pr = match client
                .fetch_pull_request(&repo.owner, &repo.name, hit.number)
                .await
            {
                Ok(pr) => pr,
                Err(e) => {
                    log::warn!("Failed to fetch manual pick #{}: {:#}", hit.number, e);
                    continue;
                }
            };

            if branches.contains(&pr.base_branch) {
                candidates.push(Candidate::created(
                    pr.base_branch,
                    hit.number,
                    CandidateSource::ManualPullRequest,
                ));
            }
        }

        Ok(candidates)
    }
}

/// Merge provider outputs per branch; a later record replaces an earlier one
pub fn merge_candidates<I>(lists: I) -> BTreeMap<String, Candidate>
where
    I: IntoIterator<Item = Vec<Candidate>>,
{
    let mut merged = BTreeMap::new();
    for candidate in lists.into_iter().flatten() {
        merged.insert(candidate.branch.clone(), candidate);
    }
    merged
}

/// Runs the candidate providers in precedence order
pub struct Detector {
    providers: Vec<Box<dyn CandidateProvider>>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(vec![
            Box::new(BotCommentProvider),
            Box::new(ManualPullRequestProvider),
        ])
    }
}

impl Detector {
    /// Providers listed later take precedence
    pub fn new(providers: Vec<Box<dyn CandidateProvider>>) -> Self {
        Self { providers }
    }

    /// The winning candidate per branch for `original`
    ///
    /// A provider that fails contributes nothing this time.
    pub async fn detect(
        &self,
        client: &dyn GitHubClient,
        repo: &RepoRef,
        original: u64,
        branches: &BTreeSet<String>,
    ) -> BTreeMap<String, Candidate> {
        let mut lists = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            match provider.candidates(client, repo, original, branches).await {
                Ok(candidates) => {
                    log::debug!(
                        "{:?} found {} candidates for #{}",
                        provider.source(),
                        candidates.len(),
                        original
                    );
                    lists.push(candidates);
                }
                Err(e) => {
                    log::warn!(
                        "{:?} lookup failed for #{}: {:#}",
                        provider.source(),
                        original,
                        e
                    );
                }
            }
        }

        merge_candidates(lists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockForge;

    fn tracked(branches: &[&str]) -> BTreeSet<String> {
        branches.iter().map(|b| b.to_string()).collect()
    }

    #[test]
    fn test_merge_later_wins() {
        let bot = vec![
            Candidate::created("release-3.6", 500, CandidateSource::BotComment),
            Candidate::failed("release-3.5", CandidateSource::BotComment),
        ];
        let manual = vec![Candidate::created(
            "release-3.6",
            600,
            CandidateSource::ManualPullRequest,
        )];

        let merged = merge_candidates([bot, manual]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["release-3.6"].pick_number, Some(600));
        assert_eq!(merged["release-3.6"].source, CandidateSource::ManualPullRequest);
        assert!(merged["release-3.5"].failed);
    }

    #[test]
    fn test_merge_within_one_source_keeps_last_report() {
        let bot = vec![
            Candidate::failed("release-3.6", CandidateSource::BotComment),
            Candidate::created("release-3.6", 700, CandidateSource::BotComment),
        ];
        let merged = merge_candidates([bot]);
        assert_eq!(merged["release-3.6"].pick_number, Some(700));
        assert!(!merged["release-3.6"].failed);
    }

    #[tokio::test]
    async fn test_bot_comments_restricted_to_tracked_branches() {
        let forge = MockForge::new();
        forge.add_comment(
            123,
            "cherry-pick-bot",
            "Cherry-pick PR created for 3.6: #500\nCherry-pick failed for 3.4",
        );
        forge.add_comment(123, "someone", "Cherry-pick PR created for 9.9: #900");

        let candidates = BotCommentProvider
            .candidates(
                &forge,
                &forge.repo(),
                123,
                &tracked(&["release-3.4", "release-3.6"]),
            )
            .await
            .unwrap();

        assert_eq!(
            candidates,
            vec![
                Candidate::created("release-3.6", 500, CandidateSource::BotComment),
                Candidate::failed("release-3.4", CandidateSource::BotComment),
            ]
        );
    }

    #[tokio::test]
    async fn test_manual_provider_filters_hits() {
        let forge = MockForge::new();
        // The original itself mentions cherry-pick and its own number
        forge.add_merged_pull_request_on(123, "cherry-pick helper for #123", &[], "main");
        forge.add_open_pull_request(600, "Cherry-pick #123 onto 3.6", "release-3.6");
        forge.add_open_pull_request(601, "Cherry-pick #123 onto 2.0", "release-2.0");
        forge.add_open_pull_request(602, "Cherry-pick #1234", "release-3.6");

        let candidates = ManualPullRequestProvider
            .candidates(&forge, &forge.repo(), 123, &tracked(&["release-3.6"]))
            .await
            .unwrap();

        assert_eq!(
            candidates,
            vec![Candidate::created(
                "release-3.6",
                600,
                CandidateSource::ManualPullRequest
            )]
        );
    }

    #[tokio::test]
    async fn test_manual_candidate_overrides_bot() {
        let forge = MockForge::new();
        forge.add_comment(123, "bot", "Cherry-pick PR created for 3.6: #500");
        forge.add_open_pull_request(500, "[3.6] Fix crash", "release-3.6");
        forge.add_open_pull_request(600, "cherry-pick 123", "release-3.6");

        let detected = Detector::default()
            .detect(&forge, &forge.repo(), 123, &tracked(&["release-3.6"]))
            .await;

        let winner = &detected["release-3.6"];
        assert_eq!(winner.pick_number, Some(600));
        assert_eq!(winner.source, CandidateSource::ManualPullRequest);
    }

    #[tokio::test]
    async fn test_failing_provider_contributes_nothing() {
        let forge = MockForge::new();
        forge.add_comment(123, "bot", "Cherry-pick PR created for 3.6: #500");
        forge.fail_searches();

        let detected = Detector::default()
            .detect(&forge, &forge.repo(), 123, &tracked(&["release-3.6"]))
            .await;

        assert_eq!(detected["release-3.6"].pick_number, Some(500));
        assert_eq!(detected["release-3.6"].source, CandidateSource::BotComment);
    }
}
