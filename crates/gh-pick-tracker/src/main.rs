//! gh-pick-tracker - track cherry-picks into release branches
//!
//! ## Commands
//!
//! - `fetch`: reconcile the tracked state against GitHub
//! - `ignore` / `unignore`: hide a pull request from maintenance commands
//! - `retry-ci`: re-run failed workflows of open cherry-picks
//! - `merge-ready`: squash-merge cherry-picks whose CI passes
//! - `tracker-issue`: set or clear a branch's tracker issue
//! - `publish`: post a report to a branch's tracker issue

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gh_client::{ClientManager, GitHubClient};
use gh_pick_config::AppConfig;
use gh_pick_core::{
    BranchTransition, CycleReport, CycleSettings, JsonFileStore, MemoryStore, RepoRef, StateStore,
    Tracker,
};
use std::path::PathBuf;

mod logger;

#[derive(Parser)]
#[command(name = "gh-pick-tracker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track cherry-picks of merged pull requests into release branches", long_about = None)]
struct Cli {
    /// Config file (default: ./.gh-pick-tracker.toml, then ~/.gh-pick-tracker.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository to track, overriding the config file
    #[arg(long, global = true, value_name = "OWNER/NAME")]
    repo: Option<String>,

    /// Tracked-state file, overriding the config file
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync labels, discover new pull requests, update statuses and scan releases
    Fetch {
        /// Run against a copy of the state and leave the state file untouched
        #[arg(long)]
        dry_run: bool,
    },

    /// Ignore a tracked pull request
    Ignore {
        /// Original pull request number
        number: u64,
    },

    /// Stop ignoring a tracked pull request
    Unignore {
        /// Original pull request number
        number: u64,
    },

    /// Re-run failed workflow jobs of cherry-picks with failing CI
    RetryCi,

    /// Squash-merge cherry-picks whose CI passes
    MergeReady,

    /// Set the tracker issue of a branch, or clear it when no issue is given
    TrackerIssue {
        /// Release branch (e.g. release-3.6)
        branch: String,

        /// Issue number
        issue: Option<u64>,
    },

    /// Post or update the report comment on a branch's tracker issue
    Publish {
        /// Release branch (e.g. release-3.6)
        branch: String,

        /// File containing the comment body
        #[arg(long)]
        body_file: PathBuf,
    },
}

/// Resolve the effective config from the config file and command-line overrides
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match (AppConfig::load(cli.config.as_deref())?, &cli.repo) {
        (Some(config), _) => config,
        (None, Some(spec)) => AppConfig::from_repository_spec(spec)?,
        (None, None) => bail!(
            "No config file found. Create .gh-pick-tracker.toml or pass --repo OWNER/NAME"
        ),
    };

    if let Some(spec) = &cli.repo {
        config.set_repository(spec)?;
    }
    if let Some(path) = &cli.state {
        config.state_file = Some(path.clone());
    }

    Ok(config)
}

fn print_transitions(label: &str, transitions: &[BranchTransition]) {
    for t in transitions {
        println!("{} #{} {}: {} -> {}", label, t.number, t.branch, t.from, t.to);
    }
}

fn print_report(report: &CycleReport) {
    for number in &report.discovery.added {
        println!("tracking #{}", number);
    }
    for number in &report.pruned {
        println!("dropped  #{}", number);
    }
    print_transitions("update  ", &report.update.transitions);
    print_transitions("release ", &report.release.released);
    for (branch, tag) in &report.release.checkpoints {
        println!("checked  {} up to {}", branch, tag);
    }
    if report.error_count() > 0 {
        println!(
            "{} forge requests failed, see the log for details",
            report.error_count()
        );
    }
}

async fn run(cli: Cli, client: &dyn GitHubClient, config: &AppConfig) -> Result<()> {
    let repo = RepoRef::new(&config.owner, &config.repo);
    let settings = CycleSettings {
        source_branch: config.source_branch.clone(),
        initial_lookback_days: config.initial_lookback_days,
    };
    let state_path = config.state_path()?;
    log::debug!("State file: {:?}", state_path);
    let file_store = JsonFileStore::new(state_path);

    match cli.command {
        Commands::Fetch { dry_run: true } => {
            let memory = MemoryStore::new(file_store.load()?);
            let mut tracker = Tracker::open(client, &memory, repo, settings)?;
            let report = tracker.fetch().await?;
            print_report(&report);
            println!("dry run: state file left unchanged");
        }
        Commands::Fetch { dry_run: false } => {
            let mut tracker = Tracker::open(client, &file_store, repo, settings)?;
            let report = tracker.fetch().await?;
            print_report(&report);
        }
        Commands::Ignore { number } => {
            let mut tracker = Tracker::open(client, &file_store, repo, settings)?;
            if tracker.set_ignored(number, true)? {
                println!("#{} ignored", number);
            }
        }
        Commands::Unignore { number } => {
            let mut tracker = Tracker::open(client, &file_store, repo, settings)?;
            if tracker.set_ignored(number, false)? {
                println!("#{} no longer ignored", number);
            }
        }
        Commands::RetryCi => {
            let mut tracker = Tracker::open(client, &file_store, repo, settings)?;
            let restarted = tracker.retry_failed_ci().await?;
            println!("re-running {} workflow runs", restarted);
        }
        Commands::MergeReady => {
            let mut tracker = Tracker::open(client, &file_store, repo, settings)?;
            let summary = tracker.merge_ready_picks().await?;
            print_transitions("merged  ", &summary.merged);
            if summary.errors > 0 {
                println!("{} cherry-picks could not be merged", summary.errors);
            }
        }
        Commands::TrackerIssue {
            branch,
            issue: Some(issue),
        } => {
            let mut tracker = Tracker::open(client, &file_store, repo, settings)?;
            tracker.set_tracker_issue(&branch, issue)?;
            println!("{} -> #{}", branch, issue);
        }
        Commands::TrackerIssue {
            branch,
            issue: None,
        } => {
            let mut tracker = Tracker::open(client, &file_store, repo, settings)?;
            let issue = tracker.clear_tracker_issue(&branch)?;
            println!("{} no longer reports to #{}", branch, issue);
        }
        Commands::Publish { branch, body_file } => {
            let body = std::fs::read_to_string(&body_file)
                .with_context(|| format!("Failed to read comment body: {:?}", body_file))?;
            let mut tracker = Tracker::open(client, &file_store, repo, settings)?;
            let comment = tracker.publish_tracker_comment(&branch, &body).await?;
            println!("published comment {} for {}", comment.id, branch);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = logger::init(cli.verbose)?;
    log::debug!("Writing run log to {:?}", log_file);

    // Load .env file if GITHUB_TOKEN not set
    if std::env::var("GITHUB_TOKEN").is_err() {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("Loaded .env file from: {:?}", path),
            Err(_) => log::debug!(".env file not found, will rely on environment variables"),
        }
    }

    let config = resolve_config(&cli)?;
    log::info!("Tracking {}", config.repository());

    let mut clients = ClientManager::new();
    let client = clients.client(config.host.as_deref()).await?;
    match client.fetch_current_user().await {
        Ok(user) => log::info!("Authenticated as {}", user.login),
        Err(e) => log::warn!("Could not resolve the authenticated user: {:#}", e),
    }

    run(cli, &client, &config).await
}
