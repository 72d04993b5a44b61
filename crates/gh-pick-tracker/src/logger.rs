//! Logging using simplelog
//!
//! Everything goes to a timestamped run log; the terminal gets the same
//! lines filtered by `--verbose` / `RUST_LOG`.
//!
//! Log file location depends on build type:
//! - Debug builds: current working directory (for development convenience)
//! - Release builds: cache directory (~/.cache/gh-pick-tracker/ on Linux)

use anyhow::{Context, Result};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::File;
use std::path::PathBuf;

/// Get the log file path based on build type
fn log_file_path() -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let filename = format!("run-{}.log", timestamp);

    if cfg!(debug_assertions) {
        PathBuf::from(filename)
    } else {
        gh_pick_config::cache_dir()
            .map(|dir| dir.join(&filename))
            .unwrap_or_else(|_| PathBuf::from(filename))
    }
}

/// Terminal level: `--verbose` wins, then `RUST_LOG`, then info
fn terminal_level(verbose: bool) -> LevelFilter {
    if verbose {
        return LevelFilter::Debug;
    }
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Initialize terminal and file logging
///
/// Returns the path of the run log.
pub fn init(verbose: bool) -> Result<PathBuf> {
    let log_file = log_file_path();

    // Configure simplelog with timestamps
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_time_offset_to_local()
        .unwrap_or_else(|c| c) // Fallback if local time offset fails
        .add_filter_ignore_str("octocrab")
        .add_filter_ignore_str("hyper")
        .build();

    let file = File::create(&log_file)
        .with_context(|| format!("Failed to create log file: {:?}", log_file))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            terminal_level(verbose),
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, config, file),
    ])
    .context("Failed to initialize logger")?;

    Ok(log_file)
}
