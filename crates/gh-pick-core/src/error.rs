//! Error types for the tracker core

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading or saving the tracked state
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize tracked state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by tracker operations
///
/// Inside a fetch cycle only [`TrackerError::Store`] escapes; forge failures
/// are logged and the affected unit of work is skipped.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Pull request #{0} is not tracked")]
    UnknownPullRequest(u64),

    #[error("No tracker issue configured for branch {0}")]
    UnknownBranch(String),

    #[error("Forge request failed: {0:#}")]
    Forge(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_names_path() {
        let err = StoreError::Write {
            path: PathBuf::from("/tmp/state.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/state.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_tracker_error_messages() {
        assert_eq!(
            TrackerError::UnknownPullRequest(42).to_string(),
            "Pull request #42 is not tracked"
        );
        assert!(TrackerError::UnknownBranch("release-3.6".to_string())
            .to_string()
            .contains("release-3.6"));
        assert!(TrackerError::Forge(anyhow::anyhow!("rate limited"))
            .to_string()
            .contains("rate limited"));
    }
}
