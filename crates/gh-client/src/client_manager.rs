//! Multi-host GitHub client manager
//!
//! Manages GitHub API clients for different hosts (github.com, GitHub Enterprise).
//! Clients are lazily initialized and cached per host.

use crate::{OctocrabClient, DEFAULT_HOST};
use anyhow::{Context, Result};
use log::{debug, info};
use octocrab::Octocrab;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves GitHub tokens for different hosts
///
/// Tries multiple sources in order:
/// 1. Host-specific env var (e.g., `GITHUB_TOKEN_GHE_EXAMPLE_COM`)
/// 2. `gh auth token --hostname {host}` command
/// 3. Generic `GITHUB_TOKEN` or `GH_TOKEN` (github.com only)
#[derive(Debug, Clone)]
pub struct TokenResolver {
    /// Cached default token from GITHUB_TOKEN/GH_TOKEN
    default_token: Option<String>,
}

impl Default for TokenResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenResolver {
    /// Create a new token resolver
    pub fn new() -> Self {
        let default_token = std::env::var("GITHUB_TOKEN")
            .or_else(|_| std::env::var("GH_TOKEN"))
            .ok();

        Self { default_token }
    }

    /// Name of the host-specific token variable
    pub fn env_key(host: &str) -> String {
        format!(
            "GITHUB_TOKEN_{}",
            host.replace(['.', '-'], "_").to_uppercase()
        )
    }

    /// Get a token for the given host
    ///
    /// # Token Resolution Order
    ///
    /// 1. `GITHUB_TOKEN_{HOST}` env var (e.g., `GITHUB_TOKEN_GHE_EXAMPLE_COM`)
    /// 2. `gh auth token --hostname {host}` command
    /// 3. `GITHUB_TOKEN` or `GH_TOKEN` (github.com only)
    pub async fn get_token(&self, host: Option<&str>) -> Result<String> {
        let host = host.unwrap_or(DEFAULT_HOST);

        let env_key = Self::env_key(host);
        if let Ok(token) = std::env::var(&env_key) {
            debug!("Using token from env var {} for host {}", env_key, host);
            return Ok(token);
        }

        debug!("Trying gh auth token for host {}", host);
        let output = tokio::process::Command::new("gh")
            .args(["auth", "token", "--hostname", host])
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let token = String::from_utf8(output.stdout)
                    .context("Invalid UTF-8 in gh auth token output")?
                    .trim()
                    .to_string();
                if !token.is_empty() {
                    debug!("Using token from gh CLI for host {}", host);
                    return Ok(token);
                }
            }
            Ok(_) => debug!("gh auth token returned no token for {}", host),
            Err(e) => debug!("Could not run gh CLI: {}", e),
        }

        // Fallback to default token (for github.com only)
        if host == DEFAULT_HOST {
            if let Some(ref token) = self.default_token {
                debug!("Using default token (GITHUB_TOKEN/GH_TOKEN) for github.com");
                return Ok(token.clone());
            }
        }

        Err(anyhow::anyhow!(
            "No token found for host '{}'. \
             Set {} or run 'gh auth login --hostname {}'",
            host,
            env_key,
            host
        ))
    }
}

/// Manages GitHub API clients for multiple hosts
///
/// Lazily creates and caches clients per host. Each client is configured
/// with the appropriate base URL and authentication token.
pub struct ClientManager {
    /// Cached clients per host
    clients: HashMap<String, OctocrabClient>,
    /// Token resolver
    tokens: TokenResolver,
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            tokens: TokenResolver::new(),
        }
    }

    /// Get a clone of the client for the given host, creating it on first use
    ///
    /// # Arguments
    ///
    /// * `host` - The GitHub host (None = github.com)
    pub async fn client(&mut self, host: Option<&str>) -> Result<OctocrabClient> {
        let key = host.unwrap_or(DEFAULT_HOST).to_string();

        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let client = self.create_client(host).await?;
        self.clients.insert(key, client.clone());
        Ok(client)
    }

    /// Check if a client exists for the given host (without creating one)
    pub fn has_client(&self, host: Option<&str>) -> bool {
        let key = host.unwrap_or(DEFAULT_HOST);
        self.clients.contains_key(key)
    }

    /// Base API URL for a host
    fn api_base_url(host: Option<&str>) -> Option<String> {
        match host {
            Some(h) if h != DEFAULT_HOST => Some(format!("https://{}/api/v3", h)),
            _ => None,
        }
    }

    /// Create a new client for the given host
    async fn create_client(&self, host: Option<&str>) -> Result<OctocrabClient> {
        let effective_host = host.unwrap_or(DEFAULT_HOST);
        info!("Creating GitHub client for host: {}", effective_host);

        let token = self.tokens.get_token(host).await?;

        let mut builder = Octocrab::builder().personal_token(token);
        if let Some(uri) = Self::api_base_url(host) {
            builder = builder.base_uri(&uri).context("Failed to set base URI")?;
        }

        let octocrab = builder.build().context("Failed to build Octocrab client")?;

        info!("GitHub client created for host: {}", effective_host);
        Ok(OctocrabClient::new(Arc::new(octocrab)))
    }
}
