//! GitHub OAuth token resolution.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use ckb_faucet_service::{Identity, IdentityError, IdentityResolver};

const USER_AGENT: &str = concat!("ckb-faucet/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: u64,
    #[serde(default)]
    email: Option<String>,
}

/// Resolves an OAuth access token to the GitHub account that owns it.
pub struct GithubIdentity {
    client: reqwest::Client,
    api_url: String,
}

impl GithubIdentity {
    pub fn new(api_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build GitHub HTTP client")?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IdentityResolver for GithubIdentity {
    async fn resolve(&self, credential: &str) -> Result<Identity, IdentityError> {
        let resp = self
            .client
            .get(format!("{}/user", self.api_url))
            .bearer_auth(credential)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IdentityError::Rejected(format!("GitHub returned {status}")));
        }
        if !status.is_success() {
            return Err(IdentityError::Transport(format!("GitHub returned {status}")));
        }

        let user: GithubUser = resp
            .json()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        debug!(github_id = user.id, "resolved GitHub identity");

        Ok(Identity {
            id: format!("github:{}", user.id),
            email: user.email,
        })
    }
}
