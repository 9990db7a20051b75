pub mod pkt;
pub mod protocol;

use crate::errors::GitError;
use anyhow::{Context, Result};
use bytes::Bytes;
use url::Url;

const USER_AGENT: &str = concat!("mingit/", env!("CARGO_PKG_VERSION"));

/// Smart HTTP v0 transport: one GET for ref discovery, one POST for the
/// pack. Redirects, TLS and timeouts are reqwest's business; any non-success
/// status comes back as a transport error.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(repo_url: &str) -> Result<Self> {
        let url = Url::parse(repo_url).context("Invalid repository URL")?;
        if !url.has_host() {
            return Err(GitError::Transport(format!("URL {} has no host", repo_url)).into());
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// GET `<repo>/info/refs?service=git-upload-pack`.
    pub async fn discover_refs(&self) -> Result<Bytes> {
        let url = format!("{}/info/refs?service=git-upload-pack", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GitError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GitError::Transport(format!(
                "ref discovery returned {}",
                response.status()
            ))
            .into());
        }

        Ok(response
            .bytes()
            .await
            .map_err(|e| GitError::Transport(e.to_string()))?)
    }

    /// POST `<repo>/git-upload-pack` with a want/done request body.
    pub async fn fetch_pack(&self, request: Bytes) -> Result<Bytes> {
        let url = format!("{}/git-upload-pack", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-git-upload-pack-request")
            .body(request)
            .send()
            .await
            .map_err(|e| GitError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GitError::Transport(format!(
                "upload-pack returned {}",
                response.status()
            ))
            .into());
        }

        Ok(response
            .bytes()
            .await
            .map_err(|e| GitError::Transport(e.to_string()))?)
    }
}
