use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com/api/v4";

/// Already-resolved connection settings for every configured backend, in
/// configuration order.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Applied to every HTTP call an adapter makes.
    pub timeout: Duration,
    pub gist: Vec<GistConfig>,
    pub gitlab: Vec<GitlabConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            gist: Vec::new(),
            gitlab: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn trace_loaded(&self) {
        info!(
            timeout_secs = self.timeout.as_secs(),
            gist_count = self.gist.len(),
            gitlab_count = self.gitlab.len(),
            "Loaded ClientConfig"
        );
        for gist in &self.gist {
            gist.trace_loaded();
        }
        for gitlab in &self.gitlab {
            gitlab.trace_loaded();
        }
    }
}

#[derive(Clone)]
pub struct GistConfig {
    pub access_token: String,
    /// GitHub API root, `https://api.github.com` when unset.
    pub api_url: Option<String>,
}

impl GistConfig {
    pub fn trace_loaded(&self) {
        info!(
            api_url = self.api_url.as_deref().unwrap_or("default"),
            token_set = !self.access_token.is_empty(),
            "Loaded Gist backend"
        );
        debug!(config = ?self, "Gist backend (redacted)");
    }
}

impl fmt::Debug for GistConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GistConfig")
            .field("access_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct GitlabConfig {
    pub url: String,
    pub access_token: String,
    /// Accept invalid TLS certificates.
    pub skip_ssl: bool,
    pub proxy: Option<String>,
    pub proxy_user: Option<String>,
    pub proxy_pass: Option<String>,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GITLAB_URL.to_string(),
            access_token: String::new(),
            skip_ssl: false,
            proxy: None,
            proxy_user: None,
            proxy_pass: None,
        }
    }
}

impl GitlabConfig {
    pub fn trace_loaded(&self) {
        info!(
            url = %self.url,
            proxy = self.proxy.as_deref().unwrap_or("none"),
            skip_ssl = self.skip_ssl,
            token_set = !self.access_token.is_empty(),
            "Loaded GitLab backend"
        );
        debug!(config = ?self, "GitLab backend (redacted)");
    }
}

impl fmt::Debug for GitlabConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitlabConfig")
            .field("url", &self.url)
            .field("access_token", &"<redacted>")
            .field("skip_ssl", &self.skip_ssl)
            .field("proxy", &self.proxy)
            .field("proxy_user", &self.proxy_user)
            .field("proxy_pass", &self.proxy_pass.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
