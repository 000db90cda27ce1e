/// `load_config` module: Loads the static YAML config file and injects
/// secrets from the environment into the resolved [`Config`].
///
/// This is the only place where user-supplied YAML is parsed. The core crate
/// receives a plain [`ClientConfig`] and never sees file paths or env lookups.
///
/// # Responsibilities
/// - Locate the config file (`--config`, else `<config dir>/snipt/config.yaml`)
///   and expand a leading `~`.
/// - Parse YAML into intermediate, loosely-typed sections.
/// - Resolve `access_token_env` references; a missing variable is an error
///   naming that variable.
/// - Apply defaults (editor, selector, timeout, GitLab API URL).
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use snipt_core::config::{ClientConfig, GistConfig, GitlabConfig, DEFAULT_GITLAB_URL};
use tracing::{error, info, warn};

use crate::config::{Config, GeneralConfig};

#[derive(Debug, Default, Deserialize)]
struct StaticConfig {
    #[serde(default)]
    general: GeneralSection,
    #[serde(default)]
    gist: Vec<GistSection>,
    #[serde(default)]
    gitlab: Vec<GitlabSection>,
}

#[derive(Debug, Default, Deserialize)]
struct GeneralSection {
    editor: Option<String>,
    select_cmd: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GistSection {
    access_token: Option<String>,
    access_token_env: Option<String>,
    api_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitlabSection {
    url: Option<String>,
    access_token: Option<String>,
    access_token_env: Option<String>,
    #[serde(default)]
    skip_ssl: bool,
    proxy: Option<String>,
    proxy_user: Option<String>,
    proxy_pass: Option<String>,
}

/// `<config dir>/snipt/config.yaml`.
pub fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| anyhow!("Cannot determine the user config directory; pass --config"))?;
    Ok(base.join("snipt").join("config.yaml"))
}

/// Expands a leading `~` to the home directory; other paths are returned as is.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => {
            warn!(path = %path.display(), "No home directory, leaving ~ unexpanded");
            path.to_path_buf()
        }
    }
}

/// Loads a static YAML config file and injects env-referenced secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = expand_tilde(path.as_ref());
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(&path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!(
                "Failed to read config file {}: {}",
                path_ref.display(),
                e
            ));
        }
    };

    let static_conf: StaticConfig = if config_content.trim().is_empty() {
        StaticConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    let defaults = GeneralConfig::default();
    let general = GeneralConfig {
        editor: static_conf
            .general
            .editor
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(defaults.editor),
        select_cmd: static_conf
            .general
            .select_cmd
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(defaults.select_cmd),
        timeout: static_conf
            .general
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout),
    };

    let mut gist = Vec::with_capacity(static_conf.gist.len());
    for (index, section) in static_conf.gist.into_iter().enumerate() {
        let access_token = resolve_token(
            "gist",
            index,
            section.access_token,
            section.access_token_env.as_deref(),
        )?;
        gist.push(GistConfig {
            access_token,
            api_url: section.api_url.filter(|u| !u.trim().is_empty()),
        });
    }

    let mut gitlab = Vec::with_capacity(static_conf.gitlab.len());
    for (index, section) in static_conf.gitlab.into_iter().enumerate() {
        let access_token = resolve_token(
            "gitlab",
            index,
            section.access_token,
            section.access_token_env.as_deref(),
        )?;
        gitlab.push(GitlabConfig {
            url: section
                .url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GITLAB_URL.to_string()),
            access_token,
            skip_ssl: section.skip_ssl,
            proxy: section.proxy.filter(|p| !p.trim().is_empty()),
            proxy_user: section.proxy_user,
            proxy_pass: section.proxy_pass,
        });
    }

    if gist.is_empty() && gitlab.is_empty() {
        warn!(config_path = ?path_ref, "No gist or gitlab backends configured");
    }

    let config = Config {
        client: ClientConfig {
            timeout: general.timeout,
            gist,
            gitlab,
        },
        general,
    };
    info!(
        gist_count = config.client.gist.len(),
        gitlab_count = config.client.gitlab.len(),
        "Config loaded and merged successfully"
    );
    Ok(config)
}

/// An inline token wins over an env reference.
fn resolve_token(
    section: &str,
    index: usize,
    inline: Option<String>,
    env_name: Option<&str>,
) -> Result<String> {
    if let Some(token) = inline.filter(|t| !t.is_empty()) {
        return Ok(token);
    }
    let Some(env_name) = env_name.filter(|n| !n.is_empty()) else {
        error!(section, index, "Backend has no access token configured");
        bail!("{section}[{index}]: set access_token or access_token_env");
    };
    match std::env::var(env_name) {
        Ok(token) if !token.is_empty() => {
            info!(section, index, env = env_name, "Access token found in env");
            Ok(token)
        }
        Ok(_) => {
            error!(section, index, env = env_name, "Access token environment variable is empty");
            bail!("{section}[{index}]: environment variable {env_name} is empty")
        }
        Err(e) => {
            error!(error = ?e, section, index, env = env_name, "Access token environment variable not set");
            Err(anyhow::Error::new(e).context(format!(
                "{section}[{index}]: environment variable {env_name} not set"
            )))
        }
    }
}
