//! GitLab snippet backend.
//!
//! Visibility is the three-valued `{private, public, internal}` set. Lists are
//! paged 50 items at a time following the `X-Next-Page` header. An adapter
//! may be scoped to one project, in which case every snippet operation goes
//! through `/projects/:id/snippets` and the label becomes
//! `"<label> /<project path>"`.
//!
//! File handling branches on the file count: single-file snippets use the
//! flat `file_name`/`content` pair, multi-file snippets use the `files`
//! collection and each file is fetched on its own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::GitlabConfig;
use crate::contract::{
    BackendKind, PlatformAdapter, Project, ProjectScoped, Snippet, SnippetFile, SnippetHandle,
    SnippetListEntry, Visibility,
};
use crate::error::AdapterError;
use crate::util::{
    decode_json, expect_success, into_auth_error, join_url_path, read_bytes, replace_newline,
    request_error, FilterKey,
};

pub const GITLAB_PRIVATE: Visibility = Visibility::new("private", 0);
pub const GITLAB_PUBLIC: Visibility = Visibility::new("public", 1);
pub const GITLAB_INTERNAL: Visibility = Visibility::new("internal", 2);

const PAGE_SIZE: u32 = 50;
const NEXT_PAGE_HEADER: &str = "x-next-page";
const DEFAULT_REF: &str = "main";

#[derive(Debug, Deserialize)]
struct GitlabUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct GitlabSnippet {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    visibility: String,
    web_url: String,
    #[serde(default)]
    raw_url: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    files: Vec<GitlabSnippetFile>,
}

#[derive(Debug, Deserialize)]
struct GitlabSnippetFile {
    path: String,
    #[serde(default)]
    raw_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitlabProject {
    id: u64,
    path_with_namespace: String,
    #[serde(default)]
    snippets_enabled: Option<bool>,
    #[serde(default)]
    snippets_access_level: Option<String>,
}

impl GitlabProject {
    fn has_snippets(&self) -> bool {
        match self.snippets_enabled {
            Some(enabled) => enabled,
            None => self.snippets_access_level.as_deref() != Some("disabled"),
        }
    }
}

#[derive(Debug, Serialize)]
struct SnippetWrite {
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<Vec<SnippetFileWrite>>,
}

#[derive(Debug, Serialize)]
struct SnippetFileWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'static str>,
    file_path: String,
    content: String,
}

impl SnippetWrite {
    /// `action` is set for updates, where GitLab needs to know what to do
    /// with each file of a multi-file snippet.
    fn from_snippet(
        snippet: &Snippet,
        visibility: Option<Visibility>,
        action: Option<&'static str>,
    ) -> Self {
        let mut body = SnippetWrite {
            title: snippet.title.clone(),
            description: snippet.description.clone(),
            visibility: visibility.map(|v| v.code()),
            file_name: None,
            content: None,
            files: None,
        };
        if snippet.files.len() > 1 {
            body.files = Some(
                snippet
                    .files
                    .iter()
                    .map(|f| SnippetFileWrite {
                        action,
                        file_path: f.path.clone(),
                        content: f.contents_lossy(),
                    })
                    .collect(),
            );
        } else {
            let first = snippet.files.first();
            body.file_name = Some(first.map(|f| f.path.clone()).unwrap_or_default());
            body.content = Some(first.map(|f| f.contents_lossy()).unwrap_or_default());
        }
        body
    }
}

pub fn visibility_from_code(code: &str) -> Option<Visibility> {
    [GITLAB_PRIVATE, GITLAB_PUBLIC, GITLAB_INTERNAL]
        .into_iter()
        .find(|v| v.code() == code)
}

pub struct GitlabAdapter {
    http: reqwest::Client,
    api_url: String,
    token: String,
    host: String,
    user: String,
    base_label: String,
    project: Option<Project>,
    filter_key: FilterKey,
}

impl GitlabAdapter {
    pub fn new(config: &GitlabConfig, timeout: Duration) -> Result<Self, AdapterError> {
        let api_url = config.url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&api_url)
            .map_err(|e| AdapterError::Config(format!("invalid gitlab url {api_url}: {e}")))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(h), Some(port)) => format!("{h}:{port}"),
            (Some(h), None) => h.to_string(),
            (None, _) => {
                return Err(AdapterError::Config(format!(
                    "gitlab url {api_url} has no host"
                )))
            }
        };

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("snipt/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(config.skip_ssl);

        if let Some(proxy_url) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            Url::parse(proxy_url)
                .map_err(|e| AdapterError::Config(format!("invalid proxy url {proxy_url}: {e}")))?;
            let mut proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| AdapterError::Config(format!("invalid proxy url {proxy_url}: {e}")))?;
            if let Some(user) = config.proxy_user.as_deref().filter(|u| !u.is_empty()) {
                proxy = proxy.basic_auth(user, config.proxy_pass.as_deref().unwrap_or_default());
            }
            debug!(host = %host, proxy = proxy_url, "Using proxy for GitLab backend");
            builder = builder.proxy(proxy);
        }

        let http = builder.build().map_err(|e| {
            AdapterError::Config(format!("failed to build gitlab http client: {e}"))
        })?;

        Ok(Self {
            http,
            api_url,
            token: config.access_token.clone(),
            host,
            user: String::new(),
            base_label: String::new(),
            project: None,
            filter_key: FilterKey::default(),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    /// A copy sharing the HTTP client and identity, narrowed to `project`.
    fn with_project(&self, project: Option<Project>) -> Self {
        let adapter = Self {
            http: self.http.clone(),
            api_url: self.api_url.clone(),
            token: self.token.clone(),
            host: self.host.clone(),
            user: self.user.clone(),
            base_label: self.base_label.clone(),
            project,
            filter_key: FilterKey::default(),
        };
        adapter.filter_key.set(&adapter.platform_label());
        adapter
    }

    fn platform(&self) -> String {
        if self.base_label.is_empty() {
            self.host.clone()
        } else {
            self.platform_label()
        }
    }

    fn snippets_url(&self) -> String {
        match &self.project {
            Some(project) => format!("{}/projects/{}/snippets", self.api_url, project.id),
            None => format!("{}/snippets", self.api_url),
        }
    }

    fn parse_id(&self, id: &str) -> Result<u64, AdapterError> {
        id.parse().map_err(|_| AdapterError::InvalidId {
            platform: self.platform(),
            id: id.to_string(),
        })
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("PRIVATE-TOKEN", &self.token)
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        method: &str,
    ) -> Result<reqwest::Response, AdapterError> {
        let platform = self.platform();
        let response = builder
            .send()
            .await
            .map_err(|e| request_error(&platform, e))?;
        expect_success(&platform, method, response).await
    }

    /// Fetches every page of a list endpoint until the backend reports no next page.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, AdapterError> {
        let mut items = Vec::new();
        let mut page: u32 = 1;
        loop {
            let builder = self
                .request(reqwest::Method::GET, url)
                .query(query)
                .query(&[("page", page), ("per_page", PAGE_SIZE)]);
            let response = self.send(builder, "GET").await?;
            let next_page = response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(0);
            let batch: Vec<T> = decode_json(&self.platform(), response).await?;
            debug!(platform = %self.platform(), url, page, fetched = batch.len(), next_page, "Fetched page");
            items.extend(batch);

            if next_page == 0 {
                break;
            }
            page = next_page;
        }
        Ok(items)
    }

    fn file_raw_url(&self, id: u64, path: &str) -> Result<Url, AdapterError> {
        let base = format!("{}/{}/files/{}", self.snippets_url(), id, DEFAULT_REF);
        let mut url = Url::parse(&base).map_err(|e| AdapterError::Decode {
            platform: self.platform(),
            message: format!("cannot build file url from {base}: {e}"),
        })?;
        url.path_segments_mut()
            .map_err(|_| AdapterError::Decode {
                platform: self.platform(),
                message: format!("cannot build file url from {base}"),
            })?
            .push(path)
            .push("raw");
        Ok(url)
    }

    async fn fetch_raw(&self, url: &str) -> Result<Vec<u8>, AdapterError> {
        let response = self
            .send(self.request(reqwest::Method::GET, url), "GET")
            .await?;
        read_bytes(&self.platform(), response).await
    }

    fn handle(snippet: GitlabSnippet) -> SnippetHandle {
        SnippetHandle {
            kind: BackendKind::Gitlab,
            id: snippet.id.to_string(),
            url: snippet.web_url,
        }
    }

    fn list_entries(&self, snippet: GitlabSnippet, expand_files: bool) -> Vec<SnippetListEntry> {
        let label = self.platform_label();
        let entry = SnippetListEntry {
            platform: label,
            id: snippet.id.to_string(),
            title: replace_newline(&snippet.title, "\\n"),
            raw_url: None,
            url: snippet.web_url.clone(),
            visibility: snippet.visibility.clone(),
        };
        if !expand_files {
            return vec![entry];
        }
        if snippet.files.len() > 1 {
            snippet
                .files
                .iter()
                .map(|f| SnippetListEntry {
                    url: join_url_path(&snippet.web_url, &f.path),
                    raw_url: f.raw_url.clone(),
                    ..entry.clone()
                })
                .collect()
        } else {
            let file_name = snippet
                .file_name
                .clone()
                .or_else(|| snippet.files.first().map(|f| f.path.clone()))
                .unwrap_or_default();
            vec![SnippetListEntry {
                url: join_url_path(&snippet.web_url, &file_name),
                raw_url: snippet.raw_url.clone(),
                ..entry
            }]
        }
    }
}

#[async_trait]
impl PlatformAdapter for GitlabAdapter {
    async fn init(&mut self) -> Result<(), AdapterError> {
        let url = format!("{}/user", self.api_url);
        let response = self
            .send(self.request(reqwest::Method::GET, &url), "GET")
            .await
            .map_err(into_auth_error)?;
        let user: GitlabUser = decode_json(&self.platform(), response).await?;
        self.user = user.username;
        self.base_label = format!("{}:{}", self.host, self.user);
        self.filter_key.set(&self.platform_label());
        info!(platform = %self.base_label, "GitLab backend authenticated");
        Ok(())
    }

    async fn list(
        &self,
        expand_files: bool,
        include_private: bool,
    ) -> Result<Vec<SnippetListEntry>, AdapterError> {
        let snippets: Vec<GitlabSnippet> = self.get_paginated(&self.snippets_url(), &[]).await?;
        let mut entries = Vec::new();
        for snippet in snippets {
            if !include_private && snippet.visibility != GITLAB_PUBLIC.code() {
                continue;
            }
            entries.extend(self.list_entries(snippet, expand_files));
        }
        entries.sort_by(|a, b| a.url.cmp(&b.url));
        info!(platform = %self.platform_label(), count = entries.len(), "Listed GitLab snippets");
        Ok(entries)
    }

    async fn get(&self, id: &str) -> Result<Snippet, AdapterError> {
        let numeric_id = self.parse_id(id)?;
        let url = format!("{}/{}", self.snippets_url(), numeric_id);
        let response = self
            .send(self.request(reqwest::Method::GET, &url), "GET")
            .await?;
        let snippet: GitlabSnippet = decode_json(&self.platform(), response).await?;

        let mut files = Vec::new();
        if snippet.files.len() > 1 {
            for file in &snippet.files {
                let raw = self.file_raw_url(numeric_id, &file.path)?;
                let contents = self.fetch_raw(raw.as_str()).await?;
                files.push(SnippetFile {
                    path: file.path.clone(),
                    raw_url: file.raw_url.clone(),
                    contents,
                    filter: join_url_path(&snippet.web_url, &file.path),
                });
            }
        } else {
            let path = snippet
                .file_name
                .clone()
                .or_else(|| snippet.files.first().map(|f| f.path.clone()))
                .unwrap_or_default();
            let contents = self.fetch_raw(&format!("{url}/raw")).await?;
            files.push(SnippetFile {
                filter: join_url_path(&snippet.web_url, &path),
                raw_url: snippet.raw_url.clone(),
                path,
                contents,
            });
        }

        let visibility = visibility_from_code(&snippet.visibility);
        if visibility.is_none() {
            warn!(platform = %self.platform(), id, visibility = %snippet.visibility, "Unknown GitLab visibility");
        }

        Ok(Snippet {
            title: snippet.title,
            description: snippet.description.unwrap_or_default(),
            url: snippet.web_url,
            visibility,
            files,
        })
    }

    async fn create(&self, snippet: &Snippet) -> Result<SnippetHandle, AdapterError> {
        let visibility = snippet.visibility.unwrap_or(GITLAB_PRIVATE);
        let body = SnippetWrite::from_snippet(snippet, Some(visibility), None);
        let response = self
            .send(
                self.request(reqwest::Method::POST, &self.snippets_url()).json(&body),
                "POST",
            )
            .await?;
        let created: GitlabSnippet = decode_json(&self.platform(), response).await?;
        info!(platform = %self.platform(), url = %created.web_url, "Created GitLab snippet");
        Ok(Self::handle(created))
    }

    async fn update(&self, id: &str, snippet: &Snippet) -> Result<SnippetHandle, AdapterError> {
        let numeric_id = self.parse_id(id)?;
        let url = format!("{}/{}", self.snippets_url(), numeric_id);
        let body = SnippetWrite::from_snippet(snippet, snippet.visibility, Some("update"));
        let response = self
            .send(self.request(reqwest::Method::PUT, &url).json(&body), "PUT")
            .await?;
        let updated: GitlabSnippet = decode_json(&self.platform(), response).await?;
        info!(platform = %self.platform(), url = %updated.web_url, "Updated GitLab snippet");
        Ok(Self::handle(updated))
    }

    async fn delete(&self, id: &str) -> Result<(), AdapterError> {
        let numeric_id = self.parse_id(id)?;
        let url = format!("{}/{}", self.snippets_url(), numeric_id);
        self.send(self.request(reqwest::Method::DELETE, &url), "DELETE")
            .await?;
        info!(platform = %self.platform(), id, "Deleted GitLab snippet");
        Ok(())
    }

    fn visibility_options(&self) -> Vec<Visibility> {
        vec![GITLAB_PRIVATE, GITLAB_PUBLIC, GITLAB_INTERNAL]
    }

    fn platform_label(&self) -> String {
        match &self.project {
            Some(project) => format!("{} /{}", self.base_label, project.path_with_namespace),
            None => self.base_label.clone(),
        }
    }

    fn filter_key(&self) -> String {
        self.filter_key.get()
    }

    fn set_filter_key(&self, key: &str) {
        self.filter_key.set(key);
    }

    fn project_capability(&self) -> Option<Arc<dyn ProjectScoped>> {
        if self.project.is_some() {
            return None;
        }
        Some(Arc::new(self.with_project(None)))
    }
}

#[async_trait]
impl ProjectScoped for GitlabAdapter {
    async fn project_list(&self) -> Result<Vec<Project>, AdapterError> {
        let url = format!("{}/projects", self.api_url);
        let projects: Vec<GitlabProject> = self
            .get_paginated(&url, &[("membership", "true"), ("archived", "false")])
            .await?;
        let total = projects.len();
        let eligible: Vec<Project> = projects
            .into_iter()
            .filter(GitlabProject::has_snippets)
            .map(|p| Project {
                id: p.id,
                path_with_namespace: p.path_with_namespace,
            })
            .collect();
        info!(platform = %self.platform(), total, eligible = eligible.len(), "Listed GitLab projects");
        Ok(eligible)
    }

    fn scoped_to(&self, project: &Project) -> Arc<dyn PlatformAdapter> {
        Arc::new(self.with_project(Some(project.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> GitlabAdapter {
        let mut adapter = GitlabAdapter::new(
            &GitlabConfig {
                url: "https://gitlab.example.com/api/v4/".into(),
                access_token: "t".into(),
                ..Default::default()
            },
            Duration::from_secs(5),
        )
        .unwrap();
        adapter.base_label = "gitlab.example.com:me".into();
        adapter
    }

    #[test]
    fn scoping_rewrites_label_and_endpoints() {
        let base = adapter();
        let scoped = base.with_project(Some(Project {
            id: 42,
            path_with_namespace: "group/tools".into(),
        }));
        assert_eq!(scoped.platform_label(), "gitlab.example.com:me /group/tools");
        assert_eq!(scoped.filter_key(), "gitlab.example.com:me /group/tools");
        assert_eq!(
            scoped.snippets_url(),
            "https://gitlab.example.com/api/v4/projects/42/snippets"
        );
        assert_eq!(base.snippets_url(), "https://gitlab.example.com/api/v4/snippets");
        assert!(scoped.project_capability().is_none());
        assert!(base.project_capability().is_some());
    }

    #[test]
    fn write_body_branches_on_file_count() {
        let single = Snippet {
            title: "t".into(),
            files: vec![SnippetFile::new("a.sh", "echo")],
            ..Default::default()
        };
        let body = SnippetWrite::from_snippet(&single, Some(GITLAB_PRIVATE), None);
        assert_eq!(body.file_name.as_deref(), Some("a.sh"));
        assert_eq!(body.content.as_deref(), Some("echo"));
        assert!(body.files.is_none());

        let multi = Snippet {
            files: vec![SnippetFile::new("a.sh", "a"), SnippetFile::new("b.sh", "b")],
            ..single
        };
        let body = SnippetWrite::from_snippet(&multi, None, Some("update"));
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("visibility").is_none());
        assert!(json.get("file_name").is_none());
        assert_eq!(json["files"][1]["file_path"], "b.sh");
        assert_eq!(json["files"][0]["action"], "update");
    }

    #[test]
    fn unparsable_proxy_is_a_config_error() {
        let err = GitlabAdapter::new(
            &GitlabConfig {
                access_token: "t".into(),
                proxy: Some("::not a url::".into()),
                ..Default::default()
            },
            Duration::from_secs(5),
        )
        .err()
        .unwrap();
        assert!(matches!(err, AdapterError::Config(_)));
    }

    #[test]
    fn project_eligibility() {
        let project = |enabled, level: Option<&str>| GitlabProject {
            id: 1,
            path_with_namespace: "a/b".into(),
            snippets_enabled: enabled,
            snippets_access_level: level.map(str::to_string),
        };
        assert!(project(Some(true), None).has_snippets());
        assert!(!project(Some(false), Some("enabled")).has_snippets());
        assert!(project(None, Some("private")).has_snippets());
        assert!(!project(None, Some("disabled")).has_snippets());
    }

    #[test]
    fn file_urls_encode_the_path_as_one_segment() {
        let url = adapter().file_raw_url(7, "dir/a.rs").unwrap();
        assert_eq!(
            url.as_str(),
            "https://gitlab.example.com/api/v4/snippets/7/files/main/dir%2Fa.rs/raw"
        );
    }

    #[test]
    fn visibility_codes_round_trip() {
        assert_eq!(visibility_from_code("internal"), Some(GITLAB_INTERNAL));
        assert_eq!(visibility_from_code("nope"), None);
    }
}
