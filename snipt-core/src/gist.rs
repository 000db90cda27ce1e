//! Gist backend.
//!
//! Visibility is the two-valued `{public, secret}` set derived from the
//! gist's `public` flag. Listing pages through `/gists` 100 items at a time;
//! `get` hydrates every file eagerly, following the raw URL when the API
//! truncated a file's content.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::config::GistConfig;
use crate::contract::{
    BackendKind, PlatformAdapter, ProjectScoped, Snippet, SnippetFile, SnippetHandle,
    SnippetListEntry, Visibility,
};
use crate::error::AdapterError;
use crate::util::{
    decode_json, expect_success, into_auth_error, join_url_path, read_bytes, replace_newline,
    request_error, FilterKey,
};

pub const GIST_SECRET: Visibility = Visibility::new("secret", 0);
pub const GIST_PUBLIC: Visibility = Visibility::new("public", 1);

const DEFAULT_API_URL: &str = "https://api.github.com";
const GIST_HOST: &str = "gist.github.com";
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GistItem {
    id: String,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    public: bool,
    #[serde(default)]
    files: BTreeMap<String, GistFileItem>,
}

#[derive(Debug, Deserialize)]
struct GistFileItem {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    raw_url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Serialize)]
struct GistWrite<'a> {
    description: &'a str,
    public: bool,
    files: BTreeMap<&'a str, GistFileWrite>,
}

#[derive(Debug, Serialize)]
struct GistFileWrite {
    content: String,
}

pub struct GistAdapter {
    http: reqwest::Client,
    api_url: String,
    token: String,
    host: String,
    user: String,
    platform_label: String,
    filter_key: FilterKey,
}

impl GistAdapter {
    pub fn new(config: &GistConfig, timeout: Duration) -> Result<Self, AdapterError> {
        let api_url = config
            .api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();
        let parsed = Url::parse(&api_url)
            .map_err(|e| AdapterError::Config(format!("invalid gist api url {api_url}: {e}")))?;
        let host = if api_url == DEFAULT_API_URL {
            GIST_HOST.to_string()
        } else {
            match (parsed.host_str(), parsed.port()) {
                (Some(h), Some(port)) => format!("{h}:{port}"),
                (Some(h), None) => h.to_string(),
                (None, _) => {
                    return Err(AdapterError::Config(format!(
                        "gist api url {api_url} has no host"
                    )))
                }
            }
        };
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("snipt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AdapterError::Config(format!("failed to build gist http client: {e}")))?;

        Ok(Self {
            http,
            api_url,
            token: config.access_token.clone(),
            host,
            user: String::new(),
            platform_label: String::new(),
            filter_key: FilterKey::default(),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Label used in errors; falls back to the host before `init` ran.
    fn platform(&self) -> &str {
        if self.platform_label.is_empty() {
            &self.host
        } else {
            &self.platform_label
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        method: &str,
    ) -> Result<reqwest::Response, AdapterError> {
        let response = builder
            .send()
            .await
            .map_err(|e| request_error(self.platform(), e))?;
        expect_success(self.platform(), method, response).await
    }

    fn gist_url(&self, id: &str) -> Result<String, AdapterError> {
        if id.is_empty() || id.contains('/') {
            return Err(AdapterError::InvalidId {
                platform: self.platform().to_string(),
                id: id.to_string(),
            });
        }
        Ok(format!("{}/gists/{}", self.api_url, id))
    }

    fn visibility_of(public: bool) -> Visibility {
        if public {
            GIST_PUBLIC
        } else {
            GIST_SECRET
        }
    }

    fn write_body<'a>(snippet: &'a Snippet) -> GistWrite<'a> {
        let visibility = snippet.visibility.unwrap_or(GIST_SECRET);
        GistWrite {
            description: &snippet.title,
            public: visibility.same_code(&GIST_PUBLIC),
            files: snippet
                .files
                .iter()
                .map(|f| {
                    (
                        f.path.as_str(),
                        GistFileWrite {
                            content: f.contents_lossy(),
                        },
                    )
                })
                .collect(),
        }
    }

    fn handle(gist: GistItem) -> SnippetHandle {
        SnippetHandle {
            kind: BackendKind::Gist,
            id: gist.id,
            url: gist.html_url,
        }
    }

    async fn file_contents(
        &self,
        name: &str,
        file: &GistFileItem,
    ) -> Result<Vec<u8>, AdapterError> {
        match (&file.content, &file.raw_url) {
            (Some(content), _) if !file.truncated => Ok(content.clone().into_bytes()),
            (_, Some(raw_url)) => {
                debug!(platform = %self.platform_label, file = name, "Fetching gist file from raw url");
                let response = self.send(self.request(reqwest::Method::GET, raw_url), "GET").await?;
                read_bytes(self.platform(), response).await
            }
            (Some(content), None) => Ok(content.clone().into_bytes()),
            (None, None) => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl PlatformAdapter for GistAdapter {
    async fn init(&mut self) -> Result<(), AdapterError> {
        let url = format!("{}/user", self.api_url);
        let response = self
            .send(self.request(reqwest::Method::GET, &url), "GET")
            .await
            .map_err(into_auth_error)?;
        let user: GithubUser = decode_json(self.platform(), response).await?;
        self.user = user.login;
        self.platform_label = format!("{}:{}", self.host, self.user);
        self.filter_key.set(&self.platform_label);
        info!(platform = %self.platform_label, "Gist backend authenticated");
        Ok(())
    }

    async fn list(
        &self,
        expand_files: bool,
        include_private: bool,
    ) -> Result<Vec<SnippetListEntry>, AdapterError> {
        let url = format!("{}/gists", self.api_url);
        let mut entries = Vec::new();
        let mut page: usize = 1;

        loop {
            let builder = self.request(reqwest::Method::GET, &url).query(&[
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ]);
            let response = self.send(builder, "GET").await?;
            let gists: Vec<GistItem> = decode_json(self.platform(), response).await?;
            let fetched = gists.len();
            debug!(platform = %self.platform_label, page, fetched, "Fetched gist page");

            for gist in gists {
                if !include_private && !gist.public {
                    continue;
                }
                let entry = SnippetListEntry {
                    platform: self.platform_label.clone(),
                    id: gist.id.clone(),
                    title: replace_newline(gist.description.as_deref().unwrap_or_default(), "\\n"),
                    raw_url: None,
                    url: gist.html_url.clone(),
                    visibility: Self::visibility_of(gist.public).code().to_string(),
                };
                if expand_files {
                    for (name, file) in &gist.files {
                        let filename = file.filename.as_deref().unwrap_or(name);
                        entries.push(SnippetListEntry {
                            url: join_url_path(&gist.html_url, filename),
                            raw_url: file.raw_url.clone(),
                            ..entry.clone()
                        });
                    }
                } else {
                    entries.push(entry);
                }
            }

            if fetched < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        entries.sort_by(|a, b| a.url.cmp(&b.url));
        info!(platform = %self.platform_label, count = entries.len(), "Listed gists");
        Ok(entries)
    }

    async fn get(&self, id: &str) -> Result<Snippet, AdapterError> {
        let url = self.gist_url(id)?;
        let response = self.send(self.request(reqwest::Method::GET, &url), "GET").await?;
        let gist: GistItem = decode_json(self.platform(), response).await?;

        let mut files = Vec::with_capacity(gist.files.len());
        for (name, file) in &gist.files {
            let path = file.filename.clone().unwrap_or_else(|| name.clone());
            let contents = self.file_contents(&path, file).await?;
            files.push(SnippetFile {
                filter: join_url_path(&gist.html_url, &path),
                raw_url: file.raw_url.clone(),
                path,
                contents,
            });
        }

        Ok(Snippet {
            title: gist.description.clone().unwrap_or_default(),
            description: String::new(),
            url: gist.html_url.clone(),
            visibility: Some(Self::visibility_of(gist.public)),
            files,
        })
    }

    async fn create(&self, snippet: &Snippet) -> Result<SnippetHandle, AdapterError> {
        let url = format!("{}/gists", self.api_url);
        let body = Self::write_body(snippet);
        let response = self
            .send(self.request(reqwest::Method::POST, &url).json(&body), "POST")
            .await?;
        let gist: GistItem = decode_json(self.platform(), response).await?;
        info!(platform = %self.platform_label, url = %gist.html_url, "Created gist");
        Ok(Self::handle(gist))
    }

    async fn update(&self, id: &str, snippet: &Snippet) -> Result<SnippetHandle, AdapterError> {
        let url = self.gist_url(id)?;
        let body = Self::write_body(snippet);
        let response = self
            .send(self.request(reqwest::Method::PATCH, &url).json(&body), "PATCH")
            .await?;
        let gist: GistItem = decode_json(self.platform(), response).await?;
        info!(platform = %self.platform_label, url = %gist.html_url, "Updated gist");
        Ok(Self::handle(gist))
    }

    async fn delete(&self, id: &str) -> Result<(), AdapterError> {
        let url = self.gist_url(id)?;
        self.send(self.request(reqwest::Method::DELETE, &url), "DELETE")
            .await?;
        info!(platform = %self.platform_label, id, "Deleted gist");
        Ok(())
    }

    fn visibility_options(&self) -> Vec<Visibility> {
        vec![GIST_PUBLIC, GIST_SECRET]
    }

    fn platform_label(&self) -> String {
        self.platform_label.clone()
    }

    fn filter_key(&self) -> String {
        self.filter_key.get()
    }

    fn set_filter_key(&self, key: &str) {
        self.filter_key.set(key);
    }

    fn project_capability(&self) -> Option<Arc<dyn ProjectScoped>> {
        None
    }
}
