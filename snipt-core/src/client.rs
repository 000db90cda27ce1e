//! Multiplexing client: owns every configured adapter, fans requests out and
//! routes follow-up operations back to the adapter that owns a snippet.
//!
//! # Routing tables
//! - The *snippet table* is rebuilt by [`Client::list`] and keyed by URL. It
//!   serves `get`, `update`, `delete` and `visibility_list_from_url`.
//! - The *platform table* is rebuilt by [`Client::platform_list`] and keyed by
//!   filter key. It serves `create` and `visibility_list_from_platform`.
//!
//! Each rebuild replaces its table wholesale. A lookup that matches nothing
//! is an empty result, never an error.
//!
//! # Failure policy
//! - `list` logs a failing adapter and returns everything else.
//! - `platform_list` runs one task per adapter, waits for all of them and
//!   returns every failure together (see [`ClientError::Discovery`]).
//! - Point operations fail fast; effects already applied remotely stand.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::contract::{PlatformAdapter, PlatformEntry, Snippet, SnippetListEntry, Visibility};
use crate::error::{AdapterError, ClientError};
use crate::gist::GistAdapter;
use crate::gitlab::GitlabAdapter;

#[derive(Clone)]
struct RoutedSnippet {
    adapter: Arc<dyn PlatformAdapter>,
    entry: SnippetListEntry,
}

pub struct Client {
    adapters: Vec<Arc<dyn PlatformAdapter>>,
    snippets: Vec<RoutedSnippet>,
    platforms: Vec<PlatformEntry>,
}

impl Client {
    /// Builds and authenticates one adapter per configured backend.
    ///
    /// Backends that fail to authenticate are logged and left out; malformed
    /// connection settings abort construction.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut pending: Vec<Box<dyn PlatformAdapter>> = Vec::new();
        for gist in &config.gist {
            pending.push(Box::new(GistAdapter::new(gist, config.timeout)?));
        }
        for gitlab in &config.gitlab {
            pending.push(Box::new(GitlabAdapter::new(gitlab, config.timeout)?));
        }

        let mut adapters: Vec<Arc<dyn PlatformAdapter>> = Vec::with_capacity(pending.len());
        for mut adapter in pending {
            match adapter.init().await {
                Ok(()) => adapters.push(Arc::from(adapter)),
                Err(e @ AdapterError::Config(_)) => return Err(e.into()),
                Err(e) => {
                    error!(
                        platform = e.platform().unwrap_or("unknown"),
                        error = %e,
                        "Backend initialisation failed, excluding it"
                    );
                }
            }
        }
        info!(count = adapters.len(), "Client connected");
        Ok(Self::from_adapters(adapters))
    }

    /// Wraps already-initialised adapters, in routing order.
    pub fn from_adapters(adapters: Vec<Arc<dyn PlatformAdapter>>) -> Self {
        Self {
            adapters,
            snippets: Vec::new(),
            platforms: Vec::new(),
        }
    }

    pub fn adapters(&self) -> &[Arc<dyn PlatformAdapter>] {
        &self.adapters
    }

    /// The platform table built by the last [`Client::platform_list`].
    pub fn platforms(&self) -> &[PlatformEntry] {
        &self.platforms
    }

    /// Lists every adapter in order and rebuilds the snippet table.
    ///
    /// Output is grouped by adapter, URL-ascending within each group.
    pub async fn list(&mut self, expand_files: bool, include_private: bool) -> Vec<SnippetListEntry> {
        self.snippets.clear();
        let mut routed = Vec::new();

        for adapter in &self.adapters {
            match adapter.list(expand_files, include_private).await {
                Ok(mut entries) => {
                    entries.sort_by(|a, b| a.url.cmp(&b.url));
                    debug!(platform = %adapter.platform_label(), count = entries.len(), "Adapter listed snippets");
                    routed.extend(entries.into_iter().map(|entry| RoutedSnippet {
                        adapter: Arc::clone(adapter),
                        entry,
                    }));
                }
                Err(e) => {
                    error!(
                        platform = %adapter.platform_label(),
                        error = %e,
                        "Listing snippets failed, skipping platform"
                    );
                }
            }
        }

        self.snippets = routed;
        info!(count = self.snippets.len(), "Snippet index rebuilt");
        self.snippets.iter().map(|r| r.entry.clone()).collect()
    }

    fn routes_for_url<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a RoutedSnippet> + 'a {
        self.snippets.iter().filter(move |r| r.entry.url == url)
    }

    fn routes_for_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a PlatformEntry> + 'a {
        self.platforms.iter().filter(move |p| p.filter_key == label)
    }

    /// Fetches the snippet listed under `url`; `None` when the URL is not in
    /// the snippet table.
    pub async fn get(&self, url: &str) -> Result<Option<Snippet>, ClientError> {
        let Some(route) = self.routes_for_url(url).next() else {
            debug!(url, "No snippet routed for url");
            return Ok(None);
        };
        let snippet = route.adapter.get(&route.entry.id).await?;
        Ok(Some(snippet))
    }

    /// Creates `snippet` on every platform whose filter key equals `label`.
    ///
    /// Stops at the first failure; snippets created before it are not rolled
    /// back.
    pub async fn create(&self, label: &str, snippet: &Snippet) -> Result<Vec<String>, ClientError> {
        let mut urls = Vec::new();
        for platform in self.routes_for_label(label) {
            match platform.adapter.create(snippet).await {
                Ok(handle) => urls.push(handle.url),
                Err(e) => {
                    if !urls.is_empty() {
                        warn!(label, created = ?urls, "Create failed after some snippets were created");
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(urls)
    }

    /// Updates the snippet listed under `url`. An unknown URL updates nothing.
    pub async fn update(&self, url: &str, snippet: &Snippet) -> Result<Vec<String>, ClientError> {
        let mut urls = Vec::new();
        for route in self.routes_for_url(url) {
            match route.adapter.update(&route.entry.id, snippet).await {
                Ok(handle) => urls.push(handle.url),
                Err(e) => {
                    if !urls.is_empty() {
                        warn!(url, updated = ?urls, "Update failed after some snippets were updated");
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(urls)
    }

    pub async fn delete(&self, url: &str) -> Result<(), ClientError> {
        for route in self.routes_for_url(url) {
            route.adapter.delete(&route.entry.id).await?;
        }
        Ok(())
    }

    /// Rebuilds the platform table and returns its labels in discovery order.
    ///
    /// One task per adapter computes the adapter's label and, with
    /// `expand_projects`, the project-scoped labels after it. All tasks are
    /// awaited before returning. If any fail, every failure is returned and
    /// the platform table stays empty.
    pub async fn platform_list(&mut self, expand_projects: bool) -> Result<Vec<String>, ClientError> {
        self.platforms.clear();

        let tasks: Vec<_> = self
            .adapters
            .iter()
            .map(|adapter| tokio::spawn(discover(Arc::clone(adapter), expand_projects)))
            .collect();

        let mut found = Vec::new();
        let mut failures = Vec::new();
        let mut task_failure = None;
        for outcome in join_all(tasks).await {
            match outcome {
                Ok(Ok(entries)) => found.extend(entries),
                Ok(Err(e)) => {
                    error!(platform = e.platform().unwrap_or("unknown"), error = %e, "Platform discovery failed");
                    failures.push(e);
                }
                Err(join_error) => {
                    error!(error = %join_error, "Platform discovery task failed");
                    task_failure = Some(join_error.to_string());
                }
            }
        }

        if !failures.is_empty() {
            return Err(ClientError::Discovery(failures));
        }
        if let Some(message) = task_failure {
            return Err(ClientError::Task(message));
        }

        let mut seen = HashSet::new();
        let mut platforms = Vec::with_capacity(found.len());
        for entry in found {
            if seen.insert(entry.filter_key.clone()) {
                platforms.push(entry);
            } else {
                warn!(label = %entry.label, "Duplicate platform label, keeping the first");
            }
        }

        self.platforms = platforms;
        info!(count = self.platforms.len(), "Platform index rebuilt");
        Ok(self.platforms.iter().map(|p| p.label.clone()).collect())
    }

    pub fn visibility_list_from_platform(&self, label: &str) -> Vec<Visibility> {
        self.routes_for_label(label)
            .next()
            .map(|p| p.adapter.visibility_options())
            .unwrap_or_default()
    }

    pub fn visibility_list_from_url(&self, url: &str) -> Vec<Visibility> {
        self.routes_for_url(url)
            .next()
            .map(|r| r.adapter.visibility_options())
            .unwrap_or_default()
    }
}

async fn discover(
    adapter: Arc<dyn PlatformAdapter>,
    expand_projects: bool,
) -> Result<Vec<PlatformEntry>, AdapterError> {
    let label = adapter.platform_label();
    adapter.set_filter_key(&label);
    let mut entries = vec![PlatformEntry::new(label.clone(), Arc::clone(&adapter))];

    if expand_projects {
        if let Some(projects) = adapter.project_capability() {
            for project in projects.project_list().await? {
                let scoped = projects.scoped_to(&project);
                let scoped_label = scoped.platform_label();
                scoped.set_filter_key(&scoped_label);
                debug!(platform = %label, project = %project.path_with_namespace, "Discovered project platform");
                entries.push(PlatformEntry::new(scoped_label, scoped));
            }
        }
    }
    Ok(entries)
}
