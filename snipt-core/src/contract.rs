//! # contract: the polymorphic surface every snippet backend implements
//!
//! This module defines the [`PlatformAdapter`] trait together with the plain
//! data records exchanged between adapters and the multiplexing
//! [`Client`](crate::client::Client).
//!
//! ## Interface & Extensibility
//! - Implement [`PlatformAdapter`] to add a new snippet backend.
//! - A backend that can be narrowed to sub-scopes (GitLab projects) exposes
//!   that through [`PlatformAdapter::project_capability`] instead of callers
//!   downcasting to a concrete type.
//! - `create`/`update` return a [`SnippetHandle`] whose URL is decided inside
//!   the adapter, so callers never inspect backend response shapes.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`; the generated `MockPlatformAdapter`
//!   and `MockProjectScoped` are exported behind the default
//!   `test-export-mocks` feature.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AdapterError;

/// Access level of a snippet. The set of values is closed per backend and
/// ordinals are only meaningful inside that backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Visibility {
    code: &'static str,
    ordinal: usize,
}

impl Visibility {
    pub const fn new(code: &'static str, ordinal: usize) -> Self {
        Self { code, ordinal }
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Compares two visibilities that may come from different backends.
    pub fn same_code(&self, other: &Visibility) -> bool {
        self.code == other.code
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

/// Summary record used for browsing. `url` is the cross-backend identity key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetListEntry {
    /// Label of the platform the snippet resides on, e.g. `gist.github.com:octocat`.
    pub platform: String,
    /// Backend-local id.
    pub id: String,
    pub title: String,
    pub raw_url: Option<String>,
    pub url: String,
    pub visibility: String,
}

impl SnippetListEntry {
    /// Line handed to the interactive selector. The URL comes first so the
    /// selection can be re-parsed by splitting on whitespace.
    pub fn selector_line(&self) -> String {
        format!("{} {} {}", self.url, self.platform, self.title)
    }
}

/// One file inside a snippet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetFile {
    pub path: String,
    pub raw_url: Option<String>,
    pub contents: Vec<u8>,
    /// Key used to re-associate an edited file with its origin; equals the
    /// file-expanded list URL of this file.
    pub filter: String,
}

impl SnippetFile {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            ..Default::default()
        }
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}

/// Full snippet including every file's payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snippet {
    pub title: String,
    pub description: String,
    pub url: String,
    /// `None` lets the adapter apply its own default on create.
    pub visibility: Option<Visibility>,
    pub files: Vec<SnippetFile>,
}

impl Snippet {
    /// Sets the same filter key on every file.
    pub fn add_filter(&mut self, filter: &str) {
        for file in &mut self.files {
            file.filter = filter.to_string();
        }
    }

    pub fn file_by_filter(&self, filter: &str) -> Option<&SnippetFile> {
        self.files.iter().find(|f| f.filter == filter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Gist,
    Gitlab,
}

/// Result of a create/update call, projected to a canonical URL by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetHandle {
    pub kind: BackendKind,
    pub id: String,
    pub url: String,
}

/// A sub-scope (GitLab project) an adapter can be narrowed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub path_with_namespace: String,
}

/// Routing record binding a platform/project label to the adapter that handles it.
#[derive(Clone)]
pub struct PlatformEntry {
    pub label: String,
    pub filter_key: String,
    pub adapter: Arc<dyn PlatformAdapter>,
}

impl PlatformEntry {
    pub fn new(label: String, adapter: Arc<dyn PlatformAdapter>) -> Self {
        Self {
            filter_key: label.clone(),
            label,
            adapter,
        }
    }
}

impl fmt::Debug for PlatformEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformEntry")
            .field("label", &self.label)
            .field("filter_key", &self.filter_key)
            .finish_non_exhaustive()
    }
}

/// Capability set every snippet backend must implement.
///
/// Implementations are `Send + Sync` so the client can share them across the
/// concurrent discovery tasks of [`Client::platform_list`](crate::client::Client::platform_list).
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Establish identity with the backend and derive the platform label.
    async fn init(&mut self) -> Result<(), AdapterError>;

    /// All snippets visible to the credential, sorted by URL.
    ///
    /// Non-public snippets are skipped unless `include_private` is set; with
    /// `expand_files` every file of a multi-file snippet becomes its own entry.
    async fn list(
        &self,
        expand_files: bool,
        include_private: bool,
    ) -> Result<Vec<SnippetListEntry>, AdapterError>;

    /// Fetch one snippet with every file's content.
    async fn get(&self, id: &str) -> Result<Snippet, AdapterError>;

    /// Create a snippet. An unset visibility becomes the backend's most
    /// restrictive level.
    async fn create(&self, snippet: &Snippet) -> Result<SnippetHandle, AdapterError>;

    /// Replace title, description, visibility and files of an existing snippet.
    async fn update(&self, id: &str, snippet: &Snippet) -> Result<SnippetHandle, AdapterError>;

    async fn delete(&self, id: &str) -> Result<(), AdapterError>;

    /// The backend's closed visibility set in declared order.
    fn visibility_options(&self) -> Vec<Visibility>;

    fn platform_label(&self) -> String;

    fn filter_key(&self) -> String;

    fn set_filter_key(&self, key: &str);

    /// `Some` when the backend can be scoped to projects.
    fn project_capability(&self) -> Option<Arc<dyn ProjectScoped>>;
}

/// Optional capability: enumerate projects and produce adapters scoped to one.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait ProjectScoped: Send + Sync {
    /// Projects the caller is a member of that have snippets enabled.
    async fn project_list(&self) -> Result<Vec<Project>, AdapterError>;

    /// A clone of the adapter re-labelled `"<label> /<project path>"` whose
    /// snippet operations target the project.
    fn scoped_to(&self, project: &Project) -> Arc<dyn PlatformAdapter>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Visibility = Visibility::new("public", 1);
    const B: Visibility = Visibility::new("public", 0);

    #[test]
    fn visibility_compares_across_backends_by_code() {
        assert_ne!(A, B);
        assert!(A.same_code(&B));
        assert_eq!(A.to_string(), "public");
    }

    #[test]
    fn add_filter_touches_every_file() {
        let mut snippet = Snippet {
            files: vec![SnippetFile::new("a.rs", "a"), SnippetFile::new("b.rs", "b")],
            ..Default::default()
        };
        snippet.add_filter("https://example.com/x");
        assert!(snippet
            .files
            .iter()
            .all(|f| f.filter == "https://example.com/x"));
        assert_eq!(
            snippet.file_by_filter("https://example.com/x").map(|f| f.path.as_str()),
            Some("a.rs")
        );
    }

    #[test]
    fn selector_line_starts_with_url() {
        let entry = SnippetListEntry {
            platform: "gitlab.com:me".into(),
            id: "1".into(),
            title: "hello world".into(),
            raw_url: None,
            url: "https://gitlab.com/-/snippets/1".into(),
            visibility: "public".into(),
        };
        let line = entry.selector_line();
        assert_eq!(line.split_whitespace().next(), Some(entry.url.as_str()));
    }
}
