#![doc = "snipt-core: platform abstraction and multiplexing layer for snipt."]

//! This crate contains the adapter contract every snippet backend satisfies,
//! the Gist and GitLab adapters, and the [`client::Client`] that fans
//! requests out to every configured backend and routes follow-up operations
//! back to the backend that owns a snippet.
//!
//! # Usage
//! Build a [`config::ClientConfig`], call [`client::Client::connect`], then
//! `list` / `platform_list` before addressing snippets by URL or label.

pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod gist;
pub mod gitlab;
pub mod util;

pub use client::Client;
pub use contract::{
    BackendKind, PlatformAdapter, PlatformEntry, Project, ProjectScoped, Snippet, SnippetFile,
    SnippetHandle, SnippetListEntry, Visibility,
};
pub use error::{AdapterError, ClientError, ErrorKind};
