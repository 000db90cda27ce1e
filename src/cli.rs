/// # snipt CLI interface
///
/// Command parsing and dispatch for the `snipt` binary. Backend logic
/// (adapters, routing, discovery) lives in the `snipt-core` crate; this module
/// loads configuration, connects the [`Client`] and hands over to
/// [`crate::commands`].
///
/// ## How To Use
/// - For command-line users: run `snipt --help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use snipt_core::Client;

use crate::commands;
use crate::load_config::{default_config_path, load_config};

/// Manage code snippets on GitHub Gist and GitLab.
#[derive(Parser)]
#[clap(
    name = "snipt",
    version,
    about = "List, fetch, create, edit and delete snippets on GitHub Gist and GitLab"
)]
pub struct Cli {
    /// Path to the YAML config file (default: <config dir>/snipt/config.yaml)
    #[clap(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List snippets on every configured platform
    List {
        /// One line per file; prints raw URLs
        #[clap(short, long)]
        file: bool,
        /// Include private/secret snippets
        #[clap(short, long)]
        secret: bool,
    },
    /// Select snippets and save or print their files
    Get {
        /// Directory to write files into
        #[clap(short, long)]
        output: Option<PathBuf>,
        /// Select individual files instead of whole snippets
        #[clap(short, long)]
        file: bool,
        /// Include private/secret snippets
        #[clap(short, long)]
        secret: bool,
        /// Print contents to stdout instead of writing files
        #[clap(short, long)]
        read: bool,
    },
    /// Create a snippet from local files on the selected platforms
    Create {
        /// Files to upload
        #[clap(required = true)]
        files: Vec<PathBuf>,
        /// Snippet title (default: "Snippet at <timestamp>")
        #[clap(short, long)]
        title: Option<String>,
        /// Choose the visibility interactively
        #[clap(short, long)]
        visibility: bool,
        /// Offer GitLab projects as targets
        #[clap(short = 'p', long)]
        project_snippet: bool,
    },
    /// Replace files of selected snippets with local files of the same name
    Update {
        /// Local files to upload
        #[clap(required = true)]
        files: Vec<PathBuf>,
        /// Select individual files instead of whole snippets
        #[clap(short, long)]
        file: bool,
        /// New title
        #[clap(short, long)]
        title: Option<String>,
        /// Choose the visibility interactively
        #[clap(short, long)]
        visibility: bool,
        /// Include private/secret snippets
        #[clap(short, long)]
        secret: bool,
    },
    /// Edit a selected snippet file in the configured editor
    Edit {
        /// New title
        #[clap(short, long)]
        title: Option<String>,
        /// Choose the visibility interactively
        #[clap(short, long)]
        visibility: bool,
        /// Include private/secret snippets
        #[clap(short, long)]
        secret: bool,
    },
    /// Delete selected snippets
    Delete {
        /// Include private/secret snippets
        #[clap(short, long)]
        secret: bool,
    },
}

/// Async CLI entrypoint for integration tests and main().
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = load_config(&config_path)?;
    config.trace_loaded();

    // Read local files before touching the network.
    let local_files = match &cli.command {
        Commands::Create { files, .. } | Commands::Update { files, .. } => {
            commands::read_snippet_files(files)?
        }
        _ => Vec::new(),
    };

    let mut client = Client::connect(&config.client)
        .await
        .context("Failed to connect to snippet platforms")?;
    if client.adapters().is_empty() {
        tracing::warn!("No snippet platform is available");
    }
    let general = &config.general;

    match cli.command {
        Commands::List { file, secret } => commands::list(&mut client, file, secret).await,
        Commands::Get {
            output,
            file,
            secret,
            read,
        } => commands::get(&mut client, general, output.as_deref(), file, secret, read).await,
        Commands::Create {
            title,
            visibility,
            project_snippet,
            ..
        } => {
            commands::create(
                &mut client,
                general,
                local_files,
                title,
                visibility,
                project_snippet,
            )
            .await
        }
        Commands::Update {
            file,
            title,
            visibility,
            secret,
            ..
        } => {
            commands::update(
                &mut client,
                general,
                local_files,
                file,
                title,
                visibility,
                secret,
            )
            .await
        }
        Commands::Edit {
            title,
            visibility,
            secret,
        } => commands::edit(&mut client, general, title, visibility, secret).await,
        Commands::Delete { secret } => commands::delete(&mut client, general, secret).await,
    }
}
