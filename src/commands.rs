//! One function per subcommand. Each takes an already-connected [`Client`]
//! and the general settings; argument parsing lives in [`crate::cli`].

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use snipt_core::{Client, Snippet, SnippetFile, SnippetListEntry};
use tracing::{info, warn};

use crate::config::GeneralConfig;
use crate::editor::edit_contents;
use crate::select::{choose_visibility, confirm, run_line_selector, run_selector};

/// `<url> <visibility>: <title>`, with the raw URL instead when listing files.
pub fn format_list_line(entry: &SnippetListEntry, file: bool) -> String {
    let location = if file {
        entry.raw_url.as_deref().unwrap_or(&entry.url)
    } else {
        &entry.url
    };
    format!("{location} {}: {}", entry.visibility, entry.title)
}

pub fn selector_input(entries: &[SnippetListEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}\n", e.selector_line()))
        .collect()
}

pub fn default_title(now: DateTime<Local>) -> String {
    format!("Snippet at {}", now.format("%Y/%m/%d %H:%M:%S"))
}

/// Reads local files into snippet files named by their file name.
pub fn read_snippet_files(paths: &[PathBuf]) -> Result<Vec<SnippetFile>> {
    paths
        .iter()
        .map(|path| {
            let contents = fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .with_context(|| format!("{} has no file name", path.display()))?;
            Ok(SnippetFile::new(name, contents))
        })
        .collect()
}

/// Replaces the contents of every remote file that has a local counterpart
/// with the same path. Remote files without one are kept as they are.
pub fn merge_files(remote: Vec<SnippetFile>, local: &[SnippetFile]) -> Vec<SnippetFile> {
    for file in local {
        if !remote.iter().any(|r| r.path == file.path) {
            warn!(path = %file.path, "Local file has no counterpart in the snippet, skipping");
        }
    }
    remote
        .into_iter()
        .map(|mut r| {
            if let Some(l) = local.iter().find(|l| l.path == r.path) {
                r.contents = l.contents.clone();
            }
            r
        })
        .collect()
}

/// Every file of the snippet, or only the one addressed by a file URL.
pub fn files_for_selection(snippet: Snippet, url: &str, file_only: bool) -> Vec<SnippetFile> {
    if file_only {
        snippet
            .files
            .into_iter()
            .filter(|f| f.filter == url)
            .collect()
    } else {
        snippet.files
    }
}

/// Remote file paths must stay below the output directory (or the working
/// directory without `-o`): absolute paths and `..` are refused.
pub fn output_path(dir: Option<&Path>, file_path: &str) -> Result<PathBuf> {
    let relative = Path::new(file_path);
    let confined = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if file_path.is_empty() || !confined {
        bail!("Refusing to write snippet file outside the output directory: {file_path}");
    }
    Ok(match dir {
        Some(dir) => dir.join(relative),
        None => relative.to_path_buf(),
    })
}

async fn select_snippets(
    client: &mut Client,
    general: &GeneralConfig,
    file: bool,
    secret: bool,
) -> Result<Vec<String>> {
    let entries = client.list(file, secret).await;
    if entries.is_empty() {
        info!("No snippets to select from");
        return Ok(Vec::new());
    }
    run_selector(&general.select_cmd, &selector_input(&entries))
}

pub async fn list(client: &mut Client, file: bool, secret: bool) -> Result<()> {
    for entry in client.list(file, secret).await {
        println!("{}", format_list_line(&entry, file));
    }
    Ok(())
}

pub async fn get(
    client: &mut Client,
    general: &GeneralConfig,
    output: Option<&Path>,
    file: bool,
    secret: bool,
    read: bool,
) -> Result<()> {
    let mut files = Vec::new();
    for url in select_snippets(client, general, file, secret).await? {
        match client.get(&url).await? {
            Some(snippet) => files.extend(files_for_selection(snippet, &url, file)),
            None => warn!(url = %url, "Selected url is not a listed snippet"),
        }
    }

    let mut stdout = std::io::stdout();
    for f in files {
        if read {
            stdout
                .write_all(&f.contents)
                .context("Failed to write snippet to stdout")?;
            continue;
        }
        let path = output_path(output, &f.path)?;
        if path.exists() && !confirm(&format!("Overwrite {}?", path.display()))? {
            info!(path = %path.display(), "Kept existing file");
            continue;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, &f.contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Saved snippet file");
        eprintln!("Saved: {}", path.display());
    }
    Ok(())
}

pub async fn create(
    client: &mut Client,
    general: &GeneralConfig,
    files: Vec<SnippetFile>,
    title: Option<String>,
    visibility: bool,
    project_snippet: bool,
) -> Result<()> {
    let labels = client
        .platform_list(project_snippet)
        .await
        .context("Failed to discover platforms")?;
    let input: String = labels.iter().map(|l| format!("{l}\n")).collect();
    let selected = run_line_selector(&general.select_cmd, &input)?;

    let title = title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| default_title(Local::now()));

    let mut urls = Vec::new();
    for label in selected {
        let mut snippet = Snippet {
            title: title.clone(),
            files: files.clone(),
            ..Default::default()
        };
        if visibility {
            snippet.visibility = choose_visibility(&client.visibility_list_from_platform(&label))?;
        }
        urls.extend(client.create(&label, &snippet).await?);
    }

    for url in urls {
        println!("Snippet created: {url}");
    }
    Ok(())
}

pub async fn update(
    client: &mut Client,
    general: &GeneralConfig,
    files: Vec<SnippetFile>,
    file: bool,
    title: Option<String>,
    visibility: bool,
    secret: bool,
) -> Result<()> {
    let mut urls = Vec::new();
    for url in select_snippets(client, general, file, secret).await? {
        let Some(mut snippet) = client.get(&url).await? else {
            warn!(url = %url, "Selected url is not a listed snippet");
            continue;
        };
        if let Some(title) = title.as_ref().filter(|t| !t.is_empty()) {
            snippet.title = title.clone();
        }
        if visibility {
            snippet.visibility = choose_visibility(&client.visibility_list_from_url(&url))?;
        }
        snippet.files = merge_files(std::mem::take(&mut snippet.files), &files);
        urls.extend(client.update(&url, &snippet).await?);
    }

    for url in urls {
        println!("Snippet updated: {url}");
    }
    Ok(())
}

pub async fn edit(
    client: &mut Client,
    general: &GeneralConfig,
    title: Option<String>,
    visibility: bool,
    secret: bool,
) -> Result<()> {
    let mut urls = Vec::new();
    for url in select_snippets(client, general, true, secret).await? {
        let Some(mut snippet) = client.get(&url).await? else {
            warn!(url = %url, "Selected url is not a listed snippet");
            continue;
        };
        if let Some(title) = title.as_ref().filter(|t| !t.is_empty()) {
            snippet.title = title.clone();
        }
        if visibility {
            snippet.visibility = choose_visibility(&client.visibility_list_from_url(&url))?;
        }

        let mut edited = false;
        for f in snippet.files.iter_mut().filter(|f| f.filter == url) {
            f.contents = edit_contents(&general.editor, &f.path, &f.contents)?;
            edited = true;
        }
        if !edited {
            warn!(url = %url, "No file of the snippet matches the selection");
            continue;
        }
        urls.extend(client.update(&url, &snippet).await?);
    }

    for url in urls {
        println!("Snippet updated: {url}");
    }
    Ok(())
}

pub async fn delete(client: &mut Client, general: &GeneralConfig, secret: bool) -> Result<()> {
    for url in select_snippets(client, general, false, secret).await? {
        client.delete(&url).await?;
        eprintln!("Snippet deleted: {url}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(raw_url: Option<&str>) -> SnippetListEntry {
        SnippetListEntry {
            platform: "gist.github.com:me".into(),
            id: "abc".into(),
            title: "hello".into(),
            raw_url: raw_url.map(str::to_string),
            url: "https://gist.github.com/abc/a.rs".into(),
            visibility: "secret".into(),
        }
    }

    #[test]
    fn list_line_prefers_raw_url_for_files() {
        let e = entry(Some("https://gist.githubusercontent.com/raw/a.rs"));
        assert_eq!(
            format_list_line(&e, false),
            "https://gist.github.com/abc/a.rs secret: hello"
        );
        assert_eq!(
            format_list_line(&e, true),
            "https://gist.githubusercontent.com/raw/a.rs secret: hello"
        );
        assert_eq!(
            format_list_line(&entry(None), true),
            "https://gist.github.com/abc/a.rs secret: hello"
        );
    }

    #[test]
    fn selector_input_has_one_line_per_entry() {
        let input = selector_input(&[entry(None), entry(None)]);
        assert_eq!(input.lines().count(), 2);
        assert!(input.starts_with("https://gist.github.com/abc/a.rs gist.github.com:me hello"));
    }

    #[test]
    fn default_title_uses_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(default_title(now), "Snippet at 2024/03/09 07:05:01");
    }

    #[test]
    fn merge_replaces_only_matching_paths() {
        let mut a = SnippetFile::new("a.rs", "old a");
        a.filter = "https://x/a.rs".into();
        let b = SnippetFile::new("b.rs", "old b");
        let merged = merge_files(
            vec![a, b],
            &[SnippetFile::new("a.rs", "new a"), SnippetFile::new("c.rs", "c")],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].contents, b"new a");
        assert_eq!(merged[0].filter, "https://x/a.rs");
        assert_eq!(merged[1].contents, b"old b");
    }

    #[test]
    fn file_selection_filters_by_url() {
        let mut snippet = Snippet {
            files: vec![SnippetFile::new("a.rs", "a"), SnippetFile::new("b.rs", "b")],
            ..Default::default()
        };
        snippet.files[1].filter = "https://x/b.rs".into();
        let only = files_for_selection(snippet.clone(), "https://x/b.rs", true);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].path, "b.rs");
        assert_eq!(files_for_selection(snippet, "https://x/b.rs", false).len(), 2);
    }

    #[test]
    fn read_files_uses_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.sh");
        fs::write(&path, "echo hi").unwrap();
        let files = read_snippet_files(&[path]).unwrap();
        assert_eq!(files[0].path, "script.sh");
        assert_eq!(files[0].contents, b"echo hi");

        assert!(read_snippet_files(&[dir.path().join("missing")]).is_err());
    }

    #[test]
    fn output_path_joins_directory() {
        assert_eq!(output_path(None, "a.rs").unwrap(), PathBuf::from("a.rs"));
        assert_eq!(
            output_path(Some(Path::new("/tmp/out")), "a.rs").unwrap(),
            PathBuf::from("/tmp/out/a.rs")
        );
        assert_eq!(
            output_path(Some(Path::new("/tmp/out")), "src/lib.rs").unwrap(),
            PathBuf::from("/tmp/out/src/lib.rs")
        );
    }

    #[test]
    fn output_path_refuses_to_escape_directory() {
        let out = Some(Path::new("/tmp/out"));
        assert!(output_path(out, "/etc/passwd").is_err());
        assert!(output_path(out, "../a.rs").is_err());
        assert!(output_path(out, "src/../../a.rs").is_err());
        assert!(output_path(None, "/etc/passwd").is_err());
        assert!(output_path(out, "").is_err());
    }
}
