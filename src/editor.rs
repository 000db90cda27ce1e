//! Round-trips file contents through the user's editor using a temp file.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, error, info};

/// Writes `contents` to a temp file named after `path` (same extension),
/// opens it with `editor` and returns the saved bytes.
///
/// `editor` is run through `sh -c`, so it may carry its own flags
/// (`code --wait`). The temp file is removed on return.
pub fn edit_contents(editor: &str, path: &str, contents: &[u8]) -> Result<Vec<u8>> {
    let suffix = Path::new(path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let mut file = tempfile::Builder::new()
        .prefix("snipt-")
        .suffix(&suffix)
        .tempfile()
        .context("Failed to create temp file for editing")?;
    file.write_all(contents)
        .and_then(|_| file.flush())
        .context("Failed to write temp file for editing")?;

    let temp_path = file.path().to_path_buf();
    debug!(editor, file = %temp_path.display(), "Opening editor");

    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("{editor} \"$1\""))
        .arg("snipt-editor")
        .arg(&temp_path)
        .status();

    match status {
        Ok(s) if s.success() => {
            info!(editor, path, "Editor closed");
        }
        Ok(s) => {
            error!(editor, path, "Editor exited with non-zero code: {}", s);
            bail!("Editor `{editor}` exited with {s}");
        }
        Err(e) => {
            error!(error = ?e, editor, path, "Failed to launch editor");
            return Err(anyhow!("Failed to launch editor `{editor}`: {e}"));
        }
    }

    fs::read(&temp_path).with_context(|| format!("Failed to read edited file {}", temp_path.display()))
}
