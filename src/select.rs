//! Interactive selection: an external filter command for picking snippets
//! and platforms, and `dialoguer` prompts for yes/no and visibility choices.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{anyhow, Context, Result};
use dialoguer::{Confirm, Select};
use snipt_core::Visibility;
use tracing::{debug, error, info};

/// Pipes `input` through `select_cmd` (run with `sh -c`) and returns the first
/// whitespace-separated token of every selected line.
///
/// A filter that exits non-zero (fzf on Esc or no match) selects nothing.
pub fn run_selector(select_cmd: &str, input: &str) -> Result<Vec<String>> {
    let keys = run_filter(select_cmd, input)?
        .map(|out| parse_selection(&out))
        .unwrap_or_default();
    debug!(count = keys.len(), "Selector returned");
    Ok(keys)
}

/// Like [`run_selector`] but keeps whole lines. Project platform labels
/// contain a space, so they cannot be reduced to their first token.
pub fn run_line_selector(select_cmd: &str, input: &str) -> Result<Vec<String>> {
    Ok(run_filter(select_cmd, input)?
        .map(|out| {
            out.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

/// First token of each non-blank line.
pub fn parse_selection(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

fn run_filter(select_cmd: &str, input: &str) -> Result<Option<String>> {
    debug!(select_cmd, lines = input.lines().count(), "Launching selector");
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(select_cmd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| {
            error!(error = ?e, select_cmd, "Failed to launch selector");
            anyhow!("Failed to launch selector `{select_cmd}`: {e}")
        })?;

    // Streaming filters emit output while still reading input; stdin is fed
    // from its own thread while stdout is drained here.
    let writer = child.stdin.take().map(|mut stdin| {
        let input = input.to_owned();
        thread::spawn(move || {
            // The filter may exit before reading all of its input.
            if let Err(e) = stdin.write_all(input.as_bytes()) {
                debug!(error = ?e, "Selector closed stdin early");
            }
        })
    });

    let output = child
        .wait_with_output()
        .with_context(|| format!("Failed waiting for selector `{select_cmd}`"))?;
    if let Some(writer) = writer {
        writer
            .join()
            .map_err(|_| anyhow!("Selector input writer panicked"))?;
    }

    if !output.status.success() {
        info!(status = ?output.status, "Selector exited without a selection");
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}

pub fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| anyhow!("Prompt failed: {e}"))
}

/// Asks the user to pick one of `options`; `None` when there is nothing to pick.
pub fn choose_visibility(options: &[Visibility]) -> Result<Option<Visibility>> {
    if options.is_empty() {
        return Ok(None);
    }
    let labels: Vec<&str> = options.iter().map(Visibility::code).collect();
    let index = Select::new()
        .with_prompt("Visibility")
        .items(&labels)
        .default(0)
        .interact()
        .map_err(|e| anyhow!("Prompt failed: {e}"))?;
    Ok(options.get(index).copied())
}
