//! Flag/file input merging, selector override loading, result persistence.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;
use webcrack_common::protocol::Selector;

/// Merge values given on the command line with newline-separated entries
/// from an optional file. Blank lines and surrounding whitespace are
/// dropped.
pub fn merge_list(values: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    let mut merged: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        merged.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }

    Ok(merged)
}

/// Load a selector override file and enforce the usable invariant before
/// anything downstream trusts it.
pub fn load_selector(path: &Path) -> Result<Selector> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read selector file {}", path.display()))?;
    let selector: Selector =
        serde_yaml::from_str(&content).context("failed to parse selector file")?;
    if !selector.is_usable() {
        bail!("selector file must define userInput, passwordInput and loginBtn");
    }
    Ok(selector)
}

/// Write the run's outcome document as JSON.
pub fn save_results<T: Serialize>(results: &T, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    serde_json::to_writer_pretty(file, results).context("failed to write results")?;
    Ok(())
}
