//! Plugin registry loading - walk a directory tree and classify every file

use std::path::Path;

use walkdir::WalkDir;

use super::classifier::{PluginRecord, classify};
use crate::{Error, Result};

/// Load the initial plugin registry from `root`
///
/// Recursively enumerates every regular file below `root`, classifies it and
/// keeps the supported ones in discovery order (file names sorted within a
/// directory).
///
/// # Errors
///
/// Returns [`Error::Config`] if `root` does not exist or is not a directory
pub fn load_registry(root: &Path) -> Result<Vec<PluginRecord>> {
    if !root.is_dir() {
        return Err(Error::Config(format!(
            "plugin directory does not exist: {}",
            root.display()
        )));
    }

    let plugins = walk(root).map_err(Error::Config)?;
    tracing::info!(
        path = %root.display(),
        count = plugins.len(),
        "loaded plugin registry"
    );
    Ok(plugins)
}

/// Re-scan `root` for the hot-reload watcher
///
/// Same enumeration as [`load_registry`], but failures are reported as
/// transient so the caller can keep its previous snapshot.
///
/// # Errors
///
/// Returns [`Error::Scan`] if `root` is missing or cannot be read
pub fn scan_registry(root: &Path) -> Result<Vec<PluginRecord>> {
    if !root.is_dir() {
        return Err(Error::Scan(format!(
            "plugin directory is not accessible: {}",
            root.display()
        )));
    }

    walk(root).map_err(Error::Scan)
}

/// First plugin whose name matches
///
/// Duplicate names are allowed in the registry; the earliest record wins.
#[must_use]
pub fn find_plugin<'a>(plugins: &'a [PluginRecord], name: &str) -> Option<&'a PluginRecord> {
    plugins.iter().find(|p| p.name == name)
}

fn walk(root: &Path) -> std::result::Result<Vec<PluginRecord>, String> {
    let mut plugins = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            // The root itself being unreadable means nothing was scanned
            Err(e) if e.depth() == 0 => return Err(e.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable plugin path");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if let Some(record) = classify(entry.path()) {
            plugins.push(record);
        }
    }

    Ok(plugins)
}
