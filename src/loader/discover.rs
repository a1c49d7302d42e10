//! Definition file discovery
//!
//! Files sharing a stem modulo a `.partN` suffix belong to the same model
//! and merge in file-name lexicographic order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::MedallionError;

static PART_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<stem>.+)\.part\d+$").unwrap());

/// The files contributing to a single model, in merge order.
#[derive(Debug, Clone)]
pub struct DefinitionGroup {
    /// Common stem shared by the contributing files
    pub stem: String,
    /// Contributing files, sorted by file name
    pub files: Vec<PathBuf>,
}

fn is_definition_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}

/// Stem of a definition file with any `.partN` suffix removed.
fn group_stem(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    match PART_SUFFIX_RE.captures(stem) {
        Some(caps) => Some(caps["stem"].to_string()),
        None => Some(stem.to_string()),
    }
}

/// Discover every definition file under `root`, grouped by stem.
///
/// Groups come back sorted by stem and files within a group sorted by file
/// name, so downstream merging is deterministic.
pub fn discover_definitions(root: &Path) -> Result<Vec<DefinitionGroup>, MedallionError> {
    if !root.is_dir() {
        return Err(MedallionError::IoError {
            message: format!("model root is not a directory: {}", root.display()),
        });
    }

    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| MedallionError::IoError {
            message: format!("failed to walk {}: {}", root.display(), e),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_definition_file(path) {
            continue;
        }
        if let Some(stem) = group_stem(path) {
            groups.entry(stem).or_default().push(path.to_path_buf());
        }
    }

    let mut result: Vec<DefinitionGroup> = groups
        .into_iter()
        .map(|(stem, mut files)| {
            files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            DefinitionGroup { stem, files }
        })
        .collect();
    result.sort_by(|a, b| a.stem.cmp(&b.stem));
    Ok(result)
}
