use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use super::entry::EntryPair;
use super::paths::SYNC_ROOT;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("failed to walk local tree: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("path is not valid UTF-8: {0:?}")]
    NonUtf8(PathBuf),
}

/// Lists `root` and everything below it as (source, destination) pairs.
/// `root` itself maps to the sync root.
pub fn expand_tree(root: &Path) -> Result<Vec<EntryPair>, TreeError> {
    let mut pairs = Vec::new();
    for item in WalkDir::new(root).sort_by_file_name() {
        let item = item?;
        let relative = item.path().strip_prefix(root).unwrap_or(item.path());
        let mut segments = Vec::new();
        for component in relative.components() {
            let segment = component
                .as_os_str()
                .to_str()
                .ok_or_else(|| TreeError::NonUtf8(item.path().to_path_buf()))?;
            segments.push(segment);
        }
        let destination = if segments.is_empty() {
            SYNC_ROOT.to_string()
        } else {
            segments.join("/")
        };
        pairs.push(EntryPair::new(item.path(), destination));
    }
    Ok(pairs)
}
