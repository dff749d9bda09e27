use std::cmp::Ordering;

use thiserror::Error;

/// Destination that denotes the remote base itself.
pub const SYNC_ROOT: &str = ".";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("destination path is empty")]
    Empty,
    #[error("destination path escapes the remote base: {0}")]
    UnsupportedComponent(String),
}

/// Normalizes a destination into slash-separated segments relative to the
/// remote base. The base itself normalizes to [`SYNC_ROOT`].
pub fn normalize_destination(destination: &str) -> Result<String, PathError> {
    if destination.is_empty() {
        return Err(PathError::Empty);
    }

    let mut segments = Vec::new();
    for part in destination.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return Err(PathError::UnsupportedComponent(destination.to_string())),
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Ok(SYNC_ROOT.to_string());
    }
    Ok(segments.join("/"))
}

pub fn is_sync_root(destination: &str) -> bool {
    destination == SYNC_ROOT
}

/// Number of path segments; the sync root has depth zero.
pub fn depth(destination: &str) -> usize {
    if is_sync_root(destination) {
        return 0;
    }
    destination.split('/').count()
}

/// Orders destinations so that every ancestor sorts before its descendants.
pub fn hierarchy_cmp(a: &str, b: &str) -> Ordering {
    match (is_sync_root(a), is_sync_root(b)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.split('/').cmp(b.split('/')),
    }
}
