use std::collections::HashSet;
use std::fs::Metadata;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use super::manifest::MANIFEST_NAME;
use super::paths::{PathError, normalize_destination};

/// Only the rwxrwxrwx bits take part in signatures and permission changes.
pub const PERMISSION_MASK: u32 = 0o777;

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("source path is empty for destination {0}")]
    EmptySource(String),
    #[error("invalid destination {destination}: {source}")]
    Destination {
        destination: String,
        #[source]
        source: PathError,
    },
    #[error("failed to stat {path:?}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0:?} is neither a regular file nor a directory")]
    UnsupportedKind(PathBuf),
    #[error("destination {0} is reserved for the deployment manifest")]
    Reserved(String),
    #[error("destination {0} is listed more than once")]
    DuplicateDestination(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A local source paired with its remote destination, before stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPair {
    pub source: PathBuf,
    pub destination: String,
}

impl EntryPair {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub source: PathBuf,
    pub destination: String,
    pub kind: EntryKind,
    pub permission_bits: u32,
}

impl Entry {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<String>,
        kind: EntryKind,
        permission_bits: u32,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            kind,
            permission_bits: permission_bits & PERMISSION_MASK,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Stats every pair and produces the entries taking part in the run.
///
/// Sources that no longer exist are dropped with a warning. Any other stat
/// failure, an invalid or duplicated destination, or a destination that
/// collides with the manifest object fails the whole batch.
pub async fn resolve_entries(pairs: Vec<EntryPair>) -> Result<Vec<Entry>, EntryError> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(pairs.len());

    for pair in pairs {
        if pair.source.as_os_str().is_empty() {
            return Err(EntryError::EmptySource(pair.destination));
        }
        let destination =
            normalize_destination(&pair.destination).map_err(|source| EntryError::Destination {
                destination: pair.destination.clone(),
                source,
            })?;
        if destination == MANIFEST_NAME {
            return Err(EntryError::Reserved(destination));
        }

        let meta = match tokio::fs::metadata(&pair.source).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(source = %pair.source.display(), "source not found, skipping");
                continue;
            }
            Err(source) => {
                return Err(EntryError::Metadata {
                    path: pair.source,
                    source,
                });
            }
        };
        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else if meta.is_file() {
            EntryKind::File
        } else {
            return Err(EntryError::UnsupportedKind(pair.source));
        };

        if !seen.insert(destination.clone()) {
            return Err(EntryError::DuplicateDestination(destination));
        }
        let bits = permission_bits(&meta, kind);
        entries.push(Entry::new(pair.source, destination, kind, bits));
    }

    Ok(entries)
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata, _kind: EntryKind) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata, kind: EntryKind) -> u32 {
    match (kind, meta.permissions().readonly()) {
        (EntryKind::Directory, _) => 0o755,
        (EntryKind::File, true) => 0o444,
        (EntryKind::File, false) => 0o644,
    }
}
