use std::fmt;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::entry::{Entry, EntryKind, PERMISSION_MASK};
use super::manifest::Manifest;
use super::paths::{depth, hierarchy_cmp, is_sync_root, normalize_destination};

/// One remote action. Paths are relative to the remote base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    MakeDirectory(String),
    UploadFile(String, PathBuf),
    SetPermissions(String, u32),
    DeleteFile(String),
    DeleteDirectory(String),
}

impl Operation {
    pub fn path(&self) -> &str {
        match self {
            Operation::MakeDirectory(path)
            | Operation::UploadFile(path, _)
            | Operation::SetPermissions(path, _)
            | Operation::DeleteFile(path)
            | Operation::DeleteDirectory(path) => path,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::MakeDirectory(path) => write!(f, "mkdir /{path}"),
            Operation::UploadFile(path, source) => {
                write!(f, "upload {} -> /{path}", source.display())
            }
            Operation::SetPermissions(path, bits) => write!(f, "chmod {bits:o} /{path}"),
            Operation::DeleteFile(path) => write!(f, "delete file /{path}"),
            Operation::DeleteDirectory(path) => write!(f, "delete directory /{path}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    pub disable_permissions: bool,
}

/// Builds the ordered operations that move the remote from `remote` to
/// `local`.
///
/// Creates and uploads come first with every directory ahead of its contents,
/// then deletions of paths only the baseline knows, deepest first. Each
/// deletion is a file attempt followed by a directory attempt because the
/// baseline does not record kinds.
pub fn plan(
    local: &Manifest,
    remote: &Manifest,
    entries: &[Entry],
    options: PlanOptions,
) -> Vec<Operation> {
    let mut ordered: Vec<&Entry> = entries.iter().collect();
    ordered.sort_by(|a, b| hierarchy_cmp(&a.destination, &b.destination));

    let mut operations = Vec::new();
    for entry in ordered {
        let path = &entry.destination;
        if is_sync_root(path) {
            continue;
        }
        let local_sig = local.get(path);
        if local_sig.is_some() && local_sig == remote.get(path) {
            debug!(path = %path, "unchanged, skipping");
            continue;
        }

        match entry.kind {
            EntryKind::Directory => operations.push(Operation::MakeDirectory(path.clone())),
            EntryKind::File => {
                operations.push(Operation::UploadFile(path.clone(), entry.source.clone()))
            }
        }
        if !options.disable_permissions {
            operations.push(Operation::SetPermissions(
                path.clone(),
                entry.permission_bits & PERMISSION_MASK,
            ));
        }
    }

    let mut stale: Vec<&str> = remote
        .paths()
        .filter(|path| !local.contains(path) && !is_sync_root(path))
        .filter(|path| {
            let valid = normalize_destination(path).is_ok_and(|normalized| normalized == *path);
            if !valid {
                warn!(path = %path, "ignoring malformed path in remote manifest");
            }
            valid
        })
        .collect();
    stale.sort_by(|a, b| depth(b).cmp(&depth(a)).then_with(|| b.cmp(a)));

    for path in stale {
        operations.push(Operation::DeleteFile(path.to_string()));
        operations.push(Operation::DeleteDirectory(path.to_string()));
    }

    operations
}
