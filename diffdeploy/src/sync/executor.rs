use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::backend::{BackendError, RemoteBackend};
use super::planner::Operation;

/// The first fatal failure, with the operation that caused it.
#[derive(Debug, Error)]
#[error("{operation} failed: {source}")]
pub struct ApplyError {
    pub operation: Operation,
    #[source]
    pub source: BackendError,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub directories_created: usize,
    pub directories_present: usize,
    pub files_uploaded: usize,
    pub permissions_set: usize,
    pub permissions_unsupported: usize,
    pub deleted: usize,
    pub already_absent: usize,
}

/// Runs `plan` in order on one session, stopping at the first fatal error.
///
/// Tolerated: an existing directory on mkdir, an unsupported chmod, and
/// not-found on either delete attempt. A successful file delete skips the
/// directory attempt for the same path. Nothing is retried.
pub async fn apply<B: RemoteBackend + ?Sized>(
    plan: &[Operation],
    session: &B,
) -> Result<ApplyReport, ApplyError> {
    let mut report = ApplyReport::default();
    let mut deleted_as_file: Option<&str> = None;

    for operation in plan {
        let result = match operation {
            Operation::MakeDirectory(path) => match session.make_directory(path).await {
                Ok(()) => {
                    info!(path = %path, "directory created");
                    report.directories_created += 1;
                    Ok(())
                }
                Err(BackendError::AlreadyExists(_)) => {
                    info!(path = %path, "directory already present");
                    report.directories_present += 1;
                    Ok(())
                }
                Err(err) => Err(err),
            },
            Operation::UploadFile(path, source) => {
                session.upload_file(path, source).await.map(|()| {
                    info!(path = %path, "file uploaded");
                    report.files_uploaded += 1;
                })
            }
            Operation::SetPermissions(path, bits) => {
                match session.set_permissions(path, *bits).await {
                    Ok(()) => {
                        debug!(path = %path, mode = %format!("{bits:o}"), "permissions changed");
                        report.permissions_set += 1;
                        Ok(())
                    }
                    Err(BackendError::Unsupported(reason)) => {
                        warn!(path = %path, %reason, "permission change not supported, ignoring");
                        report.permissions_unsupported += 1;
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
            Operation::DeleteFile(path) => match session.delete_file(path).await {
                Ok(()) => {
                    info!(path = %path, "file deleted");
                    report.deleted += 1;
                    deleted_as_file = Some(path.as_str());
                    Ok(())
                }
                Err(BackendError::NotFound(_)) => {
                    debug!(path = %path, "no file to delete, trying as directory");
                    Ok(())
                }
                Err(err) => Err(err),
            },
            Operation::DeleteDirectory(path) => {
                if deleted_as_file.take() == Some(path.as_str()) {
                    continue;
                }
                match session.delete_directory(path).await {
                    Ok(()) => {
                        info!(path = %path, "directory deleted");
                        report.deleted += 1;
                        Ok(())
                    }
                    Err(BackendError::NotFound(_)) => {
                        info!(path = %path, "already absent");
                        report.already_absent += 1;
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
        };

        if let Err(source) = result {
            error!(%operation, error = %source, "operation failed, aborting");
            return Err(ApplyError {
                operation: operation.clone(),
                source,
            });
        }
    }

    Ok(report)
}
