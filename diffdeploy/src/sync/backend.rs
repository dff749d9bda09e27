use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use diffdeploy_remote::{ErrorClass, RemoteClient, RemoteError, ResourceType};
use thiserror::Error;

/// Remote failures, classified by how the engine reacts to them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("not supported: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Failed(String),
}

impl From<RemoteError> for BackendError {
    fn from(err: RemoteError) -> Self {
        let message = err.to_string();
        match err.classification() {
            ErrorClass::Auth => BackendError::Auth(message),
            ErrorClass::NotFound => BackendError::NotFound(message),
            ErrorClass::AlreadyExists => BackendError::AlreadyExists(message),
            ErrorClass::Unsupported => BackendError::Unsupported(message),
            ErrorClass::Other => BackendError::Failed(message),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Operations the engine needs from one remote session.
///
/// Paths are relative to the session working directory.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn change_directory(&mut self, path: &str) -> Result<(), BackendError>;
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, BackendError>;
    async fn write_file(&self, path: &str, contents: Vec<u8>) -> Result<(), BackendError>;
    async fn upload_file(&self, path: &str, source: &Path) -> Result<(), BackendError>;
    async fn make_directory(&self, path: &str) -> Result<(), BackendError>;
    async fn set_permissions(&self, path: &str, bits: u32) -> Result<(), BackendError>;
    async fn delete_file(&self, path: &str) -> Result<(), BackendError>;
    async fn delete_directory(&self, path: &str) -> Result<(), BackendError>;
}

/// Opens authenticated sessions. A successful connect means the credentials
/// were accepted.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    type Session: RemoteBackend;

    async fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Result<Self::Session, BackendError>;
}

/// Connects to the HTTP file store served by `diffdeploy-remote`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

#[async_trait]
impl RemoteConnector for HttpConnector {
    type Session = RemoteClient;

    async fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Result<RemoteClient, BackendError> {
        let client = RemoteClient::new(host, &credentials.username, &credentials.password)?;
        client.check_session().await?;
        Ok(client)
    }
}

#[async_trait]
impl RemoteBackend for RemoteClient {
    async fn change_directory(&mut self, path: &str) -> Result<(), BackendError> {
        Ok(RemoteClient::change_directory(self, path).await?)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, BackendError> {
        Ok(RemoteClient::read_file(self, path).await?)
    }

    async fn write_file(&self, path: &str, contents: Vec<u8>) -> Result<(), BackendError> {
        Ok(self.write_bytes(path, contents).await?)
    }

    async fn upload_file(&self, path: &str, source: &Path) -> Result<(), BackendError> {
        Ok(self.upload_from_path(path, source).await?)
    }

    /// A conflict only means "already present" when a directory sits there.
    async fn make_directory(&self, path: &str) -> Result<(), BackendError> {
        match self.create_folder(path).await {
            Err(err) if err.classification() == ErrorClass::AlreadyExists => {
                let existing = self.get_resource(path).await?;
                if existing.resource_type == ResourceType::Dir {
                    Err(err.into())
                } else {
                    Err(BackendError::Failed(format!(
                        "{} exists and is not a directory",
                        existing.path
                    )))
                }
            }
            other => Ok(other?),
        }
    }

    async fn set_permissions(&self, path: &str, bits: u32) -> Result<(), BackendError> {
        Ok(RemoteClient::set_permissions(self, path, bits).await?)
    }

    async fn delete_file(&self, path: &str) -> Result<(), BackendError> {
        Ok(RemoteClient::delete_file(self, path).await?)
    }

    async fn delete_directory(&self, path: &str) -> Result<(), BackendError> {
        Ok(RemoteClient::delete_directory(self, path).await?)
    }
}
