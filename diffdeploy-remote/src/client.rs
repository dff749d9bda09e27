use std::path::Path;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

use crate::paths::resolve_remote_path;

const DEFAULT_SCHEME: &str = "https://";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("remote path is not a directory: {0}")]
    NotADirectory(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Auth,
    NotFound,
    AlreadyExists,
    Unsupported,
    Other,
}

/// One authenticated session against the remote store.
///
/// Relative paths are resolved against the session working directory, which
/// starts at `/` and moves with [`RemoteClient::change_directory`]. Cloning a
/// client yields an independent session with its own working directory.
#[derive(Clone)]
pub struct RemoteClient {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
    cwd: String,
}

impl RemoteClient {
    pub fn new(
        host: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, RemoteError> {
        Self::with_base_url(&host_url(host), username, password)
    }

    pub fn with_base_url(
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            username: username.into(),
            password: password.into(),
            cwd: "/".to_string(),
        })
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub async fn check_session(&self) -> Result<(), RemoteError> {
        let url = self.endpoint("/v1/session")?;
        let response = self.authorized(Method::GET, url).send().await?;
        Self::handle_empty(response).await
    }

    pub async fn get_resource(&self, path: &str) -> Result<Resource, RemoteError> {
        let request = self.resource_request(Method::GET, "/v1/resources", path)?;
        Self::handle_response(request.send().await?).await
    }

    pub async fn change_directory(&mut self, path: &str) -> Result<(), RemoteError> {
        let target = resolve_remote_path(&self.cwd, path);
        let resource = self.get_resource(&target).await?;
        if resource.resource_type != ResourceType::Dir {
            return Err(RemoteError::NotADirectory(target));
        }
        self.cwd = target;
        Ok(())
    }

    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let request = self.resource_request(Method::GET, "/v1/resources/content", path)?;
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response.bytes().await?.to_vec())
        } else {
            Err(Self::api_error(response).await)
        }
    }

    pub async fn write_bytes(&self, path: &str, bytes: Vec<u8>) -> Result<(), RemoteError> {
        let request = self.content_upload_request(path)?;
        Self::handle_empty(request.body(bytes).send().await?).await
    }

    pub async fn upload_from_path(&self, path: &str, source: &Path) -> Result<(), RemoteError> {
        let file = tokio::fs::File::open(source).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let request = self.content_upload_request(path)?;
        Self::handle_empty(request.body(body).send().await?).await
    }

    pub async fn create_folder(&self, path: &str) -> Result<(), RemoteError> {
        let request = self.resource_request(Method::PUT, "/v1/resources", path)?;
        Self::handle_empty(request.send().await?).await
    }

    /// Applies the low nine permission bits of `mode` to `path`.
    pub async fn set_permissions(&self, path: &str, mode: u32) -> Result<(), RemoteError> {
        let mut url = self.endpoint("/v1/resources/permissions")?;
        url.query_pairs_mut()
            .append_pair("path", &self.absolute(path))
            .append_pair("mode", &format!("{:o}", mode & 0o777));
        let response = self.authorized(Method::PATCH, url).send().await?;
        Self::handle_empty(response).await
    }

    pub async fn delete_file(&self, path: &str) -> Result<(), RemoteError> {
        self.delete_resource(path, ResourceType::File).await
    }

    pub async fn delete_directory(&self, path: &str) -> Result<(), RemoteError> {
        self.delete_resource(path, ResourceType::Dir).await
    }

    async fn delete_resource(&self, path: &str, kind: ResourceType) -> Result<(), RemoteError> {
        let mut url = self.endpoint("/v1/resources")?;
        url.query_pairs_mut()
            .append_pair("path", &self.absolute(path))
            .append_pair("kind", kind.as_str());
        let response = self.authorized(Method::DELETE, url).send().await?;
        Self::handle_empty(response).await
    }

    fn content_upload_request(&self, path: &str) -> Result<RequestBuilder, RemoteError> {
        let mut url = self.endpoint("/v1/resources/content")?;
        url.query_pairs_mut()
            .append_pair("path", &self.absolute(path))
            .append_pair("overwrite", "true");
        Ok(self.authorized(Method::PUT, url))
    }

    fn resource_request(
        &self,
        method: Method,
        endpoint: &str,
        path: &str,
    ) -> Result<RequestBuilder, RemoteError> {
        let mut url = self.endpoint(endpoint)?;
        url.query_pairs_mut().append_pair("path", &self.absolute(path));
        Ok(self.authorized(method, url))
    }

    fn authorized(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    fn absolute(&self, path: &str) -> String {
        resolve_remote_path(&self.cwd, path)
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RemoteError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn handle_empty(response: reqwest::Response) -> Result<(), RemoteError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn api_error(response: reqwest::Response) -> RemoteError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        RemoteError::Api { status, body }
    }
}

impl RemoteError {
    pub fn classification(&self) -> ErrorClass {
        match self {
            RemoteError::Api { status, .. } => classify_api_status(*status),
            _ => ErrorClass::Other,
        }
    }
}

fn classify_api_status(status: StatusCode) -> ErrorClass {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorClass::Auth,
        StatusCode::NOT_FOUND | StatusCode::GONE => ErrorClass::NotFound,
        StatusCode::CONFLICT => ErrorClass::AlreadyExists,
        StatusCode::NOT_IMPLEMENTED | StatusCode::METHOD_NOT_ALLOWED => ErrorClass::Unsupported,
        _ => ErrorClass::Other,
    }
}

fn host_url(host: &str) -> String {
    if host.contains("://") {
        host.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{host}")
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Resource {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    File,
    Dir,
}

impl ResourceType {
    fn as_str(self) -> &'static str {
        match self {
            ResourceType::File => "file",
            ResourceType::Dir => "dir",
        }
    }
}
