use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::backend::{BackendError, RemoteBackend};

/// Name of the manifest object inside the remote base.
pub const MANIFEST_NAME: &str = ".diffdeploy-manifest";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read remote manifest: {0}")]
    Read(#[source] BackendError),
    #[error("failed to write remote manifest: {0}")]
    Write(#[source] BackendError),
    #[error("remote manifest is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode manifest: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Destination path to hex signature.
///
/// Keys are kept sorted so the encoded form is stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    signatures: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, destination: impl Into<String>, signature: impl Into<String>) {
        self.signatures.insert(destination.into(), signature.into());
    }

    pub fn get(&self, destination: &str) -> Option<&str> {
        self.signatures.get(destination).map(String::as_str)
    }

    pub fn contains(&self, destination: &str) -> bool {
        self.signatures.contains_key(destination)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.signatures.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ManifestError> {
        serde_json::to_vec_pretty(self).map_err(ManifestError::Encode)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ManifestError> {
        serde_json::from_slice(bytes).map_err(ManifestError::Decode)
    }
}

impl FromIterator<(String, String)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            signatures: iter.into_iter().collect(),
        }
    }
}

/// Reads and writes the manifest object through one remote session.
pub struct ManifestStore<'a, B: ?Sized> {
    session: &'a B,
}

impl<'a, B: RemoteBackend + ?Sized> ManifestStore<'a, B> {
    pub fn new(session: &'a B) -> Self {
        Self { session }
    }

    /// Loads the baseline. A missing object means nothing was deployed yet.
    pub async fn fetch(&self) -> Result<Manifest, ManifestError> {
        match self.session.read_file(MANIFEST_NAME).await {
            Ok(bytes) => {
                let manifest = Manifest::from_json(&bytes)?;
                info!(entries = manifest.len(), "loaded remote manifest");
                Ok(manifest)
            }
            Err(BackendError::NotFound(_)) => {
                info!("remote manifest not found, starting from an empty baseline");
                Ok(Manifest::new())
            }
            Err(err) => Err(ManifestError::Read(err)),
        }
    }

    pub async fn persist(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        let bytes = manifest.to_json()?;
        debug!(bytes = bytes.len(), "writing remote manifest");
        self.session
            .write_file(MANIFEST_NAME, bytes)
            .await
            .map_err(ManifestError::Write)?;
        info!(entries = manifest.len(), "saved remote manifest");
        Ok(())
    }
}
