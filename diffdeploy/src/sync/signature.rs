use std::future::Future;
use std::io;
use std::path::PathBuf;

use futures_util::{StreamExt, TryStreamExt, stream};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::info;

use super::entry::{Entry, EntryKind};
use super::manifest::Manifest;

/// Hashes in flight at once when no other limit is configured.
pub const DEFAULT_HASH_CONCURRENCY: usize = 100;

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Digest of the octal permission bits, followed by the contents for files.
pub async fn signature_for(entry: &Entry) -> Result<String, SignatureError> {
    let mut hasher = Sha256::new();
    hasher.update(format!("{:o}", entry.permission_bits).as_bytes());

    if entry.kind == EntryKind::File {
        let read_err = |source| SignatureError::Read {
            path: entry.source.clone(),
            source,
        };
        let mut file = tokio::fs::File::open(&entry.source)
            .await
            .map_err(read_err)?;
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = file.read(&mut buf).await.map_err(read_err)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Computes the local manifest with at most `concurrency` hashes in flight.
/// The first unreadable file fails the whole batch.
pub async fn build_manifest(entries: &[Entry], concurrency: usize) -> Result<Manifest, SignatureError> {
    info!(entries = entries.len(), "hashing local files");
    let manifest = collect_signatures(entries, concurrency, signature_for).await?;
    info!("done hashing local files");
    Ok(manifest)
}

async fn collect_signatures<'a, F, Fut>(
    entries: &'a [Entry],
    concurrency: usize,
    sign: F,
) -> Result<Manifest, SignatureError>
where
    F: Fn(&'a Entry) -> Fut,
    Fut: Future<Output = Result<String, SignatureError>>,
{
    let signatures: Vec<(String, String)> = stream::iter(entries)
        .map(|entry| {
            let pending = sign(entry);
            async move { Ok::<_, SignatureError>((entry.destination.clone(), pending.await?)) }
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;
    Ok(signatures.into_iter().collect())
}
