use std::fmt;

use thiserror::Error;
use tracing::{error, info};

use super::backend::{BackendError, Credentials, RemoteBackend, RemoteConnector};
use super::entry::Entry;
use super::executor::{ApplyError, ApplyReport, apply};
use super::manifest::{Manifest, ManifestError, ManifestStore};
use super::planner::{Operation, PlanOptions, plan};
use super::signature::{DEFAULT_HASH_CONCURRENCY, SignatureError, build_manifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Authenticating,
    FetchingBaseline,
    Diffing,
    Applying,
    Persisting,
    Done,
    /// Terminal state of a run that returned an error.
    Aborted,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Authenticating => "authenticating",
            RunStage::FetchingBaseline => "fetching baseline",
            RunStage::Diffing => "diffing",
            RunStage::Applying => "applying",
            RunStage::Persisting => "persisting",
            RunStage::Done => "done",
            RunStage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Why a run was aborted. The remote baseline is never rewritten after any of
/// these.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to open remote session: {0}")]
    Connect(#[source] BackendError),
    #[error("cannot enter remote base {path}: {source}")]
    RemoteBase {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Baseline(ManifestError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error(transparent)]
    Persist(ManifestError),
}

impl DeployError {
    /// Stage the run was in when it aborted. The run itself then moves to
    /// [`RunStage::Aborted`].
    pub fn stage(&self) -> RunStage {
        match self {
            DeployError::Connect(_) | DeployError::RemoteBase { .. } => RunStage::Authenticating,
            DeployError::Signature(_) | DeployError::Baseline(_) => RunStage::FetchingBaseline,
            DeployError::Apply(_) => RunStage::Applying,
            DeployError::Persist(_) => RunStage::Persisting,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub remote_base: String,
    pub disable_permissions: bool,
    pub hash_concurrency: usize,
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            remote_base: ".".to_string(),
            disable_permissions: false,
            hash_concurrency: DEFAULT_HASH_CONCURRENCY,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeployOutcome {
    /// `Done` after a full run, `Diffing` when only planning was requested.
    pub stage: RunStage,
    pub plan: Vec<Operation>,
    pub report: ApplyReport,
    pub manifest: Manifest,
}

/// One deployment against one remote target.
pub struct Deployment<C> {
    connector: C,
    host: String,
    credentials: Credentials,
    options: RunOptions,
}

impl<C: RemoteConnector> Deployment<C> {
    pub fn new(
        connector: C,
        host: impl Into<String>,
        credentials: Credentials,
        options: RunOptions,
    ) -> Self {
        Self {
            connector,
            host: host.into(),
            credentials,
            options,
        }
    }

    pub async fn run(&self, entries: &[Entry]) -> Result<DeployOutcome, DeployError> {
        let result = self.run_stages(entries).await;
        if let Err(err) = &result {
            error!(failed_in = %err.stage(), error = %err, "deploy failed");
            enter(RunStage::Aborted);
        }
        result
    }

    async fn run_stages(&self, entries: &[Entry]) -> Result<DeployOutcome, DeployError> {
        enter(RunStage::Authenticating);
        info!(host = %self.host, "connecting");
        let mut writer = self.open_session().await?;
        let mut reader = self.open_session().await?;
        self.enter_base(&mut writer).await?;
        self.enter_base(&mut reader).await?;

        enter(RunStage::FetchingBaseline);
        let baseline = ManifestStore::new(&reader);
        let (local, remote) = tokio::try_join!(
            async {
                build_manifest(entries, self.options.hash_concurrency)
                    .await
                    .map_err(DeployError::from)
            },
            async { baseline.fetch().await.map_err(DeployError::Baseline) },
        )?;

        enter(RunStage::Diffing);
        let operations = plan(
            &local,
            &remote,
            entries,
            PlanOptions {
                disable_permissions: self.options.disable_permissions,
            },
        );
        info!(operations = operations.len(), "plan ready");

        if self.options.dry_run {
            for operation in &operations {
                info!(%operation, "planned");
            }
            return Ok(DeployOutcome {
                stage: RunStage::Diffing,
                plan: operations,
                report: ApplyReport::default(),
                manifest: local,
            });
        }

        enter(RunStage::Applying);
        let report = apply(&operations, &writer).await?;

        enter(RunStage::Persisting);
        ManifestStore::new(&writer)
            .persist(&local)
            .await
            .map_err(DeployError::Persist)?;

        enter(RunStage::Done);
        Ok(DeployOutcome {
            stage: RunStage::Done,
            plan: operations,
            report,
            manifest: local,
        })
    }

    async fn open_session(&self) -> Result<C::Session, DeployError> {
        self.connector
            .connect(&self.host, &self.credentials)
            .await
            .map_err(DeployError::Connect)
    }

    async fn enter_base(&self, session: &mut C::Session) -> Result<(), DeployError> {
        let path = &self.options.remote_base;
        session
            .change_directory(path)
            .await
            .map_err(|source| DeployError::RemoteBase {
                path: path.clone(),
                source,
            })
    }
}

fn enter(stage: RunStage) {
    info!(stage = %stage, "deploy stage");
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
