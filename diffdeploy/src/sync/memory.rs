//! In-memory remote store used by the engine tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use diffdeploy_remote::resolve_remote_path;
use tokio::sync::Notify;

use super::backend::{BackendError, Credentials, RemoteBackend, RemoteConnector};

pub const PASSWORD: &str = "secret";

#[derive(Default)]
struct State {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    modes: BTreeMap<String, u32>,
    calls: Vec<String>,
    failures: HashMap<(String, String), BackendError>,
    chmod_unsupported: bool,
    read_gate: Option<Arc<Notify>>,
}

/// Shared remote tree. Every session handed out sees the same state and
/// records its calls as `"<op> <absolute path>"`.
#[derive(Clone)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        let mut state = State::default();
        state.dirs.insert("/".to_string());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn session(&self) -> MemorySession {
        MemorySession {
            state: Arc::clone(&self.state),
            cwd: "/".to_string(),
        }
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.lock().dirs.insert(resolve_remote_path("/", path));
        self
    }

    pub fn put_file(&self, path: &str, contents: &[u8]) {
        self.lock()
            .files
            .insert(resolve_remote_path("/", path), contents.to_vec());
    }

    pub fn fail_on(&self, op: &str, path: &str, err: BackendError) {
        self.lock()
            .failures
            .insert((op.to_string(), resolve_remote_path("/", path)), err);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Holds every `read_file` after it is recorded until the returned
    /// handle is notified once per read.
    pub fn gate_reads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().read_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn disable_chmod(&self) {
        self.lock().chmod_unsupported = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.lock().dirs.contains(path)
    }

    pub fn mode(&self, path: &str) -> Option<u32> {
        self.lock().modes.get(path).copied()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl RemoteConnector for MemoryRemote {
    type Session = MemorySession;

    async fn connect(
        &self,
        _host: &str,
        credentials: &Credentials,
    ) -> Result<MemorySession, BackendError> {
        self.lock().calls.push("connect".to_string());
        if credentials.password != PASSWORD {
            return Err(BackendError::Auth("530 login incorrect".into()));
        }
        Ok(self.session())
    }
}

pub struct MemorySession {
    state: Arc<Mutex<State>>,
    cwd: String,
}

impl MemorySession {
    /// Records the call and returns the locked state, or the injected failure.
    fn begin(&self, op: &str, path: &str) -> Result<(MutexGuard<'_, State>, String), BackendError> {
        let absolute = resolve_remote_path(&self.cwd, path);
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{op} {absolute}"));
        if let Some(err) = state.failures.get(&(op.to_string(), absolute.clone())) {
            return Err(err.clone());
        }
        Ok((state, absolute))
    }
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

fn store_file(state: &mut State, path: String, contents: Vec<u8>) -> Result<(), BackendError> {
    if !state.dirs.contains(&parent_of(&path)) {
        return Err(BackendError::Failed(format!("parent of {path} does not exist")));
    }
    if state.dirs.contains(&path) {
        return Err(BackendError::Failed(format!("{path} is a directory")));
    }
    state.files.insert(path, contents);
    Ok(())
}

#[async_trait]
impl RemoteBackend for MemorySession {
    async fn change_directory(&mut self, path: &str) -> Result<(), BackendError> {
        let target = {
            let (state, absolute) = self.begin("cd", path)?;
            if !state.dirs.contains(&absolute) {
                return Err(BackendError::NotFound(absolute));
            }
            absolute
        };
        self.cwd = target;
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, BackendError> {
        let (absolute, gate) = {
            let (state, absolute) = self.begin("read", path)?;
            (absolute, state.read_gate.clone())
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let state = self.state.lock().unwrap();
        state
            .files
            .get(&absolute)
            .cloned()
            .ok_or(BackendError::NotFound(absolute))
    }

    async fn write_file(&self, path: &str, contents: Vec<u8>) -> Result<(), BackendError> {
        let (mut state, absolute) = self.begin("write", path)?;
        store_file(&mut state, absolute, contents)
    }

    async fn upload_file(&self, path: &str, source: &Path) -> Result<(), BackendError> {
        let contents = tokio::fs::read(source)
            .await
            .map_err(|err| BackendError::Failed(err.to_string()))?;
        let (mut state, absolute) = self.begin("upload", path)?;
        store_file(&mut state, absolute, contents)
    }

    async fn make_directory(&self, path: &str) -> Result<(), BackendError> {
        let (mut state, absolute) = self.begin("mkdir", path)?;
        if state.dirs.contains(&absolute) {
            return Err(BackendError::AlreadyExists(absolute));
        }
        if state.files.contains_key(&absolute) {
            return Err(BackendError::Failed(format!(
                "{absolute} exists and is not a directory"
            )));
        }
        if !state.dirs.contains(&parent_of(&absolute)) {
            return Err(BackendError::Failed(format!(
                "parent of {absolute} does not exist"
            )));
        }
        state.dirs.insert(absolute);
        Ok(())
    }

    async fn set_permissions(&self, path: &str, bits: u32) -> Result<(), BackendError> {
        let (mut state, absolute) = self.begin(&format!("chmod {bits:o}"), path)?;
        if state.chmod_unsupported {
            return Err(BackendError::Unsupported("SITE CHMOD".into()));
        }
        if !state.dirs.contains(&absolute) && !state.files.contains_key(&absolute) {
            return Err(BackendError::NotFound(absolute));
        }
        state.modes.insert(absolute, bits);
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), BackendError> {
        let (mut state, absolute) = self.begin("delete-file", path)?;
        if state.files.remove(&absolute).is_none() {
            return Err(BackendError::NotFound(absolute));
        }
        state.modes.remove(&absolute);
        Ok(())
    }

    async fn delete_directory(&self, path: &str) -> Result<(), BackendError> {
        let (mut state, absolute) = self.begin("delete-dir", path)?;
        if !state.dirs.contains(&absolute) {
            return Err(BackendError::NotFound(absolute));
        }
        let prefix = format!("{absolute}/");
        let occupied = state.files.keys().any(|p| p.starts_with(&prefix))
            || state.dirs.iter().any(|p| p.starts_with(&prefix));
        if occupied {
            return Err(BackendError::Failed(format!("{absolute} is not empty")));
        }
        state.dirs.remove(&absolute);
        state.modes.remove(&absolute);
        Ok(())
    }
}
