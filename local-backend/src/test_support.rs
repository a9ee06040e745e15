//! Test-only fakes and fixtures for the backend and executor.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Result, anyhow};
use serde_json::json;
use tempfile::TempDir;

use crate::backend::Backend;
use crate::core::operation::ContextOptions;
use crate::core::snapshot::Snapshot;
use crate::engine::{Context, Engine};
use crate::error::BackendError;
use crate::io::config::{BackendConfig, RawConfig};
use crate::io::local_state::{read_snapshot_file, write_snapshot_file};
use crate::io::schema::Diagnostics;
use crate::io::state::StateHandle;

/// Observable call on a fake handle or engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Refresh,
    Read,
    Write,
    Persist,
    NewContext,
    Compute,
}

/// Shared, ordered record of calls across fakes.
pub type CallLog = Rc<RefCell<Vec<Call>>>;

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Deterministic snapshot with one resource per `(address, id)` pair.
pub fn snapshot(serial: u64, resources: &[(&str, &str)]) -> Snapshot {
    let mut snapshot = Snapshot {
        serial,
        lineage: "test-lineage".to_string(),
        ..Snapshot::default()
    };
    for (address, id) in resources {
        snapshot
            .resources
            .insert(address.to_string(), json!({ "id": id }));
    }
    snapshot
}

/// Which calls a [`RecordingState`] should fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailPlan {
    /// Fail the n-th refresh (1-indexed).
    pub refresh_at: Option<usize>,
    pub write: bool,
    pub persist: bool,
}

/// In-memory "storage" shared between a fake backend and its handles.
pub type FakeStorage = Rc<RefCell<Option<Snapshot>>>;

/// State handle that records every call and keeps storage in memory.
pub struct RecordingState {
    log: CallLog,
    storage: FakeStorage,
    fail: FailPlan,
    refreshes: usize,
    state: Option<Snapshot>,
}

impl RecordingState {
    pub fn new(log: CallLog, storage: FakeStorage, fail: FailPlan) -> Self {
        Self {
            log,
            storage,
            fail,
            refreshes: 0,
            state: None,
        }
    }
}

impl StateHandle for RecordingState {
    fn refresh_state(&mut self) -> Result<()> {
        self.log.borrow_mut().push(Call::Refresh);
        self.refreshes += 1;
        if self.fail.refresh_at == Some(self.refreshes) {
            return Err(anyhow!("storage unreadable"));
        }
        self.state = self.storage.borrow().clone();
        Ok(())
    }

    fn state(&self) -> Option<&Snapshot> {
        self.log.borrow_mut().push(Call::Read);
        self.state.as_ref()
    }

    fn write_state(&mut self, snapshot: Snapshot) -> Result<()> {
        self.log.borrow_mut().push(Call::Write);
        if self.fail.write {
            return Err(anyhow!("handle rejected snapshot"));
        }
        self.state = Some(snapshot);
        Ok(())
    }

    fn persist_state(&mut self) -> Result<()> {
        self.log.borrow_mut().push(Call::Persist);
        if self.fail.persist {
            return Err(anyhow!("disk full"));
        }
        *self.storage.borrow_mut() = self.state.clone();
        Ok(())
    }
}

/// Delegate backend backed by [`RecordingState`] handles.
///
/// Acquisition refreshes the handle once, like the local backend does.
pub struct FakeBackend {
    pub log: CallLog,
    pub storage: FakeStorage,
    pub fail: FailPlan,
    pub diagnostics: Diagnostics,
    /// Names of facade calls received (`validate`, `configure`, `state`).
    pub received: RefCell<Vec<&'static str>>,
    /// Blocks passed to `configure`.
    pub configured: RefCell<Vec<RawConfig>>,
}

impl FakeBackend {
    pub fn new(log: CallLog, initial: Option<Snapshot>) -> Self {
        Self {
            log,
            storage: Rc::new(RefCell::new(initial)),
            fail: FailPlan::default(),
            diagnostics: Diagnostics::default(),
            received: RefCell::new(Vec::new()),
            configured: RefCell::new(Vec::new()),
        }
    }

    pub fn with_failures(mut self, fail: FailPlan) -> Self {
        self.fail = fail;
        self
    }

    pub fn stored(&self) -> Option<Snapshot> {
        self.storage.borrow().clone()
    }
}

impl Backend for FakeBackend {
    fn validate(&self, _config: &RawConfig) -> Diagnostics {
        self.received.borrow_mut().push("validate");
        self.diagnostics.clone()
    }

    fn configure(&self, config: &RawConfig) -> Result<(), BackendError> {
        self.received.borrow_mut().push("configure");
        self.configured.borrow_mut().push(config.clone());
        Ok(())
    }

    fn state(&self) -> Result<Box<dyn StateHandle>, BackendError> {
        self.received.borrow_mut().push("state");
        let mut state = RecordingState::new(self.log.clone(), self.storage.clone(), self.fail);
        state.refresh_state().map_err(BackendError::StateLoad)?;
        Ok(Box::new(state))
    }
}

/// What a [`ScriptedEngine`] does when asked for a context and a refresh.
#[derive(Debug, Clone)]
pub enum Script {
    Refresh(Snapshot),
    RejectContext(String),
    FailRefresh(String),
}

/// Engine returning a predetermined outcome and recording its inputs.
pub struct ScriptedEngine {
    log: CallLog,
    script: Script,
    /// Options passed to every `new_context` call.
    pub seen: RefCell<Vec<ContextOptions>>,
}

impl ScriptedEngine {
    pub fn new(log: CallLog, script: Script) -> Self {
        Self {
            log,
            script,
            seen: RefCell::new(Vec::new()),
        }
    }
}

pub struct ScriptedContext {
    log: CallLog,
    script: Script,
}

impl Engine for ScriptedEngine {
    type Context = ScriptedContext;

    fn new_context(&self, opts: ContextOptions) -> Result<ScriptedContext> {
        self.log.borrow_mut().push(Call::NewContext);
        self.seen.borrow_mut().push(opts);
        if let Script::RejectContext(msg) = &self.script {
            return Err(anyhow!("{msg}"));
        }
        Ok(ScriptedContext {
            log: self.log.clone(),
            script: self.script.clone(),
        })
    }
}

impl Context for ScriptedContext {
    fn refresh(&mut self) -> Result<Snapshot> {
        self.log.borrow_mut().push(Call::Compute);
        match &self.script {
            Script::Refresh(snapshot) => Ok(snapshot.clone()),
            Script::FailRefresh(msg) => Err(anyhow!("{msg}")),
            Script::RejectContext(msg) => Err(anyhow!("unreachable context: {msg}")),
        }
    }
}

/// Temporary directory holding `s.json` and, optionally, `s.json.bak`.
pub struct TempState {
    dir: TempDir,
}

impl TempState {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn state_path(&self) -> PathBuf {
        self.path().join("s.json")
    }

    pub fn backup_path(&self) -> PathBuf {
        self.path().join("s.json.bak")
    }

    /// Config reading `s.json`, backing up to `s.json.bak` when `backup` is set.
    pub fn config(&self, backup: bool) -> BackendConfig {
        BackendConfig {
            path: self.state_path().display().to_string(),
            path_out: String::new(),
            backup_path: if backup {
                self.backup_path().display().to_string()
            } else {
                String::new()
            },
        }
    }

    pub fn seed(&self, snapshot: &Snapshot) -> Result<()> {
        write_snapshot_file(&self.state_path(), snapshot)
    }

    pub fn read(&self) -> Result<Option<Snapshot>> {
        read_snapshot_file(&self.state_path())
    }

    pub fn read_backup(&self) -> Result<Option<Snapshot>> {
        read_snapshot_file(&self.backup_path())
    }
}
