//! State handle bound to a local file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tempfile::NamedTempFile;
use tracing::debug;

use super::state::StateHandle;
use crate::core::snapshot::{SNAPSHOT_FORMAT_VERSION, Snapshot};

/// Snapshot stored as JSON at `path`, persisted to `path_out`.
#[derive(Debug, Clone)]
pub struct LocalState {
    path: PathBuf,
    path_out: PathBuf,
    /// In-memory snapshot, ahead of disk after `write_state`.
    state: Option<Snapshot>,
    /// Last snapshot read from or persisted to disk; the serial baseline.
    read_state: Option<Snapshot>,
}

impl LocalState {
    pub fn new(path: impl Into<PathBuf>, path_out: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            path_out: path_out.into(),
            state: None,
            read_state: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_out(&self) -> &Path {
        &self.path_out
    }
}

impl StateHandle for LocalState {
    fn refresh_state(&mut self) -> Result<()> {
        let loaded = read_snapshot_file(&self.path)?;
        self.state = loaded.clone();
        self.read_state = loaded;
        Ok(())
    }

    fn state(&self) -> Option<&Snapshot> {
        self.state.as_ref()
    }

    fn write_state(&mut self, mut snapshot: Snapshot) -> Result<()> {
        snapshot.increment_serial_maybe(self.read_state.as_ref())?;
        debug!(
            serial = snapshot.serial,
            resources = snapshot.resources.len(),
            "state written in memory"
        );
        self.state = Some(snapshot);
        Ok(())
    }

    fn persist_state(&mut self) -> Result<()> {
        let Some(snapshot) = &self.state else {
            debug!(path = %self.path_out.display(), "no state to persist");
            return Ok(());
        };
        write_snapshot_file(&self.path_out, snapshot)?;
        self.read_state = self.state.clone();
        Ok(())
    }
}

/// Read a snapshot file. A missing or empty file holds no state.
pub fn read_snapshot_file(path: &Path) -> Result<Option<Snapshot>> {
    debug!(path = %path.display(), "reading state");
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "state file missing, starting empty");
            return Ok(None);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("read state {}", path.display()));
        }
    };
    if contents.trim().is_empty() {
        return Ok(None);
    }
    let snapshot: Snapshot = serde_json::from_str(&contents)
        .with_context(|| format!("parse state {}", path.display()))?;
    if snapshot.version > SNAPSHOT_FORMAT_VERSION {
        return Err(anyhow!(
            "state {} has format version {}, newer than supported version {}",
            path.display(),
            snapshot.version,
            SNAPSHOT_FORMAT_VERSION
        ));
    }
    debug!(
        serial = snapshot.serial,
        resources = snapshot.resources.len(),
        "state loaded"
    );
    Ok(Some(snapshot))
}

/// Atomically write a snapshot file (uniquely named temp file + rename).
pub fn write_snapshot_file(path: &Path, snapshot: &Snapshot) -> Result<()> {
    debug!(path = %path.display(), serial = snapshot.serial, "writing state");
    let mut buf = serde_json::to_string_pretty(snapshot).context("serialize state")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("create directory {}", parent.display()))?;
    // Dropping the temp file on any error below removes it.
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp state in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write temp state {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("replace state {}", path.display()))?;
    Ok(())
}
