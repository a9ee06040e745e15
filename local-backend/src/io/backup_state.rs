//! Backup decorator for state handles.
//!
//! Wraps any [`StateHandle`] and copies the snapshot it currently holds to a
//! backup file before the first overwrite. Refresh, read and persist pass
//! straight through to the wrapped handle.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::local_state::write_snapshot_file;
use super::state::StateHandle;
use crate::core::snapshot::Snapshot;

#[derive(Debug)]
pub struct BackupState<S> {
    real: S,
    path: PathBuf,
    /// Set once the pre-write snapshot has been handled for this handle.
    done: bool,
}

impl<S: StateHandle> BackupState<S> {
    pub fn new(real: S, path: impl Into<PathBuf>) -> Self {
        Self {
            real,
            path: path.into(),
            done: false,
        }
    }

    fn backup(&mut self) -> Result<()> {
        if self.real.state().is_none() {
            self.real
                .refresh_state()
                .context("refresh state before backup")?;
        }
        match self.real.state() {
            Some(snapshot) => {
                write_snapshot_file(&self.path, snapshot)
                    .with_context(|| format!("back up state to {}", self.path.display()))?;
                info!(path = %self.path.display(), serial = snapshot.serial, "state backed up");
            }
            None => debug!(path = %self.path.display(), "no prior state, skipping backup"),
        }
        self.done = true;
        Ok(())
    }
}

impl<S: StateHandle> StateHandle for BackupState<S> {
    fn refresh_state(&mut self) -> Result<()> {
        self.real.refresh_state()
    }

    fn state(&self) -> Option<&Snapshot> {
        self.real.state()
    }

    fn write_state(&mut self, snapshot: Snapshot) -> Result<()> {
        if !self.done {
            // The inner handle is left untouched when the backup fails.
            self.backup()?;
        }
        self.real.write_state(snapshot)
    }

    fn persist_state(&mut self) -> Result<()> {
        self.real.persist_state()
    }
}
