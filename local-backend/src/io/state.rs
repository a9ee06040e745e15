//! State handle abstraction.
//!
//! The [`StateHandle`] trait decouples state acquisition and the operation
//! executor from where a snapshot actually lives. [`LocalState`] reads and
//! writes a file on disk, [`BackupState`] decorates any handle with a
//! snapshot-before-overwrite step, and delegate backends return their own
//! implementations.
//!
//! [`LocalState`]: super::local_state::LocalState
//! [`BackupState`]: super::backup_state::BackupState

use anyhow::Result;

use crate::core::snapshot::Snapshot;

/// Storage-backed state with a two-phase commit: `write_state` updates the
/// in-memory snapshot, `persist_state` makes it durable.
pub trait StateHandle {
    /// Reload the in-memory snapshot from storage.
    fn refresh_state(&mut self) -> Result<()>;

    /// Current in-memory snapshot (`None` when storage holds no state yet).
    fn state(&self) -> Option<&Snapshot>;

    /// Replace the in-memory snapshot.
    fn write_state(&mut self, snapshot: Snapshot) -> Result<()>;

    /// Commit the in-memory snapshot to durable storage.
    fn persist_state(&mut self) -> Result<()>;
}

impl<S: StateHandle + ?Sized> StateHandle for Box<S> {
    fn refresh_state(&mut self) -> Result<()> {
        (**self).refresh_state()
    }

    fn state(&self) -> Option<&Snapshot> {
        (**self).state()
    }

    fn write_state(&mut self, snapshot: Snapshot) -> Result<()> {
        (**self).write_state(snapshot)
    }

    fn persist_state(&mut self) -> Result<()> {
        (**self).persist_state()
    }
}
