//! Stage-labelled errors returned by the backend facade and executor.

use std::fmt;

use thiserror::Error;

use crate::core::snapshot::Snapshot;

/// Stage of configuration or an operation at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuring,
    Loading,
    Refreshing,
    BuildingContext,
    Computing,
    Writing,
    Persisting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Configuring => "configuring",
            Stage::Loading => "loading",
            Stage::Refreshing => "refreshing",
            Stage::BuildingContext => "building context",
            Stage::Computing => "computing",
            Stage::Writing => "writing",
            Stage::Persisting => "persisting",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// Configuration block is malformed or cannot be applied.
    #[error("invalid backend configuration: {0}")]
    Configuration(String),

    /// Initial refresh during state acquisition failed.
    #[error("error reading local state: {0:#}")]
    StateLoad(#[source] anyhow::Error),

    /// Re-sync right before the operation failed.
    #[error("error loading state: {0:#}")]
    Refresh(#[source] anyhow::Error),

    /// The engine rejected the operation parameters.
    #[error(transparent)]
    ContextBuild(anyhow::Error),

    /// The refresh computation failed; storage was not touched.
    #[error("error refreshing state: {0:#}")]
    Computation(#[source] anyhow::Error),

    /// Writing the new snapshot into the handle failed.
    #[error("error writing state: {0:#}")]
    Write(#[source] anyhow::Error),

    /// The snapshot was written into the handle but not saved durably.
    #[error("error saving state: {source:#}")]
    Persist {
        #[source]
        source: anyhow::Error,
        /// The computed snapshot that did not reach storage.
        unsaved: Box<Snapshot>,
    },
}

impl BackendError {
    pub fn stage(&self) -> Stage {
        match self {
            BackendError::Configuration(_) => Stage::Configuring,
            BackendError::StateLoad(_) => Stage::Loading,
            BackendError::Refresh(_) => Stage::Refreshing,
            BackendError::ContextBuild(_) => Stage::BuildingContext,
            BackendError::Computation(_) => Stage::Computing,
            BackendError::Write(_) => Stage::Writing,
            BackendError::Persist { .. } => Stage::Persisting,
        }
    }

    /// Snapshot held in memory but not persisted, if this is a persist failure.
    pub fn unsaved_snapshot(&self) -> Option<&Snapshot> {
        match self {
            BackendError::Persist { unsaved, .. } => Some(unsaved.as_ref()),
            _ => None,
        }
    }
}
