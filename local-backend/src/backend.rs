//! Backend facade: configuration and state acquisition.
//!
//! A [`LocalBackend`] either handles every call itself against local files or
//! forwards every call to a delegate backend. The choice is made once at
//! construction; no call mixes the two, so a delegated backend never reads or
//! writes local paths.

use std::sync::{Arc, OnceLock};

use tracing::{debug, info, instrument};

use crate::core::operation::Operation;
use crate::engine::Engine;
use crate::error::BackendError;
use crate::io::backup_state::BackupState;
use crate::io::config::{BackendConfig, RawConfig};
use crate::io::local_state::LocalState;
use crate::io::schema::{BackendSchema, Diagnostics};
use crate::io::state::StateHandle;
use crate::operation::{RefreshOutcome, run_refresh};

/// Provider of configuration handling and state storage.
pub trait Backend {
    /// Check a configuration block without applying it.
    fn validate(&self, config: &RawConfig) -> Diagnostics;

    /// Apply a configuration block.
    fn configure(&self, config: &RawConfig) -> Result<(), BackendError>;

    /// Acquire a fresh, loaded state handle.
    fn state(&self) -> Result<Box<dyn StateHandle>, BackendError>;
}

/// Backend that also runs operations itself.
pub trait EnhancedBackend: Backend {
    fn operation<E: Engine>(
        &self,
        engine: &E,
        op: &Operation,
    ) -> Result<RefreshOutcome, BackendError>;
}

enum Mode {
    Local {
        schema: BackendSchema,
        /// Set at most once by `configure`.
        config: OnceLock<BackendConfig>,
    },
    Delegated(Arc<dyn Backend>),
}

/// Enhanced backend performing operations locally.
pub struct LocalBackend {
    mode: Mode,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBackend {
    /// Unconfigured local backend; uses [`BackendConfig::default`] until configured.
    pub fn new() -> Self {
        Self {
            mode: Mode::Local {
                schema: BackendSchema::local(),
                config: OnceLock::new(),
            },
        }
    }

    /// Local backend with an already-applied configuration.
    pub fn with_config(config: BackendConfig) -> Self {
        Self {
            mode: Mode::Local {
                schema: BackendSchema::local(),
                config: OnceLock::from(config),
            },
        }
    }

    /// Local operations on top of another backend's configuration and state.
    pub fn delegating(delegate: Arc<dyn Backend>) -> Self {
        Self {
            mode: Mode::Delegated(delegate),
        }
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self.mode, Mode::Delegated(_))
    }

    /// Configuration in effect, or `None` when delegated.
    pub fn config(&self) -> Option<BackendConfig> {
        match &self.mode {
            Mode::Local { config, .. } => Some(config.get().cloned().unwrap_or_default()),
            Mode::Delegated(_) => None,
        }
    }
}

impl Backend for LocalBackend {
    fn validate(&self, config: &RawConfig) -> Diagnostics {
        match &self.mode {
            Mode::Local { schema, .. } => schema.validate(config),
            Mode::Delegated(delegate) => delegate.validate(config),
        }
    }

    #[instrument(skip_all, fields(delegated = self.is_delegated()))]
    fn configure(&self, config: &RawConfig) -> Result<(), BackendError> {
        let (schema, slot) = match &self.mode {
            Mode::Local {
                schema,
                config: slot,
            } => (schema, slot),
            Mode::Delegated(delegate) => return delegate.configure(config),
        };
        let applied = schema
            .configure(config)
            .map_err(|err| BackendError::Configuration(format!("{err:#}")))?;
        info!(
            path = %applied.path,
            path_out = %applied.output_path().display(),
            backup = !applied.backup_path.is_empty(),
            "local backend configured"
        );
        slot.set(applied)
            .map_err(|_| BackendError::Configuration("backend already configured".to_string()))
    }

    #[instrument(skip_all, fields(delegated = self.is_delegated()))]
    fn state(&self) -> Result<Box<dyn StateHandle>, BackendError> {
        match &self.mode {
            Mode::Local { config, .. } => match config.get() {
                Some(cfg) => acquire_local_state(cfg),
                None => acquire_local_state(&BackendConfig::default()),
            },
            Mode::Delegated(delegate) => delegate.state(),
        }
    }
}

impl EnhancedBackend for LocalBackend {
    fn operation<E: Engine>(
        &self,
        engine: &E,
        op: &Operation,
    ) -> Result<RefreshOutcome, BackendError> {
        run_refresh(self, engine, op)
    }
}

/// Build a loaded state handle for `cfg`.
///
/// The handle is refreshed once before it is returned; a load failure is fatal
/// and no handle is handed out. Backup writability is only discovered on the
/// first write.
pub fn acquire_local_state(cfg: &BackendConfig) -> Result<Box<dyn StateHandle>, BackendError> {
    let mut local = LocalState::new(cfg.state_path(), cfg.output_path());
    local.refresh_state().map_err(BackendError::StateLoad)?;
    debug!(
        path = %local.path().display(),
        path_out = %local.path_out().display(),
        serial = ?local.state().map(|s| s.serial),
        "local state loaded"
    );

    match cfg.backup_path() {
        Some(backup) => Ok(Box::new(BackupState::new(local, backup))),
        None => Ok(Box::new(local)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::Snapshot;
    use crate::io::local_state::{read_snapshot_file, write_snapshot_file};
    use serde_json::{Value, json};
    use std::fs;

    fn raw(value: Value) -> RawConfig {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn config_in(dir: &std::path::Path, backup: bool) -> BackendConfig {
        BackendConfig {
            path: dir.join("s.json").display().to_string(),
            path_out: String::new(),
            backup_path: if backup {
                dir.join("s.json.bak").display().to_string()
            } else {
                String::new()
            },
        }
    }

    #[test]
    fn configure_applies_config_once() {
        let backend = LocalBackend::new();
        backend
            .configure(&raw(json!({"path": "s.json", "backup_path": "s.json.bak"})))
            .expect("configure");
        let cfg = backend.config().expect("local config");
        assert_eq!(cfg.path, "s.json");
        assert_eq!(cfg.backup_path, "s.json.bak");

        let err = backend.configure(&raw(json!({"path": "t.json"}))).unwrap_err();
        assert!(matches!(err, BackendError::Configuration(_)));
        assert!(err.to_string().contains("already configured"));
    }

    #[test]
    fn configure_rejects_malformed_block() {
        let backend = LocalBackend::new();
        let err = backend.configure(&raw(json!({"path": 7}))).unwrap_err();
        assert!(matches!(err, BackendError::Configuration(_)));
        assert_eq!(backend.config(), Some(BackendConfig::default()));
    }

    #[test]
    fn acquire_without_backup_returns_plain_handle() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = config_in(temp.path(), false);
        let mut state = acquire_local_state(&cfg).expect("state");

        state.write_state(Snapshot::default()).expect("write");
        state.persist_state().expect("persist");
        assert!(temp.path().join("s.json").exists());
        assert!(!temp.path().join("s.json.bak").exists());
    }

    #[test]
    fn acquire_fails_on_corrupt_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = config_in(temp.path(), true);
        fs::write(temp.path().join("s.json"), "not json").expect("write");

        let err = acquire_local_state(&cfg).err().expect("load error");
        assert!(matches!(err, BackendError::StateLoad(_)));
        assert!(err.to_string().starts_with("error reading local state"));
    }

    #[test]
    fn acquire_with_unwritable_backup_fails_late() {
        let temp = tempfile::tempdir().expect("tempdir");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "").expect("blocker");
        let mut cfg = config_in(temp.path(), false);
        cfg.backup_path = blocker.join("s.json.bak").display().to_string();
        let seeded = Snapshot {
            serial: 3,
            ..Snapshot::default()
        };
        write_snapshot_file(&cfg.state_path(), &seeded).expect("seed");

        let mut state = acquire_local_state(&cfg).expect("acquire succeeds");
        assert!(state.write_state(Snapshot::default()).is_err());
        assert_eq!(
            read_snapshot_file(&cfg.state_path()).expect("read"),
            Some(seeded)
        );
    }
}
