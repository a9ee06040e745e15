//! Local backend configuration.
//!
//! Configuration blocks arrive as raw key/value maps (typically the
//! `[backend.local]` table of a TOML file) and are applied into a
//! [`BackendConfig`] once they pass schema validation.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// State path used when a configuration leaves `path` unset.
pub const DEFAULT_STATE_PATH: &str = "terraform.tfstate";

/// Unvalidated configuration block as handed to `validate`/`configure`.
pub type RawConfig = Map<String, Value>;

/// Paths the local backend reads, writes and backs up state at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// Path the state is read from.
    pub path: String,

    /// Path the state is written to. Empty means `path`.
    pub path_out: String,

    /// Backup written before overwriting. Empty disables backups.
    pub backup_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_STATE_PATH.to_string(),
            path_out: String::new(),
            backup_path: String::new(),
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(anyhow!("path must be non-empty"));
        }
        if let Some(backup) = self.backup_path() {
            if backup.as_path() == Path::new(&self.path) || backup == self.output_path() {
                return Err(anyhow!(
                    "backup_path must differ from path and path_out ({})",
                    backup.display()
                ));
            }
        }
        Ok(())
    }

    /// Path the state is read from.
    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    /// Path writes land on: `path_out`, falling back to `path`.
    pub fn output_path(&self) -> PathBuf {
        if self.path_out.is_empty() {
            PathBuf::from(&self.path)
        } else {
            PathBuf::from(&self.path_out)
        }
    }

    /// Backup path, or `None` when backups are disabled.
    pub fn backup_path(&self) -> Option<PathBuf> {
        if self.backup_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.backup_path))
        }
    }

    /// Deserialize a raw block; absent keys take their defaults.
    pub fn from_raw(raw: &RawConfig) -> Result<Self> {
        let cfg: BackendConfig = serde_json::from_value(Value::Object(raw.clone()))
            .context("deserialize backend config")?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Load the `[backend.local]` table from a TOML file.
///
/// A missing file or a file without that table yields an empty block.
pub fn load_backend_block(path: &Path) -> Result<RawConfig> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "backend config missing, using empty block");
            return Ok(RawConfig::new());
        }
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    let doc: toml::Table =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    let Some(block) = doc
        .get("backend")
        .and_then(|backend| backend.get("local"))
        .cloned()
    else {
        return Ok(RawConfig::new());
    };
    let value = serde_json::to_value(block)
        .with_context(|| format!("convert backend.local in {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!(
            "backend.local in {} must be a table, got {}",
            path.display(),
            other
        )),
    }
}
