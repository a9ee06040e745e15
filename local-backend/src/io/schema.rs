//! Schema validation for the local backend configuration block.

use anyhow::{Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::{debug, warn};

use super::config::{BackendConfig, RawConfig};

const LOCAL_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/backend/local.schema.json"
));

const LOCAL_KEYS: &[&str] = &["path", "path_out", "backup_path"];

/// Warnings and errors produced by validating a configuration block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Diagnostics {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// JSON Schema plus field rules for one backend type.
#[derive(Debug, Clone)]
pub struct BackendSchema {
    schema: &'static str,
    known_keys: &'static [&'static str],
}

impl Default for BackendSchema {
    fn default() -> Self {
        Self::local()
    }
}

impl BackendSchema {
    /// Schema for the `local` backend block.
    pub fn local() -> Self {
        Self {
            schema: LOCAL_SCHEMA,
            known_keys: LOCAL_KEYS,
        }
    }

    /// Validate a raw block without applying it.
    pub fn validate(&self, raw: &RawConfig) -> Diagnostics {
        let mut diags = Diagnostics::default();
        for key in raw.keys() {
            if !self.known_keys.contains(&key.as_str()) {
                diags.warnings.push(format!("unknown key `{key}` is ignored"));
            }
        }

        let instance = Value::Object(raw.clone());
        if let Err(err) = self.check_schema(&instance) {
            diags.errors.push(err.to_string());
            return diags;
        }

        match BackendConfig::from_raw(raw) {
            Ok(cfg) => {
                if !cfg.path_out.is_empty() && cfg.path_out == cfg.path {
                    diags
                        .warnings
                        .push("path_out equals path and can be omitted".to_string());
                }
            }
            Err(err) => diags.errors.push(format!("{err:#}")),
        }
        debug!(
            warnings = diags.warnings.len(),
            errors = diags.errors.len(),
            "validated backend config"
        );
        diags
    }

    /// Validate and apply a raw block.
    pub fn configure(&self, raw: &RawConfig) -> Result<BackendConfig> {
        let diags = self.validate(raw);
        for warning in &diags.warnings {
            warn!(%warning, "backend config warning");
        }
        if !diags.is_ok() {
            return Err(anyhow!(diags.errors.join("; ")));
        }
        BackendConfig::from_raw(raw)
    }

    fn check_schema(&self, instance: &Value) -> Result<()> {
        let schema: Value =
            serde_json::from_str(self.schema).map_err(|err| anyhow!("parse schema: {err}"))?;
        let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
        if compiled.is_valid(instance) {
            return Ok(());
        }
        let messages = compiled
            .iter_errors(instance)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        Err(anyhow!(
            "backend schema validation failed: {}",
            messages.join("; ")
        ))
    }
}
