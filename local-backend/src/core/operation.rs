//! Operation requests and the context options derived from them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

use super::snapshot::Snapshot;

/// Parallelism used by the engine when an operation leaves it at zero.
pub const DEFAULT_PARALLELISM: usize = 10;

/// One evaluation request against a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Evaluate with destroy semantics.
    pub destroy: bool,
    /// Root module directory.
    pub module: PathBuf,
    /// Upper bound on concurrent graph operations (0 = engine default).
    pub parallelism: usize,
    /// Resource addresses to restrict the walk to (empty = everything).
    pub targets: Vec<String>,
    /// Input variable values.
    pub variables: BTreeMap<String, Value>,
}

impl Default for Operation {
    fn default() -> Self {
        Self {
            destroy: false,
            module: PathBuf::from("."),
            parallelism: 0,
            targets: Vec::new(),
            variables: BTreeMap::new(),
        }
    }
}

/// Inputs for constructing an execution context.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    pub destroy: bool,
    pub module: PathBuf,
    pub parallelism: usize,
    pub targets: Vec<String>,
    pub variables: BTreeMap<String, Value>,
    /// Snapshot read from the state handle right before the context is built.
    pub state: Option<Snapshot>,
}

impl ContextOptions {
    /// Straight field mapping; the state is attached later by the executor.
    pub fn from_operation(op: &Operation) -> Self {
        Self {
            destroy: op.destroy,
            module: op.module.clone(),
            parallelism: op.parallelism,
            targets: op.targets.clone(),
            variables: op.variables.clone(),
            state: None,
        }
    }

    /// Parallelism with the zero value resolved to the engine default.
    pub fn effective_parallelism(&self) -> usize {
        if self.parallelism == 0 {
            DEFAULT_PARALLELISM
        } else {
            self.parallelism
        }
    }
}
