//! Execution engine abstraction.
//!
//! The [`Engine`] trait decouples the operation executor from the planning
//! engine that actually walks the resource graph. Tests use scripted engines
//! that return predetermined snapshots without touching real infrastructure.

use anyhow::Result;

use crate::core::operation::ContextOptions;
use crate::core::snapshot::Snapshot;

/// Builds execution contexts from operation parameters.
pub trait Engine {
    type Context: Context;

    /// Construct a context; errors describe which parameter was rejected.
    fn new_context(&self, opts: ContextOptions) -> Result<Self::Context>;
}

/// One operation's execution context.
pub trait Context {
    /// Reconcile the attached state against real infrastructure.
    fn refresh(&mut self) -> Result<Snapshot>;
}
