//! Orchestration for a single refresh operation.

use tracing::{debug, info, instrument, warn};

use crate::backend::Backend;
use crate::core::operation::{ContextOptions, Operation};
use crate::engine::{Context, Engine};
use crate::error::BackendError;

/// Result of a refresh that was written and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Serial of the persisted snapshot.
    pub serial: u64,
    /// Number of resources in the persisted snapshot.
    pub resources: usize,
    /// Whether the refresh changed anything besides the serial.
    pub changed: bool,
}

/// Run one refresh against `backend`'s state.
///
/// Acquires a fresh handle, re-syncs it from storage, builds a context from
/// `op` plus the current snapshot, computes the refreshed snapshot, then
/// writes it into the handle and persists it. Each stage runs only after the
/// previous one succeeded; nothing is retried.
#[instrument(skip_all, fields(destroy = op.destroy, module = %op.module.display(), targets = op.targets.len()))]
pub fn run_refresh<B, E>(
    backend: &B,
    engine: &E,
    op: &Operation,
) -> Result<RefreshOutcome, BackendError>
where
    B: Backend + ?Sized,
    E: Engine,
{
    let mut opts = ContextOptions::from_operation(op);

    let mut state = backend.state()?;
    // Acquisition already loaded once; storage may have moved since.
    state.refresh_state().map_err(BackendError::Refresh)?;
    opts.state = state.state().cloned();
    let prior = opts.state.clone();
    debug!(
        serial = ?prior.as_ref().map(|s| s.serial),
        parallelism = opts.effective_parallelism(),
        "state loaded for operation"
    );

    let mut ctx = engine.new_context(opts).map_err(BackendError::ContextBuild)?;
    let next = ctx.refresh().map_err(BackendError::Computation)?;
    let changed = prior.as_ref().is_none_or(|p| !p.same_content(&next));

    state
        .write_state(next.clone())
        .map_err(BackendError::Write)?;
    if let Err(err) = state.persist_state() {
        warn!(error = %format!("{err:#}"), "refreshed state held in memory but not saved");
        let unsaved = state.state().cloned().unwrap_or(next);
        return Err(BackendError::Persist {
            source: err,
            unsaved: Box::new(unsaved),
        });
    }

    let saved = state.state().unwrap_or(&next);
    let outcome = RefreshOutcome {
        serial: saved.serial,
        resources: saved.resources.len(),
        changed,
    };
    info!(
        serial = outcome.serial,
        resources = outcome.resources,
        changed = outcome.changed,
        "refresh complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use crate::test_support::{
        Call, FailPlan, FakeBackend, Script, ScriptedEngine, call_log, snapshot,
    };

    #[test]
    fn write_failure_skips_persist() {
        let log = call_log();
        let backend = FakeBackend::new(log.clone(), Some(snapshot(1, &[("a.b", "1")])))
            .with_failures(FailPlan {
                write: true,
                ..FailPlan::default()
            });
        let engine = ScriptedEngine::new(log.clone(), Script::Refresh(snapshot(2, &[])));

        let err = run_refresh(&backend, &engine, &Operation::default()).unwrap_err();
        assert_eq!(err.stage(), Stage::Writing);
        assert!(!log.borrow().contains(&Call::Persist));
        assert_eq!(backend.stored(), Some(snapshot(1, &[("a.b", "1")])));
    }

    #[test]
    fn resync_failure_is_a_refresh_error() {
        let log = call_log();
        let backend = FakeBackend::new(log.clone(), None).with_failures(FailPlan {
            refresh_at: Some(2),
            ..FailPlan::default()
        });
        let engine = ScriptedEngine::new(log.clone(), Script::Refresh(snapshot(1, &[])));

        let err = run_refresh(&backend, &engine, &Operation::default()).unwrap_err();
        assert!(matches!(err, BackendError::Refresh(_)));
        assert!(err.to_string().starts_with("error loading state"));
        assert!(engine.seen.borrow().is_empty());
    }

    #[test]
    fn context_errors_surface_unwrapped() {
        let log = call_log();
        let backend = FakeBackend::new(log.clone(), None);
        let engine = ScriptedEngine::new(
            log.clone(),
            Script::RejectContext("parallelism must be positive".to_string()),
        );

        let err = run_refresh(&backend, &engine, &Operation::default()).unwrap_err();
        assert_eq!(err.stage(), Stage::BuildingContext);
        assert_eq!(err.to_string(), "parallelism must be positive");
        assert!(!log.borrow().contains(&Call::Compute));
    }

    #[test]
    fn unchanged_refresh_reports_no_change() {
        let log = call_log();
        let current = snapshot(5, &[("a.b", "1")]);
        let backend = FakeBackend::new(log.clone(), Some(current.clone()));
        let engine = ScriptedEngine::new(log, Script::Refresh(current));

        let outcome = run_refresh(&backend, &engine, &Operation::default()).expect("refresh");
        assert_eq!(
            outcome,
            RefreshOutcome {
                serial: 5,
                resources: 1,
                changed: false,
            }
        );
    }
}
