//! Local state backend for an infrastructure-as-code engine.
//!
//! This crate decides where engine state lives, how it is read and written,
//! and drives a single refresh operation against it. The architecture keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (snapshot serial rules, operation
//!   to context mapping). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (configuration files, schema
//!   validation, state handles on disk).
//!
//! Orchestration modules ([`backend`], [`operation`]) coordinate core logic
//! with I/O: the backend facade hands out state handles, either from local
//! files or from a delegate backend, and the operation executor threads that
//! state through an [`engine`] context and commits the result.

pub mod backend;
pub mod core;
pub mod engine;
pub mod error;
pub mod io;
pub mod logging;
pub mod operation;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
