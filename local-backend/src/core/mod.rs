//! Deterministic, pure logic shared by the backend.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod operation;
pub mod snapshot;
