//! I/O helpers for the local backend.

pub mod backup_state;
pub mod config;
pub mod local_state;
pub mod schema;
pub mod state;
