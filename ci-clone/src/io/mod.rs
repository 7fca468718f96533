//! I/O helpers for the clone engine.

pub mod config;
pub mod credentials;
pub mod executor;
pub mod process;
pub mod workspace;
