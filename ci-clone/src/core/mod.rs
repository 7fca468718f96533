//! Deterministic, pure logic for the clone engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod failure;
pub mod invariants;
pub mod invocation;
pub mod planner;
pub mod types;
