//! Workspace materialization for CI pipelines.
//!
//! Brings a build workspace to an exact revision of a remote repository by
//! planning and running a short sequence of `git` operations. Failures are
//! handled at two levels: a single operation is retried in place when its
//! output matches a known transient signature, and the whole cycle is rerun on
//! a freshly deleted workspace when configured to.
//!
//! - **[`core`]**: Pure, deterministic logic (event classification, planning,
//!   plan invariants, argument rendering, failure classification). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem, credentials, process
//!   execution, settings files). Isolated to enable scripted fakes in tests.
//!
//! [`retry`] and [`clone`] coordinate the two to implement the `ci-clone` binary.

pub mod clone;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod retry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
