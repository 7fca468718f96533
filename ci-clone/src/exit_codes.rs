//! Stable exit codes for the `ci-clone` binary.

/// Workspace materialized at the requested revision.
pub const OK: i32 = 0;
/// A clone cycle failed and no attempts remain.
pub const FAILED: i32 = 1;
/// Arguments, environment or settings file were invalid; nothing was run.
pub const INVALID: i32 = 2;
