//! Shared deterministic types for the clone engine.
//!
//! These types define stable contracts between the planner, the executor and
//! the retry layers. They do not depend on external state or I/O.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Category of the event that triggered the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Ordinary,
    PullRequest,
    Tag,
}

/// Immutable description of what the pipeline asked us to materialize.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildContext {
    /// Remote repository URL added as `origin`.
    pub remote_url: String,
    /// Raw event label supplied by the pipeline (`push`, `pull_request`, `tag`, ...).
    pub event: String,
    /// Symbolic ref to fetch (`refs/heads/main`, `refs/pull/7/merge`, ...).
    pub git_ref: String,
    /// Commit the workspace must end up at for ordinary events.
    pub commit: String,
    pub branch: Option<String>,
    /// Build number, informational only.
    pub number: Option<u64>,
}

/// Clone behavior knobs. Constructed once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneConfig {
    /// Shallow fetch depth; 0 fetches full history.
    pub depth: u32,
    pub tags: bool,
    pub skip_verify: bool,
    pub recursive: bool,
    pub submodule_remote: bool,
    /// Submodule name to replacement URL, iterated in name order.
    pub submodule_overrides: BTreeMap<String, String>,
    /// Full-cycle attempts; 0 behaves like 1.
    pub outer_attempts: u32,
    /// Delay before each per-operation retry.
    pub backoff: Duration,
    /// Per-operation retries after a transient failure.
    pub backoff_attempts: u32,
}

pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_BACKOFF_ATTEMPTS: u32 = 5;

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            depth: 0,
            tags: false,
            skip_verify: false,
            recursive: false,
            submodule_remote: false,
            submodule_overrides: BTreeMap::new(),
            outer_attempts: 1,
            backoff: DEFAULT_BACKOFF,
            backoff_attempts: DEFAULT_BACKOFF_ATTEMPTS,
        }
    }
}

impl CloneConfig {
    /// Number of full cycles to run, never less than one.
    pub fn effective_outer_attempts(&self) -> u32 {
        self.outer_attempts.max(1)
    }
}

/// Workspace facts re-derived at the start of every outer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceState {
    pub path: PathBuf,
    /// True when `.git` exists and is non-empty.
    pub initialized: bool,
}

/// One version-control step. Carries only what its invocation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    InitRepository,
    SetRemote { url: String },
    DisableTlsVerification,
    FetchRef { git_ref: String, tags: bool, depth: u32 },
    CheckoutHead,
    CheckoutCommit { commit: String },
    RemapSubmodule { name: String, url: String },
    UpdateSubmodules { remote: bool },
}

impl Operation {
    /// Stable short label used in logs and invariant messages.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::InitRepository => "init",
            Operation::SetRemote { .. } => "set_remote",
            Operation::DisableTlsVerification => "disable_tls_verification",
            Operation::FetchRef { .. } => "fetch",
            Operation::CheckoutHead => "checkout_head",
            Operation::CheckoutCommit { .. } => "checkout_commit",
            Operation::RemapSubmodule { .. } => "remap_submodule",
            Operation::UpdateSubmodules { .. } => "update_submodules",
        }
    }

    pub fn is_checkout(&self) -> bool {
        matches!(
            self,
            Operation::CheckoutHead | Operation::CheckoutCommit { .. }
        )
    }
}

/// Exit status and captured combined output of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Rendered invocation, e.g. `git fetch --no-tags origin +refs/heads/main:`.
    pub invocation: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Interleaved stdout and stderr, captured in full.
    pub output: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}
