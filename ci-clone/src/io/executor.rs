//! Executor abstraction for running planned operations.
//!
//! The [`Executor`] trait decouples retry orchestration from the actual `git`
//! subprocess. Tests use scripted executors that return predetermined results
//! without spawning processes.

use std::path::Path;
use std::process::Command;

use tracing::{debug, instrument, warn};

use crate::core::invocation::{GIT, git_args, render, trace_line};
use crate::core::types::{ExecutionResult, Operation};
use crate::error::CloneError;
use crate::io::process::{Relay, run_command_tee};

/// Runs one operation to completion inside a working directory.
pub trait Executor {
    /// A non-zero exit is reported through [`ExecutionResult`], not as an error.
    /// Errors are reserved for failing to start the process at all.
    fn exec(&self, op: &Operation, workdir: &Path) -> Result<ExecutionResult, CloneError>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn exec(&self, op: &Operation, workdir: &Path) -> Result<ExecutionResult, CloneError> {
        (**self).exec(op, workdir)
    }
}

/// Executor that spawns the `git` binary.
#[derive(Debug, Clone)]
pub struct GitExecutor {
    program: String,
    relay: Relay,
    trace: bool,
    envs: Vec<(String, String)>,
}

impl Default for GitExecutor {
    fn default() -> Self {
        Self {
            program: GIT.to_string(),
            relay: Relay::Inherit,
            trace: true,
            envs: Vec::new(),
        }
    }
}

impl GitExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture output without mirroring it or printing trace lines.
    pub fn quiet() -> Self {
        Self {
            relay: Relay::Silent,
            trace: false,
            ..Self::default()
        }
    }

    /// Use a different `git` binary (e.g. an absolute path).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set an environment variable for every invocation.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl Executor for GitExecutor {
    #[instrument(skip_all, fields(op = op.label(), workdir = %workdir.display()))]
    fn exec(&self, op: &Operation, workdir: &Path) -> Result<ExecutionResult, CloneError> {
        let invocation = render(op);
        if self.trace {
            println!("{}", trace_line(op));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(git_args(op))
            .current_dir(workdir)
            .envs(self.envs.iter().map(|(k, v)| (k, v)));

        let output = run_command_tee(cmd, self.relay).map_err(|source| CloneError::Spawn {
            invocation: invocation.clone(),
            source,
        })?;

        let result = ExecutionResult {
            invocation,
            exit_code: output.status.code(),
            output: output.combined_lossy(),
        };
        if result.success() {
            debug!("operation succeeded");
        } else {
            warn!(exit_code = ?result.exit_code, "operation failed");
        }
        Ok(result)
    }
}
