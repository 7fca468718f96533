//! Typed failures of the clone engine.
//!
//! Orchestration code matches on these to decide between retrying an
//! operation, rebuilding the workspace, or giving up.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::failure::TransientKind;

/// Lines of captured output kept in error messages.
const OUTPUT_TAIL_LINES: usize = 5;

#[derive(Debug, Error)]
pub enum CloneError {
    /// The workspace directory could not be created or removed.
    #[error("workspace {}: {source}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Credential material could not be written.
    #[error("write credentials {}: {source}", .path.display())]
    Credential {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external tool could not be started at all.
    #[error("spawn `{invocation}`: {source}")]
    Spawn {
        invocation: String,
        #[source]
        source: std::io::Error,
    },

    /// A planned operation exited non-zero.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The planner produced an operation list that breaks ordering rules.
    #[error("invalid clone plan:\n- {}", .0.join("\n- "))]
    InvalidPlan(Vec<String>),
}

/// A non-zero exit of one planned operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Output matched a known transient signature; eligible for an in-place retry.
    #[error("`{invocation}` failed with {} ({kind}){}", exit_label(.exit_code), tail_suffix(.output))]
    Transient {
        invocation: String,
        exit_code: Option<i32>,
        kind: TransientKind,
        output: String,
    },

    /// Not retryable in place.
    #[error("`{invocation}` failed with {} after {attempts} attempt(s){}", exit_label(.exit_code), tail_suffix(.output))]
    Fatal {
        invocation: String,
        exit_code: Option<i32>,
        attempts: u32,
        output: String,
    },
}

impl CommandError {
    pub fn invocation(&self) -> &str {
        match self {
            CommandError::Transient { invocation, .. } | CommandError::Fatal { invocation, .. } => {
                invocation
            }
        }
    }

    pub fn output(&self) -> &str {
        match self {
            CommandError::Transient { output, .. } | CommandError::Fatal { output, .. } => output,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, CommandError::Transient { .. })
    }

    /// Turn an exhausted transient failure into a fatal one.
    pub fn escalate(self, attempts: u32) -> CommandError {
        match self {
            CommandError::Transient {
                invocation,
                exit_code,
                output,
                ..
            } => CommandError::Fatal {
                invocation,
                exit_code,
                attempts,
                output,
            },
            fatal @ CommandError::Fatal { .. } => fatal,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "signal".to_string(),
    }
}

fn tail_suffix(output: &str) -> String {
    let lines: Vec<&str> = output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return String::new();
    }
    let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    format!(":\n{}", lines[start..].join("\n"))
}
