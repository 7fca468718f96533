//! Test helpers: scripted executors, a recording sleeper, and a local git remote.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tempfile::TempDir;

use crate::core::invocation::render;
use crate::core::types::{ExecutionResult, Operation};
use crate::error::CloneError;
use crate::io::executor::{Executor, GitExecutor};
use crate::retry::Sleeper;

/// Scripted result used by [`ScriptedExecutor`]. The invocation is filled in
/// from the operation when the script is replayed.
pub fn ok() -> ExecutionResult {
    ExecutionResult {
        invocation: String::new(),
        exit_code: Some(0),
        output: String::new(),
    }
}

pub fn failed(code: i32, output: &str) -> ExecutionResult {
    ExecutionResult {
        invocation: String::new(),
        exit_code: Some(code),
        output: output.to_string(),
    }
}

/// Executor that replays queued results and records every call.
///
/// Once the queue is drained it either keeps succeeding (see [`Self::then_ok`])
/// or panics.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    script: RefCell<VecDeque<ExecutionResult>>,
    calls: RefCell<Vec<(Operation, PathBuf)>>,
    ok_when_drained: bool,
}

impl ScriptedExecutor {
    pub fn new(script: Vec<ExecutionResult>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            ..Self::default()
        }
    }

    /// Executor where every operation succeeds.
    pub fn always_ok() -> Self {
        Self::new(Vec::new()).then_ok()
    }

    /// Succeed for every call past the end of the script.
    pub fn then_ok(mut self) -> Self {
        self.ok_when_drained = true;
        self
    }

    pub fn calls(&self) -> Vec<(Operation, PathBuf)> {
        self.calls.borrow().clone()
    }
}

impl Executor for ScriptedExecutor {
    fn exec(&self, op: &Operation, workdir: &Path) -> Result<ExecutionResult, CloneError> {
        self.calls
            .borrow_mut()
            .push((op.clone(), workdir.to_path_buf()));
        let next = self.script.borrow_mut().pop_front();
        let mut result = match next {
            Some(result) => result,
            None if self.ok_when_drained => ok(),
            None => panic!("script exhausted at `{}`", render(op)),
        };
        result.invocation = render(op);
        Ok(result)
    }
}

/// Sleeper that records requested delays instead of blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Throwaway repository on disk that clone tests fetch from.
///
/// Starts with one commit on `main`.
pub struct TestRemote {
    dir: TempDir,
}

impl TestRemote {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let remote = Self { dir };
        remote.git(&["init", "-q"]);
        remote.git(&["config", "user.email", "ci@example.com"]);
        remote.git(&["config", "user.name", "CI"]);
        remote.git(&["config", "commit.gpgsign", "false"]);
        remote.commit("README.md", "hello\n", "initial commit");
        remote.git(&["branch", "-M", "main"]);
        remote
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// URL usable as the `origin` of a clone.
    pub fn url(&self) -> String {
        self.path().display().to_string()
    }

    /// Write `file`, commit it on the current branch and return the new sha.
    pub fn commit(&self, file: &str, contents: &str, message: &str) -> String {
        fs::write(self.path().join(file), contents).expect("write fixture file");
        self.git(&["add", file]);
        self.git(&["commit", "-q", "-m", message]);
        self.head()
    }

    pub fn head(&self) -> String {
        self.git(&["rev-parse", "HEAD"])
    }

    /// Lightweight tag at the current HEAD; returns its ref.
    pub fn tag(&self, name: &str) -> String {
        self.git(&["tag", name]);
        format!("refs/tags/{name}")
    }

    /// Publish a commit off `main` under `refs/pull/<number>/merge`.
    ///
    /// Returns the ref and the commit it points at.
    pub fn pull_request(&self, number: u64) -> (String, String) {
        let branch = format!("pr-{number}");
        self.git(&["checkout", "-q", "-b", &branch]);
        let sha = self.commit(
            &format!("pr-{number}.txt"),
            "change\n",
            &format!("pull request {number}"),
        );
        self.git(&["checkout", "-q", "main"]);
        let git_ref = format!("refs/pull/{number}/merge");
        self.git(&["update-ref", &git_ref, &sha]);
        (git_ref, sha)
    }

    /// Run git in the remote and return trimmed stdout; panics on failure.
    pub fn git(&self, args: &[&str]) -> String {
        git_in(self.path(), args)
    }
}

impl Default for TestRemote {
    fn default() -> Self {
        Self::new()
    }
}

/// Git config passed through the environment so local-path submodules can be cloned.
pub const FILE_PROTOCOL_ENV: [(&str, &str); 3] = [
    ("GIT_CONFIG_COUNT", "1"),
    ("GIT_CONFIG_KEY_0", "protocol.file.allow"),
    ("GIT_CONFIG_VALUE_0", "always"),
];

/// Quiet [`GitExecutor`] that may clone submodules from local paths.
pub fn local_git_executor() -> GitExecutor {
    FILE_PROTOCOL_ENV
        .iter()
        .fold(GitExecutor::quiet(), |executor, (key, value)| {
            executor.with_env(*key, *value)
        })
}

/// Run git in `dir` and return trimmed stdout; panics on failure.
pub fn git_in(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
