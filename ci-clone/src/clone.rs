//! Full clone cycle with whole-workspace retry.
//!
//! One cycle: ensure the workspace directory, write credentials, probe, classify
//! the event, plan, then execute the plan with per-operation retry. When a cycle
//! fails and attempts remain, the workspace is deleted and the next cycle starts
//! from scratch.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::core::classifier::classify_event;
use crate::core::failure::{FailureClassifier, SignatureClassifier};
use crate::core::invariants::validate_plan;
use crate::core::planner::plan_for_event;
use crate::core::types::{BuildContext, CloneConfig, EventKind, ExecutionResult, Operation};
use crate::error::CloneError;
use crate::io::credentials::Credentials;
use crate::io::executor::Executor;
use crate::io::workspace;
use crate::retry::{Retrier, RetryPolicy, Sleeper, ThreadSleeper};

/// Summary of a successful clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutcome {
    /// Full cycles started, including the successful one.
    pub attempts: u32,
    pub event: EventKind,
    /// Operations of the successful cycle, in execution order.
    pub plan: Vec<Operation>,
    /// Final result of each operation of the successful cycle.
    pub results: Vec<ExecutionResult>,
}

/// Drives clone cycles against an [`Executor`].
pub struct Engine<E, S = ThreadSleeper> {
    executor: E,
    sleeper: S,
    classifier: Box<dyn FailureClassifier>,
}

impl<E: Executor> Engine<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            sleeper: ThreadSleeper,
            classifier: Box::new(SignatureClassifier::default()),
        }
    }
}

impl<E: Executor, S: Sleeper> Engine<E, S> {
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> Engine<E, T> {
        Engine {
            executor: self.executor,
            sleeper,
            classifier: self.classifier,
        }
    }

    pub fn with_classifier(mut self, classifier: impl FailureClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Materialize `ctx` in `root`, retrying whole cycles per `config`.
    ///
    /// Returns the error of the last cycle once attempts are exhausted. A
    /// workspace that cannot be deleted between cycles aborts immediately.
    #[instrument(skip_all, fields(root = %root.display(), event = %ctx.event, git_ref = %ctx.git_ref))]
    pub fn run(
        &self,
        root: &Path,
        ctx: &BuildContext,
        config: &CloneConfig,
        credentials: &Credentials,
    ) -> Result<CloneOutcome, CloneError> {
        let attempts = config.effective_outer_attempts();
        let mut attempt = 1;
        loop {
            if attempts > 1 {
                println!("attempt {attempt} of {attempts}");
            }
            match self.cycle(root, ctx, config, credentials) {
                Ok((event, plan, results)) => {
                    info!(attempt, "clone complete");
                    return Ok(CloneOutcome {
                        attempts: attempt,
                        event,
                        plan,
                        results,
                    });
                }
                Err(err) if attempt < attempts => {
                    warn!(attempt, attempts, err = %err, "clone attempt failed, rebuilding workspace");
                    workspace::wipe(root)?;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn cycle(
        &self,
        root: &Path,
        ctx: &BuildContext,
        config: &CloneConfig,
        credentials: &Credentials,
    ) -> Result<(EventKind, Vec<Operation>, Vec<ExecutionResult>), CloneError> {
        workspace::ensure(root)?;
        credentials.provision()?;

        let state = workspace::probe(root);
        let event = classify_event(&ctx.event, &ctx.git_ref);
        let plan = plan_for_event(&state, ctx, config, event);
        let violations = validate_plan(&plan);
        if !violations.is_empty() {
            return Err(CloneError::InvalidPlan(violations));
        }
        info!(
            ?event,
            initialized = state.initialized,
            ops = plan.len(),
            "planned clone"
        );

        let retrier = Retrier {
            executor: &self.executor,
            classifier: self.classifier.as_ref(),
            sleeper: &self.sleeper,
            policy: RetryPolicy::from(config),
        };
        let results = retrier.run_plan(&plan, root)?;
        Ok((event, plan, results))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use super::*;
    use crate::core::failure::TransientKind;
    use crate::error::CommandError;
    use crate::test_support::{RecordingSleeper, ScriptedExecutor, failed, ok};

    fn push_ctx() -> BuildContext {
        BuildContext {
            remote_url: "https://github.com/octocat/hello-world.git".to_string(),
            event: "push".to_string(),
            git_ref: "refs/heads/main".to_string(),
            commit: "7fd1a60b01f91b314f59955a4e4d4e80d8edf11d".to_string(),
            ..BuildContext::default()
        }
    }

    fn labels(executor: &ScriptedExecutor) -> Vec<&'static str> {
        executor.calls().iter().map(|(op, _)| op.label()).collect()
    }

    #[test]
    fn fresh_workspace_runs_full_plan() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("ws");
        let engine = Engine::new(ScriptedExecutor::always_ok())
            .with_sleeper(RecordingSleeper::default());

        let outcome = engine
            .run(&root, &push_ctx(), &CloneConfig::default(), &Credentials::none(temp.path()))
            .expect("clone");

        assert!(root.is_dir());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.event, EventKind::Ordinary);
        assert_eq!(outcome.results.len(), 4);
        assert_eq!(
            labels(engine.executor()),
            vec!["init", "set_remote", "fetch", "checkout_commit"]
        );
        assert!(engine.executor().calls().iter().all(|(_, dir)| *dir == root));
    }

    #[test]
    fn initialized_workspace_skips_setup() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join(".git")).expect("mkdir");
        fs::write(temp.path().join(".git/HEAD"), "ref: refs/heads/main\n").expect("write");
        let engine = Engine::new(ScriptedExecutor::always_ok())
            .with_sleeper(RecordingSleeper::default());

        engine
            .run(temp.path(), &push_ctx(), &CloneConfig::default(), &Credentials::none(temp.path()))
            .expect("clone");

        assert_eq!(labels(engine.executor()), vec!["fetch", "checkout_commit"]);
    }

    #[test]
    fn failed_cycle_wipes_workspace_and_starts_over() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("ws");
        let executor = ScriptedExecutor::new(vec![
            ok(),
            ok(),
            failed(128, "fatal: unable to access remote\n"),
        ])
        .then_ok();
        let engine = Engine::new(executor).with_sleeper(RecordingSleeper::default());
        let config = CloneConfig {
            outer_attempts: 2,
            ..CloneConfig::default()
        };

        let outcome = engine
            .run(&root, &push_ctx(), &config, &Credentials::none(temp.path()))
            .expect("second attempt succeeds");

        assert_eq!(outcome.attempts, 2);
        assert_eq!(
            labels(engine.executor()),
            vec![
                "init",
                "set_remote",
                "fetch",
                "init",
                "set_remote",
                "fetch",
                "checkout_commit"
            ]
        );
    }

    #[test]
    fn wipe_removes_stale_files_between_attempts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("ws");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join("stale"), "x").expect("write");
        let executor = ScriptedExecutor::new(vec![failed(1, "boom\n")]).then_ok();
        let engine = Engine::new(executor).with_sleeper(RecordingSleeper::default());
        let config = CloneConfig {
            outer_attempts: 2,
            ..CloneConfig::default()
        };

        engine
            .run(&root, &push_ctx(), &config, &Credentials::none(temp.path()))
            .expect("clone");

        assert!(root.is_dir());
        assert!(!root.join("stale").exists());
    }

    #[test]
    fn single_attempt_leaves_workspace_in_place() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("ws");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join("keep"), "x").expect("write");
        let executor = ScriptedExecutor::new(vec![failed(1, "boom\n")]);
        let engine = Engine::new(executor).with_sleeper(RecordingSleeper::default());

        let err = engine
            .run(&root, &push_ctx(), &CloneConfig::default(), &Credentials::none(temp.path()))
            .unwrap_err();

        assert!(matches!(err, CloneError::Command(CommandError::Fatal { .. })));
        assert!(root.join("keep").exists());
        assert_eq!(engine.executor().calls().len(), 1);
    }

    #[test]
    fn exhausted_outer_attempts_return_last_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("ws");
        let executor = ScriptedExecutor::new(vec![
            failed(1, "first\n"),
            failed(1, "second\n"),
            failed(1, "third\n"),
        ]);
        let engine = Engine::new(executor).with_sleeper(RecordingSleeper::default());
        let config = CloneConfig {
            outer_attempts: 3,
            ..CloneConfig::default()
        };

        let err = engine
            .run(&root, &push_ctx(), &config, &Credentials::none(temp.path()))
            .unwrap_err();

        assert!(err.to_string().contains("third"));
        assert_eq!(engine.executor().calls().len(), 3);
        // No wipe after the final attempt.
        assert!(root.is_dir());
    }

    #[test]
    fn zero_outer_attempts_runs_once() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = ScriptedExecutor::new(vec![failed(1, "boom\n")]).then_ok();
        let engine = Engine::new(executor).with_sleeper(RecordingSleeper::default());
        let config = CloneConfig {
            outer_attempts: 0,
            ..CloneConfig::default()
        };

        assert!(
            engine
                .run(temp.path(), &push_ctx(), &config, &Credentials::none(temp.path()))
                .is_err()
        );
        assert_eq!(engine.executor().calls().len(), 1);
    }

    #[test]
    fn transient_fetch_failure_retries_inside_one_cycle() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("ws");
        let missing = "fatal: couldn't find remote ref refs/pull/7/merge\n";
        let executor = ScriptedExecutor::new(vec![
            ok(),
            ok(),
            failed(128, missing),
            failed(128, missing),
        ])
        .then_ok();
        let sleeper = RecordingSleeper::default();
        let engine = Engine::new(executor).with_sleeper(&sleeper);
        let ctx = BuildContext {
            event: "pull_request".to_string(),
            git_ref: "refs/pull/7/merge".to_string(),
            ..push_ctx()
        };
        let config = CloneConfig {
            backoff: Duration::from_millis(10),
            ..CloneConfig::default()
        };

        let outcome = engine
            .run(&root, &ctx, &config, &Credentials::none(temp.path()))
            .expect("clone");

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.event, EventKind::PullRequest);
        assert_eq!(
            labels(engine.executor()),
            vec!["init", "set_remote", "fetch", "fetch", "fetch", "checkout_head"]
        );
        assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(10); 2]);
    }

    #[test]
    fn injected_classifier_decides_what_is_retried() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("ws");
        let executor = ScriptedExecutor::new(vec![
            ok(),
            ok(),
            failed(128, "error: RPC failed; curl 18 transfer closed\n"),
        ])
        .then_ok();
        let sleeper = RecordingSleeper::default();
        let classifier = SignatureClassifier::new(Vec::new())
            .with_signature(TransientKind::RemoteRefNotFound, r"RPC failed")
            .expect("valid pattern");
        let engine = Engine::new(executor)
            .with_sleeper(&sleeper)
            .with_classifier(classifier);
        let config = CloneConfig {
            backoff: Duration::from_secs(2),
            ..CloneConfig::default()
        };

        let outcome = engine
            .run(&root, &push_ctx(), &config, &Credentials::none(temp.path()))
            .expect("clone");

        assert_eq!(outcome.attempts, 1);
        assert_eq!(
            labels(engine.executor()),
            vec!["init", "set_remote", "fetch", "fetch", "checkout_commit"]
        );
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn injected_classifier_replaces_default_signatures() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = ScriptedExecutor::new(vec![
            ok(),
            ok(),
            failed(128, "fatal: couldn't find remote ref refs/heads/main\n"),
        ]);
        let sleeper = RecordingSleeper::default();
        let engine = Engine::new(executor)
            .with_sleeper(&sleeper)
            .with_classifier(SignatureClassifier::new(Vec::new()));

        let err = engine
            .run(
                &temp.path().join("ws"),
                &push_ctx(),
                &CloneConfig::default(),
                &Credentials::none(temp.path()),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            CloneError::Command(CommandError::Fatal { attempts: 1, .. })
        ));
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn credentials_are_written_before_operations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let home = temp.path().join("home");
        fs::create_dir_all(&home).expect("mkdir");
        let creds = Credentials {
            netrc: Some(crate::io::credentials::Netrc {
                machine: "github.com".to_string(),
                login: "octocat".to_string(),
                password: "token".to_string(),
            }),
            ..Credentials::none(&home)
        };
        let engine = Engine::new(ScriptedExecutor::always_ok())
            .with_sleeper(RecordingSleeper::default());

        engine
            .run(&temp.path().join("ws"), &push_ctx(), &CloneConfig::default(), &creds)
            .expect("clone");

        assert!(creds.netrc_path().is_file());
    }
}
