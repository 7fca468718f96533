//! Per-operation retry of transient failures.
//!
//! Only the failing operation is re-run, with identical arguments, after a
//! fixed backoff. Anything the classifier calls fatal (or a transient failure
//! that outlives its attempts) is handed back to the caller.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::core::failure::{FailureClassifier, FailureKind};
use crate::core::types::{CloneConfig, ExecutionResult, Operation};
use crate::error::{CloneError, CommandError};
use crate::io::executor::Executor;

/// Blocks the current thread between retries.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Inner retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before each retry.
    pub backoff: Duration,
    /// Retries after the first failure; total invocations are `attempts + 1`.
    pub attempts: u32,
}

impl From<&CloneConfig> for RetryPolicy {
    fn from(config: &CloneConfig) -> Self {
        Self {
            backoff: config.backoff,
            attempts: config.backoff_attempts,
        }
    }
}

/// Collaborators the inner retry loop needs.
pub struct Retrier<'a, E: ?Sized, C: ?Sized, S: ?Sized> {
    pub executor: &'a E,
    pub classifier: &'a C,
    pub sleeper: &'a S,
    pub policy: RetryPolicy,
}

impl<E, C, S> Retrier<'_, E, C, S>
where
    E: Executor + ?Sized,
    C: FailureClassifier + ?Sized,
    S: Sleeper + ?Sized,
{
    /// Run every operation in order, stopping at the first unrecovered failure.
    ///
    /// Returns the final result of each operation on success.
    pub fn run_plan(
        &self,
        ops: &[Operation],
        workdir: &Path,
    ) -> Result<Vec<ExecutionResult>, CloneError> {
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            results.push(self.exec(op, workdir)?);
        }
        Ok(results)
    }

    /// Run one operation, retrying it in place while it fails transiently.
    #[instrument(skip_all, fields(op = op.label(), max_retries = self.policy.attempts))]
    pub fn exec(&self, op: &Operation, workdir: &Path) -> Result<ExecutionResult, CloneError> {
        let result = self.executor.exec(op, workdir)?;
        if result.success() {
            return Ok(result);
        }

        let mut failure = match self.failure(result, 1) {
            transient @ CommandError::Transient { .. } => transient,
            fatal => return Err(fatal.into()),
        };

        for retry in 1..=self.policy.attempts {
            warn!(
                retry,
                backoff = %humantime::format_duration(self.policy.backoff),
                err = %failure,
                "transient failure, retrying operation"
            );
            println!(
                "retry in {}",
                humantime::format_duration(self.policy.backoff)
            );
            self.sleeper.sleep(self.policy.backoff);

            let result = self.executor.exec(op, workdir)?;
            if result.success() {
                debug!(retry, "operation recovered");
                return Ok(result);
            }

            failure = match self.failure(result, retry + 1) {
                transient @ CommandError::Transient { .. } => transient,
                fatal => return Err(fatal.into()),
            };
        }

        Err(failure.escalate(self.policy.attempts + 1).into())
    }

    fn failure(&self, result: ExecutionResult, attempts: u32) -> CommandError {
        match self.classifier.classify(&result) {
            FailureKind::Transient(kind) => CommandError::Transient {
                invocation: result.invocation,
                exit_code: result.exit_code,
                kind,
                output: result.output,
            },
            FailureKind::Fatal => CommandError::Fatal {
                invocation: result.invocation,
                exit_code: result.exit_code,
                attempts,
                output: result.output,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::failure::SignatureClassifier;
    use crate::test_support::{RecordingSleeper, ScriptedExecutor, failed, ok};

    const MISSING_REF: &str = "fatal: couldn't find remote ref refs/pull/7/merge\n";

    fn fetch() -> Operation {
        Operation::FetchRef {
            git_ref: "refs/pull/7/merge".to_string(),
            tags: false,
            depth: 0,
        }
    }

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::from_secs(5),
            attempts,
        }
    }

    #[test]
    fn success_runs_once_without_sleeping() {
        let executor = ScriptedExecutor::new(vec![ok()]);
        let sleeper = RecordingSleeper::default();
        let retrier = Retrier {
            executor: &executor,
            classifier: &SignatureClassifier::default(),
            sleeper: &sleeper,
            policy: policy(5),
        };
        retrier.exec(&fetch(), Path::new("/ws")).expect("exec");
        assert_eq!(executor.calls().len(), 1);
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn transient_failure_is_retried_with_identical_operation() {
        let executor = ScriptedExecutor::new(vec![
            failed(128, MISSING_REF),
            failed(128, MISSING_REF),
            ok(),
        ]);
        let sleeper = RecordingSleeper::default();
        let retrier = Retrier {
            executor: &executor,
            classifier: &SignatureClassifier::default(),
            sleeper: &sleeper,
            policy: policy(5),
        };
        let result = retrier.exec(&fetch(), Path::new("/ws")).expect("recovers");
        assert!(result.success());
        let calls = executor.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(op, _)| *op == fetch()));
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(5); 2]);
    }

    #[test]
    fn transient_failure_exhausts_attempts_then_escalates() {
        let executor = ScriptedExecutor::new(vec![failed(128, MISSING_REF); 4]);
        let sleeper = RecordingSleeper::default();
        let retrier = Retrier {
            executor: &executor,
            classifier: &SignatureClassifier::default(),
            sleeper: &sleeper,
            policy: policy(3),
        };
        let err = retrier.exec(&fetch(), Path::new("/ws")).unwrap_err();
        assert!(matches!(
            err,
            CloneError::Command(CommandError::Fatal { attempts: 4, .. })
        ));
        assert_eq!(executor.calls().len(), 4);
        assert_eq!(sleeper.sleeps().len(), 3);
    }

    #[test]
    fn fatal_failure_is_never_retried() {
        let executor = ScriptedExecutor::new(vec![failed(128, "fatal: Authentication failed\n")]);
        let sleeper = RecordingSleeper::default();
        let retrier = Retrier {
            executor: &executor,
            classifier: &SignatureClassifier::default(),
            sleeper: &sleeper,
            policy: policy(5),
        };
        let err = retrier.exec(&fetch(), Path::new("/ws")).unwrap_err();
        assert!(matches!(
            err,
            CloneError::Command(CommandError::Fatal { attempts: 1, .. })
        ));
        assert_eq!(executor.calls().len(), 1);
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn retry_that_turns_fatal_stops_immediately() {
        let executor = ScriptedExecutor::new(vec![
            failed(128, MISSING_REF),
            failed(128, "fatal: repository not found\n"),
            ok(),
        ]);
        let sleeper = RecordingSleeper::default();
        let retrier = Retrier {
            executor: &executor,
            classifier: &SignatureClassifier::default(),
            sleeper: &sleeper,
            policy: policy(5),
        };
        let err = retrier.exec(&fetch(), Path::new("/ws")).unwrap_err();
        assert!(err.to_string().contains("repository not found"));
        assert_eq!(executor.calls().len(), 2);
    }

    #[test]
    fn zero_attempts_escalates_first_transient_failure() {
        let executor = ScriptedExecutor::new(vec![failed(128, MISSING_REF)]);
        let sleeper = RecordingSleeper::default();
        let retrier = Retrier {
            executor: &executor,
            classifier: &SignatureClassifier::default(),
            sleeper: &sleeper,
            policy: policy(0),
        };
        let err = retrier.exec(&fetch(), Path::new("/ws")).unwrap_err();
        assert!(matches!(
            err,
            CloneError::Command(CommandError::Fatal { attempts: 1, .. })
        ));
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn run_plan_stops_at_first_failure() {
        let executor = ScriptedExecutor::new(vec![ok(), failed(1, "boom\n"), ok()]);
        let sleeper = RecordingSleeper::default();
        let retrier = Retrier {
            executor: &executor,
            classifier: &SignatureClassifier::default(),
            sleeper: &sleeper,
            policy: policy(5),
        };
        let ops = vec![
            Operation::InitRepository,
            fetch(),
            Operation::CheckoutHead,
        ];
        let err = retrier.run_plan(&ops, Path::new("/ws")).unwrap_err();
        assert!(err.to_string().contains("boom"));
        let labels: Vec<&str> = executor.calls().iter().map(|(op, _)| op.label()).collect();
        assert_eq!(labels, vec!["init", "fetch"]);
    }
}
