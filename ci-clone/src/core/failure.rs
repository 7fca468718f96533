//! Classification of failed invocations into transient vs fatal.
//!
//! The retry loop only asks a [`FailureClassifier`]; new transient signatures
//! are added here without touching retry code.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::ExecutionResult;

// git: "fatal: couldn't find remote ref refs/pull/7/merge"
static REMOTE_REF_NOT_FOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"find remote ref").unwrap());

/// Known recoverable failure patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// The hosting provider has not yet published the requested ref.
    RemoteRefNotFound,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientKind::RemoteRefNotFound => f.write_str("remote ref not found"),
        }
    }
}

/// Outcome of classifying a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient(TransientKind),
    Fatal,
}

impl FailureKind {
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::Transient(_))
    }
}

/// Decides whether a failed invocation is worth retrying in place.
pub trait FailureClassifier {
    fn classify(&self, result: &ExecutionResult) -> FailureKind;
}

/// One output pattern mapped to a transient kind.
#[derive(Debug, Clone)]
pub struct Signature {
    pub kind: TransientKind,
    pub pattern: Regex,
}

/// Classifier that matches captured output against a list of signatures.
///
/// Signatures are checked in order; the first match wins.
#[derive(Debug, Clone)]
pub struct SignatureClassifier {
    signatures: Vec<Signature>,
}

impl SignatureClassifier {
    pub fn new(signatures: Vec<Signature>) -> Self {
        Self { signatures }
    }

    /// Add a signature after the existing ones.
    pub fn with_signature(
        mut self,
        kind: TransientKind,
        pattern: &str,
    ) -> Result<Self, regex::Error> {
        self.signatures.push(Signature {
            kind,
            pattern: Regex::new(pattern)?,
        });
        Ok(self)
    }
}

impl Default for SignatureClassifier {
    fn default() -> Self {
        Self::new(vec![Signature {
            kind: TransientKind::RemoteRefNotFound,
            pattern: REMOTE_REF_NOT_FOUND.clone(),
        }])
    }
}

impl FailureClassifier for SignatureClassifier {
    fn classify(&self, result: &ExecutionResult) -> FailureKind {
        self.signatures
            .iter()
            .find(|sig| sig.pattern.is_match(&result.output))
            .map(|sig| FailureKind::Transient(sig.kind))
            .unwrap_or(FailureKind::Fatal)
    }
}
