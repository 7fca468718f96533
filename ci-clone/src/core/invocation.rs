//! Fixed mapping from [`Operation`] to `git` arguments.

use crate::core::types::Operation;

pub const GIT: &str = "git";

/// Arguments passed to `git` for an operation, in order.
pub fn git_args(op: &Operation) -> Vec<String> {
    match op {
        Operation::InitRepository => vec!["init".into()],
        Operation::SetRemote { url } => {
            vec!["remote".into(), "add".into(), "origin".into(), url.clone()]
        }
        Operation::DisableTlsVerification => vec![
            "config".into(),
            "--global".into(),
            "http.sslVerify".into(),
            "false".into(),
        ],
        Operation::FetchRef {
            git_ref,
            tags,
            depth,
        } => {
            let mut args = vec![
                "fetch".to_string(),
                if *tags { "--tags" } else { "--no-tags" }.to_string(),
            ];
            if *depth != 0 {
                args.push(format!("--depth={depth}"));
            }
            args.push("origin".into());
            args.push(format!("+{git_ref}:"));
            args
        }
        Operation::CheckoutHead => vec!["checkout".into(), "-qf".into(), "FETCH_HEAD".into()],
        Operation::CheckoutCommit { commit } => vec![
            "reset".into(),
            "--hard".into(),
            "-q".into(),
            commit.clone(),
        ],
        Operation::RemapSubmodule { name, url } => vec![
            "config".into(),
            format!("submodule.{name}.url"),
            url.clone(),
        ],
        Operation::UpdateSubmodules { remote } => {
            let mut args = vec![
                "submodule".to_string(),
                "update".to_string(),
                "--init".to_string(),
                "--recursive".to_string(),
            ];
            if *remote {
                args.push("--remote".into());
            }
            args
        }
    }
}

/// Human-readable invocation, e.g. `git fetch --no-tags origin +refs/heads/main:`.
pub fn render(op: &Operation) -> String {
    let mut out = String::from(GIT);
    for arg in git_args(op) {
        out.push(' ');
        out.push_str(&arg);
    }
    out
}

/// Trace line emitted before an operation runs.
pub fn trace_line(op: &Operation) -> String {
    format!("+ {}", render(op))
}
