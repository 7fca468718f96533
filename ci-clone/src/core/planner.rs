//! Deterministic planning of the git operations for one clone attempt.

use crate::core::classifier::classify_event;
use crate::core::types::{BuildContext, CloneConfig, EventKind, Operation, WorkspaceState};

/// Build the ordered operation list for one outer attempt.
///
/// The order is fixed:
/// 1. `DisableTlsVerification` when verification is skipped.
/// 2. `InitRepository` + `SetRemote` when the workspace has no repository yet.
/// 3. `FetchRef` of the requested ref.
/// 4. Exactly one checkout: `CheckoutHead` for pull requests and tags (the
///    commit may not be a branch tip), `CheckoutCommit` otherwise.
/// 5. One `RemapSubmodule` per override, in name order.
/// 6. `UpdateSubmodules` when recursion is enabled.
///
/// Identical inputs always produce identical plans.
pub fn plan(
    workspace: &WorkspaceState,
    build: &BuildContext,
    config: &CloneConfig,
) -> Vec<Operation> {
    plan_for_event(
        workspace,
        build,
        config,
        classify_event(&build.event, &build.git_ref),
    )
}

/// Same as [`plan`] with an already classified event.
pub fn plan_for_event(
    workspace: &WorkspaceState,
    build: &BuildContext,
    config: &CloneConfig,
    event: EventKind,
) -> Vec<Operation> {
    let mut ops = Vec::new();

    if config.skip_verify {
        ops.push(Operation::DisableTlsVerification);
    }

    if !workspace.initialized {
        ops.push(Operation::InitRepository);
        ops.push(Operation::SetRemote {
            url: build.remote_url.clone(),
        });
    }

    ops.push(Operation::FetchRef {
        git_ref: build.git_ref.clone(),
        tags: config.tags,
        depth: config.depth,
    });

    ops.push(match event {
        EventKind::PullRequest | EventKind::Tag => Operation::CheckoutHead,
        EventKind::Ordinary => Operation::CheckoutCommit {
            commit: build.commit.clone(),
        },
    });

    // BTreeMap iteration is already sorted by name.
    for (name, url) in &config.submodule_overrides {
        ops.push(Operation::RemapSubmodule {
            name: name.clone(),
            url: url.clone(),
        });
    }

    if config.recursive {
        ops.push(Operation::UpdateSubmodules {
            remote: config.submodule_remote,
        });
    }

    ops
}
