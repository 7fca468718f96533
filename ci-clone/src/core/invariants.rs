//! Ordering invariants every clone plan must satisfy.

use crate::core::types::Operation;

/// Check plan ordering invariants:
/// - `InitRepository` and `SetRemote` precede `FetchRef`
/// - `DisableTlsVerification` precedes every network operation
/// - exactly one `FetchRef`, preceding the checkout
/// - exactly one checkout operation
/// - `RemapSubmodule` operations precede `UpdateSubmodules`
///
/// Returns a list of stable error messages (empty on success).
pub fn validate_plan(ops: &[Operation]) -> Vec<String> {
    let mut errors = Vec::new();

    let fetches = positions(ops, |op| matches!(op, Operation::FetchRef { .. }));
    let checkouts = positions(ops, Operation::is_checkout);

    if fetches.len() != 1 {
        errors.push(format!("expected exactly one fetch, found {}", fetches.len()));
    }
    if checkouts.len() != 1 {
        errors.push(format!(
            "expected exactly one checkout, found {}",
            checkouts.len()
        ));
    }

    if let Some(&fetch) = fetches.first() {
        for (idx, op) in ops.iter().enumerate() {
            let must_precede = matches!(
                op,
                Operation::InitRepository | Operation::SetRemote { .. }
            );
            if must_precede && idx > fetch {
                errors.push(format!("{} at {} must precede fetch at {}", op.label(), idx, fetch));
            }
        }
        if let Some(&checkout) = checkouts.first()
            && checkout < fetch
        {
            errors.push(format!(
                "checkout at {} must follow fetch at {}",
                checkout, fetch
            ));
        }
    }

    if let Some(tls) = ops
        .iter()
        .position(|op| matches!(op, Operation::DisableTlsVerification))
    {
        let first_network = ops.iter().position(is_network);
        if let Some(network) = first_network
            && tls > network
        {
            errors.push(format!(
                "disable_tls_verification at {} must precede network operation at {}",
                tls, network
            ));
        }
    }

    let last_remap = positions(ops, |op| matches!(op, Operation::RemapSubmodule { .. }))
        .last()
        .copied();
    let first_update = ops
        .iter()
        .position(|op| matches!(op, Operation::UpdateSubmodules { .. }));
    if let (Some(remap), Some(update)) = (last_remap, first_update)
        && remap > update
    {
        errors.push(format!(
            "remap_submodule at {} must precede update_submodules at {}",
            remap, update
        ));
    }

    errors
}

fn is_network(op: &Operation) -> bool {
    matches!(
        op,
        Operation::FetchRef { .. } | Operation::UpdateSubmodules { .. }
    )
}

fn positions(ops: &[Operation], pred: impl Fn(&Operation) -> bool) -> Vec<usize> {
    ops.iter()
        .enumerate()
        .filter(|(_, op)| pred(op))
        .map(|(idx, _)| idx)
        .collect()
}
