//! Workspace directory probing and lifecycle.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::core::types::WorkspaceState;
use crate::error::CloneError;

pub const GIT_DIR: &str = ".git";

/// Report whether `root` already holds a non-empty `.git` directory.
///
/// A missing or unreadable `.git` counts as a fresh workspace.
pub fn probe(root: &Path) -> WorkspaceState {
    let initialized = !is_dir_empty(&root.join(GIT_DIR));
    debug!(root = %root.display(), initialized, "probed workspace");
    WorkspaceState {
        path: root.to_path_buf(),
        initialized,
    }
}

/// Create the workspace directory (and parents) if missing.
pub fn ensure(root: &Path) -> Result<(), CloneError> {
    fs::create_dir_all(root).map_err(|source| CloneError::Workspace {
        path: root.to_path_buf(),
        source,
    })
}

/// Delete the workspace directory and everything in it.
///
/// A directory that is already gone is not an error.
pub fn wipe(root: &Path) -> Result<(), CloneError> {
    match fs::remove_dir_all(root) {
        Ok(()) => {
            debug!(root = %root.display(), "removed workspace");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CloneError::Workspace {
            path: root.to_path_buf(),
            source,
        }),
    }
}

fn is_dir_empty(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}
