// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

//! The Eclipse workspace `soatestcli` runs in.

use crate::errors::WorkspaceCreateError;
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use tracing::{debug, warn};

/// The prefix used for temporary workspaces.
pub const EPHEMERAL_WORKSPACE_PREFIX: &str = "soatest.workspace";

/// A workspace directory for a single run.
///
/// An explicitly configured workspace belongs to the user and is never removed. An ephemeral
/// workspace is created in the system temporary directory and removed by [`close`](Self::close),
/// or when dropped.
#[derive(Debug)]
pub enum WorkspaceDir {
    /// A workspace chosen by the user.
    Explicit(Utf8PathBuf),

    /// A temporary workspace.
    Ephemeral(Utf8TempDir),
}

impl WorkspaceDir {
    /// Returns the explicit workspace if one is set, otherwise creates an ephemeral one.
    pub fn acquire(explicit: Option<&Utf8Path>) -> Result<Self, WorkspaceCreateError> {
        match explicit {
            Some(path) => Ok(Self::Explicit(path.to_owned())),
            None => {
                let dir = camino_tempfile::Builder::new()
                    .prefix(EPHEMERAL_WORKSPACE_PREFIX)
                    .tempdir()
                    .map_err(WorkspaceCreateError::new)?;
                debug!("created temporary workspace `{}`", dir.path());
                Ok(Self::Ephemeral(dir))
            }
        }
    }

    /// Returns the path to the workspace.
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Explicit(path) => path,
            Self::Ephemeral(dir) => dir.path(),
        }
    }

    /// Returns true if this workspace is removed once the run is done.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Ephemeral(_))
    }

    /// Removes the workspace if it is ephemeral.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn close(self) {
        if let Self::Ephemeral(dir) = self {
            let path = dir.path().to_owned();
            match dir.close() {
                Ok(()) => debug!("removed temporary workspace `{path}`"),
                Err(err) => warn!("failed to remove temporary workspace `{path}`: {err}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_workspace_is_kept() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let workspace_path = dir.path().join("ws");
        std::fs::create_dir(&workspace_path).unwrap();

        let workspace = WorkspaceDir::acquire(Some(&workspace_path)).expect("acquired workspace");
        assert!(!workspace.is_ephemeral());
        assert_eq!(workspace.path(), workspace_path);
        workspace.close();
        assert!(workspace_path.is_dir(), "explicit workspace is not removed");
    }

    #[test]
    fn ephemeral_workspace_is_removed() {
        let workspace = WorkspaceDir::acquire(None).expect("acquired workspace");
        assert!(workspace.is_ephemeral());
        let path = workspace.path().to_owned();
        assert!(path.is_dir());
        assert!(
            path.file_name()
                .is_some_and(|name| name.starts_with(EPHEMERAL_WORKSPACE_PREFIX)),
            "{path} has the expected prefix"
        );

        // Contents created by soatestcli are removed as well.
        std::fs::create_dir_all(path.join(".metadata/.plugins")).unwrap();
        std::fs::write(path.join(".metadata/version.ini"), "1").unwrap();

        workspace.close();
        assert!(!path.exists());
    }

    #[test]
    fn ephemeral_workspace_is_removed_on_drop() {
        let path = {
            let workspace = WorkspaceDir::acquire(None).expect("acquired workspace");
            workspace.path().to_owned()
        };
        assert!(!path.exists());
    }
}
