// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

//! General support code for soatest-runner.

use camino::{Utf8Path, Utf8PathBuf};

/// Returns `s` if it contains anything other than whitespace.
pub(crate) fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Resolves `path` against `base` if it is relative.
///
/// This is purely lexical: the file system is not consulted and symlinks are not resolved.
pub(crate) fn absolutize(base: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        base.join(path)
    }
}

/// Utilities for pluralizing various words based on count.
pub(crate) mod plural {
    /// Returns "project" if `count` is 1, otherwise "projects".
    pub(crate) fn projects_str(count: usize) -> &'static str {
        if count == 1 { "project" } else { "projects" }
    }

    /// Returns "file" if `count` is 1, otherwise "files".
    pub(crate) fn files_str(count: usize) -> &'static str {
        if count == 1 { "file" } else { "files" }
    }
}
