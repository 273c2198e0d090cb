// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Preparing projects for `soatestcli -import`.
//!
//! `soatestcli` imports Eclipse projects, which are identified by a `.project` descriptor. An
//! import target can be either a `.project` file, or a directory. A directory that doesn't
//! contain a descriptor anywhere in its tree gets a minimal one generated for the duration of the
//! run.

use crate::{errors::ImportTargetError, helpers::plural};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::io::{self, BufWriter, Write};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// The file name of an Eclipse project descriptor.
pub const PROJECT_DESCRIPTOR: &str = ".project";

static PROJECT_DESCRIPTION_TAG: &str = "projectDescription";
static NAME_TAG: &str = "name";
static EMPTY_TAGS: &[&str] = &["comment", "projects", "buildSpec", "natures"];

/// A project that is ready to be imported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportTarget {
    path: Utf8PathBuf,
    synthesized: bool,
}

impl ImportTarget {
    /// Checks that `path` can be imported, generating a `.project` descriptor if necessary.
    ///
    /// Generated descriptors are registered with `descriptors` before being written, so they are
    /// removed even if writing fails halfway.
    pub fn prepare(
        path: &Utf8Path,
        descriptors: &mut SyntheticDescriptors,
    ) -> Result<Self, ImportTargetError> {
        // A path that can't be inspected is treated as missing.
        let metadata = fs::metadata(path).map_err(|err| {
            debug!("{err}");
            ImportTargetError::NotFound {
                path: path.to_owned(),
            }
        })?;

        if !metadata.is_dir() {
            if path.file_name() != Some(PROJECT_DESCRIPTOR) {
                return Err(ImportTargetError::NotDescriptor {
                    path: path.to_owned(),
                });
            }
            return Ok(Self {
                path: path.to_owned(),
                synthesized: false,
            });
        }

        if contains_descriptor(path) {
            return Ok(Self {
                path: path.to_owned(),
                synthesized: false,
            });
        }

        let descriptor = path.join(PROJECT_DESCRIPTOR);
        debug!("writing {descriptor}");
        descriptors.register(descriptor.clone());
        write_project_descriptor(&descriptor).map_err(|err| {
            ImportTargetError::DescriptorWrite {
                path: path.to_owned(),
                descriptor,
                err,
            }
        })?;

        Ok(Self {
            path: path.to_owned(),
            synthesized: true,
        })
    }

    /// Returns the path passed to `soatestcli -import`.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns true if a `.project` descriptor was generated for this target.
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }
}

/// Returns true if `dir` has a `.project` file directly inside it, or anywhere in its tree.
///
/// Errors while walking the tree are logged, and the search ends as if nothing was found.
fn contains_descriptor(dir: &Utf8Path) -> bool {
    if dir.join(PROJECT_DESCRIPTOR).is_file() {
        return true;
    }

    for entry in WalkDir::new(dir) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && entry.file_name() == PROJECT_DESCRIPTOR {
                    debug!("found project descriptor at {}", entry.path().display());
                    return true;
                }
            }
            Err(err) => {
                warn!("error searching `{dir}` for {PROJECT_DESCRIPTOR} files: {err}");
                return false;
            }
        }
    }

    false
}

/// Writes a minimal Eclipse project descriptor to `path`, named after its parent directory.
pub fn write_project_descriptor(path: &Utf8Path) -> io::Result<()> {
    let name = path
        .parent()
        .and_then(|parent| parent.file_name())
        .unwrap_or_default();
    let mut writer = BufWriter::new(fs::File::create(path)?);
    serialize_project_descriptor(name, &mut writer)?;
    writer.flush()
}

fn serialize_project_descriptor(name: &str, writer: impl Write) -> io::Result<()> {
    let mut writer = Writer::new_with_indent(writer, b' ', 2);

    let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
    writer.write_event(Event::Decl(decl))?;

    writer.write_event(Event::Start(BytesStart::new(PROJECT_DESCRIPTION_TAG)))?;

    writer.write_event(Event::Start(BytesStart::new(NAME_TAG)))?;
    writer.write_event(Event::Text(BytesText::new(name)))?;
    writer.write_event(Event::End(BytesEnd::new(NAME_TAG)))?;

    for tag in EMPTY_TAGS {
        writer.write_event(Event::Empty(BytesStart::new(*tag)))?;
    }

    writer.write_event(Event::End(BytesEnd::new(PROJECT_DESCRIPTION_TAG)))?;

    // Add a trailing newline.
    writer.write_indent()
}

/// Tracks the `.project` descriptors generated for a run, and removes them once the run is done.
///
/// Descriptors are removed by [`remove_all`](Self::remove_all), or when this is dropped.
#[derive(Debug, Default)]
pub struct SyntheticDescriptors {
    paths: Vec<Utf8PathBuf>,
}

impl SyntheticDescriptors {
    /// Creates an empty set of descriptors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the descriptors that will be removed.
    pub fn paths(&self) -> &[Utf8PathBuf] {
        &self.paths
    }

    fn register(&mut self, path: Utf8PathBuf) {
        self.paths.push(path);
    }

    /// Removes every registered descriptor. Failures are logged.
    pub fn remove_all(&mut self) {
        if self.paths.is_empty() {
            return;
        }

        let count = self.paths.len();
        for path in self.paths.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => {}
                // The descriptor might not have been written in the first place.
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!("{err}"),
            }
        }
        debug!(
            "removed {count} generated {PROJECT_DESCRIPTOR} {}",
            plural::files_str(count)
        );
    }
}

impl Drop for SyntheticDescriptors {
    fn drop(&mut self) {
        self.remove_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn temp_dir() -> Utf8TempDir {
        Utf8TempDir::new().expect("created temp dir")
    }

    #[test]
    fn missing_target() {
        let dir = temp_dir();
        let mut descriptors = SyntheticDescriptors::new();
        let missing = dir.path().join("missing");
        let error = ImportTarget::prepare(&missing, &mut descriptors).expect_err("target missing");
        assert!(matches!(error, ImportTargetError::NotFound { path } if path == missing));
        assert!(descriptors.paths().is_empty());
    }

    #[test]
    fn file_target_must_be_descriptor() {
        let dir = temp_dir();
        let mut descriptors = SyntheticDescriptors::new();

        let other = dir.path().join("pom.xml");
        std::fs::write(&other, "<project/>").unwrap();
        let error = ImportTarget::prepare(&other, &mut descriptors).expect_err("not a descriptor");
        assert!(matches!(error, ImportTargetError::NotDescriptor { path } if path == other));

        let descriptor = dir.path().join(".project");
        std::fs::write(&descriptor, "<projectDescription/>").unwrap();
        let target = ImportTarget::prepare(&descriptor, &mut descriptors).expect("is a descriptor");
        assert_eq!(target.path(), descriptor);
        assert!(!target.is_synthesized());
        assert!(descriptors.paths().is_empty());
    }

    #[test]
    fn directory_with_descriptor() {
        let dir = temp_dir();
        std::fs::write(dir.path().join(".project"), "<projectDescription/>").unwrap();

        let mut descriptors = SyntheticDescriptors::new();
        let target = ImportTarget::prepare(dir.path(), &mut descriptors).expect("prepared");
        assert!(!target.is_synthesized());
        assert!(descriptors.paths().is_empty());
    }

    #[test]
    fn directory_with_nested_descriptor() {
        let dir = temp_dir();
        let nested = dir.path().join("tests/soatest/api");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join(".project"), "<projectDescription/>").unwrap();

        let mut descriptors = SyntheticDescriptors::new();
        let target = ImportTarget::prepare(dir.path(), &mut descriptors).expect("prepared");
        assert!(!target.is_synthesized());
        assert!(!dir.path().join(".project").exists());
    }

    #[test]
    fn descriptor_named_directory_does_not_count() {
        let dir = temp_dir();
        std::fs::create_dir_all(dir.path().join("sub/.project")).unwrap();

        let mut descriptors = SyntheticDescriptors::new();
        let target = ImportTarget::prepare(dir.path(), &mut descriptors).expect("prepared");
        assert!(target.is_synthesized());
    }

    #[test]
    fn synthesized_descriptor_is_removed() {
        let dir = temp_dir();
        let project = dir.path().join("my-tests");
        std::fs::create_dir(&project).unwrap();

        let descriptor = project.join(".project");
        {
            let mut descriptors = SyntheticDescriptors::new();
            let target = ImportTarget::prepare(&project, &mut descriptors).expect("prepared");
            assert!(target.is_synthesized());
            assert_eq!(target.path(), project);
            assert_eq!(descriptors.paths(), [descriptor.clone()]);

            let contents = std::fs::read_to_string(&descriptor).expect("descriptor written");
            assert_eq!(
                contents,
                indoc! {r#"
                    <?xml version="1.0" encoding="UTF-8"?>
                    <projectDescription>
                      <name>my-tests</name>
                      <comment/>
                      <projects/>
                      <buildSpec/>
                      <natures/>
                    </projectDescription>
                "#}
            );
        }
        assert!(!descriptor.exists(), "descriptor removed on drop");
        assert!(project.is_dir());
    }

    #[test]
    fn remove_all_is_idempotent() {
        let dir = temp_dir();
        let mut descriptors = SyntheticDescriptors::new();
        ImportTarget::prepare(dir.path(), &mut descriptors).expect("prepared");
        let descriptor = dir.path().join(".project");
        assert!(descriptor.is_file());

        descriptors.remove_all();
        assert!(!descriptor.exists());
        assert!(descriptors.paths().is_empty());
        descriptors.remove_all();
    }

    #[test]
    fn descriptor_name_is_escaped() {
        let mut out = Vec::new();
        serialize_project_descriptor("a&b", &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("<name>a&amp;b</name>"), "{out}");
    }
}
