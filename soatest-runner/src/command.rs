// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Building `soatestcli` command lines.
//!
//! Every invocation starts with the same base segment:
//!
//! ```text
//! <soatest-home>/soatestcli [-Zjava_home <path>] [-J<vm-arg>]* -data <workspace> [-settings <path>]
//! ```
//!
//! which is followed either by `-import <project>` (once per imported project), or by
//! `-config <id>` and the options that select and configure the tests to run. Options are always
//! emitted in the same order, so a given configuration always produces the same command line.

use crate::{
    config::{SoatestConfig, TestFilter},
    helpers::{absolutize, non_blank},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        /// The file name of the `soatestcli` executable on this platform.
        pub const SOATESTCLI_EXE: &str = "soatestcli.exe";
    } else {
        /// The file name of the `soatestcli` executable on this platform.
        pub const SOATESTCLI_EXE: &str = "soatestcli";
    }
}

/// Returns the path to `soatestcli` within a SOAtest installation.
pub fn soatestcli_path(soatest_home: &Utf8Path) -> Utf8PathBuf {
    soatest_home.join(SOATESTCLI_EXE)
}

/// A `soatestcli` command line: the program followed by its arguments, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoatestCommand {
    program: Utf8PathBuf,
    args: Vec<String>,
}

impl SoatestCommand {
    /// Returns the program to run.
    pub fn program(&self) -> &Utf8Path {
        &self.program
    }

    /// Returns the arguments passed to the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the full token sequence, starting with the program.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(|arg| arg.as_str()))
    }

    /// Returns the command line as a single shell-quoted string, for display.
    pub fn to_shell_string(&self) -> String {
        shell_words::join(self.tokens())
    }
}

impl fmt::Display for SoatestCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

/// Builds `soatestcli` command lines from a [`SoatestConfig`].
///
/// The builder never touches the file system: relative paths in the config are resolved lexically
/// against the project directory.
#[derive(Clone, Debug)]
pub struct SoatestCommandBuilder<'cfg> {
    config: &'cfg SoatestConfig,
    project_dir: &'cfg Utf8Path,
    base: SoatestCommand,
}

impl<'cfg> SoatestCommandBuilder<'cfg> {
    /// Creates a new builder.
    ///
    /// `soatest_home` is the installation location, and `workspace` is the Eclipse workspace
    /// passed as `-data`. Both are resolved against `project_dir` if relative.
    pub fn new(
        config: &'cfg SoatestConfig,
        soatest_home: &Utf8Path,
        workspace: &Utf8Path,
        project_dir: &'cfg Utf8Path,
    ) -> Self {
        let program = soatestcli_path(&absolutize(project_dir, soatest_home));
        let mut args = ArgsBuilder::new(project_dir);
        args.path("-Zjava_home", config.java_home.as_deref());
        for vm_arg in &config.vm_args {
            args.push(format!("-J{vm_arg}"));
        }
        args.path("-data", Some(workspace));
        args.path("-settings", config.settings.as_deref());

        Self {
            config,
            project_dir,
            base: SoatestCommand {
                program,
                args: args.finish(),
            },
        }
    }

    /// Returns the command shared by every invocation.
    pub fn base_command(&self) -> &SoatestCommand {
        &self.base
    }

    /// Returns the command that imports the project at `target` into the workspace.
    pub fn import_command(&self, target: &Utf8Path) -> SoatestCommand {
        let mut command = self.base.clone();
        let mut args = ArgsBuilder::new(self.project_dir);
        args.path("-import", Some(target));
        command.args.extend(args.finish());
        command
    }

    /// Returns the command that runs the configured test configuration.
    pub fn run_command(&self) -> SoatestCommand {
        let config = self.config;
        let mut args = ArgsBuilder::new(self.project_dir);

        // An empty test configuration is rejected by `SoatestConfig::validate` before any
        // command is run, so -config is always emitted.
        args.push("-config");
        args.push(config.config.as_deref().unwrap_or_default());
        args.string("-appconsole", config.appconsole.as_deref());
        args.flag("-nobuild", config.no_build);
        args.flag("-publish", config.publish);
        args.flag("-refresh", config.refresh);
        args.flag("-showdetails", config.show_details);
        args.path("-dataGroupConfig", config.data_group_config.as_deref());
        args.string("-dataSourceRow", config.data_source_row.as_deref());
        args.string("-dataSourceName", config.data_source_name.as_deref());
        args.flag("-fail", config.fail);
        args.string("-environment", config.environment.as_deref());
        args.path("-environmentConfig", config.environment_config.as_deref());
        args.flag("-showsettings", config.show_settings);
        args.string("-prefs", config.prefs.as_deref());
        args.path("-report", config.report.as_deref());
        args.strings("-include", &config.includes);
        args.string("-include", config.test.as_deref());
        args.strings("-exclude", &config.excludes);
        args.strings("-resource", &config.resources);
        args.path("-impactedTests", config.impacted_tests.as_deref());
        for (key, value) in &config.properties {
            args.string("-property", Some(format!("{key}={value}").as_str()));
        }
        if !config.work_items.is_empty() {
            args.string("-workItems", Some(config.work_items.join(",").as_str()));
        }
        for filter in &config.test_filters {
            args.test_filter(filter);
        }

        let mut command = self.base.clone();
        command.args.extend(args.finish());
        command
    }
}

/// Accumulates arguments, skipping options whose values are unset.
struct ArgsBuilder<'a> {
    project_dir: &'a Utf8Path,
    args: Vec<String>,
}

impl<'a> ArgsBuilder<'a> {
    fn new(project_dir: &'a Utf8Path) -> Self {
        Self {
            project_dir,
            args: Vec::new(),
        }
    }

    fn push(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    fn flag(&mut self, name: &str, value: bool) {
        if value {
            self.push(name);
        }
    }

    fn string(&mut self, name: &str, value: Option<&str>) {
        if let Some(value) = non_blank(value) {
            self.push(name);
            self.push(value);
        }
    }

    fn strings(&mut self, name: &str, values: &[String]) {
        for value in values {
            self.string(name, Some(value));
        }
    }

    fn path(&mut self, name: &str, value: Option<&Utf8Path>) {
        if let Some(value) = value {
            self.push(name);
            self.push(absolutize(self.project_dir, value).into_string());
        }
    }

    fn test_filter(&mut self, filter: &TestFilter) {
        let Some(test_name) = non_blank(filter.test_name.as_deref()) else {
            return;
        };
        self.push("-testName");
        if filter.substring_match {
            self.push("match:");
        }
        self.push(test_name);
        self.string("dataSourceRow:", filter.data_source_row.as_deref());
        self.string("dataSourceName:", filter.data_source_name.as_deref());
    }

    fn finish(self) -> Vec<String> {
        self.args
    }
}
