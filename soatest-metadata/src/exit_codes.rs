// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

/// Documented exit codes for `cargo soatest` failures.
///
/// `cargo soatest` runs may fail for a variety of reasons. This structure documents the exit codes
/// that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum SoatestExitCode {}

impl SoatestExitCode {
    /// No errors occurred and `soatestcli` exited normally.
    pub const OK: i32 = 0;

    /// `soatestcli` exited with a non-zero code while running the test configuration.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Importing a project into the workspace failed, either because the import target was
    /// invalid or because `soatestcli -import` exited with a non-zero code.
    pub const IMPORT_FAILED: i32 = 101;

    /// `soatestcli` could not be started.
    pub const EXEC_FAILED: i32 = 102;

    /// The failsafe summary could not be written.
    pub const REPORT_FAILED: i32 = 104;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// The run was interrupted by a signal and `soatestcli` was terminated.
    pub const INTERRUPTED: i32 = 130;

    /// A user issue happened while setting up a `cargo soatest` invocation: a required setting
    /// is missing, the config file is malformed, or the workspace could not be created.
    pub const SETUP_ERROR: i32 = 96;
}
