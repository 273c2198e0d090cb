// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Errors produced by soatest-runner.

use crate::{command::SoatestCommand, signal::ShutdownEvent};
use camino::{Utf8Path, Utf8PathBuf};
use config::ConfigError;
use std::fmt;
use thiserror::Error;

/// An error that occurred while reading the soatest config.
#[derive(Debug, Error)]
#[error("failed to parse soatest config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// A required setting was not provided.
#[derive(Clone, Debug, Error)]
#[error("`{field}` must be set ({hint})")]
pub struct ConfigValidationError {
    field: &'static str,
    hint: &'static str,
}

impl ConfigValidationError {
    pub(crate) fn missing(field: &'static str, hint: &'static str) -> Self {
        Self { field, hint }
    }

    /// Returns the name of the missing setting.
    pub fn field(&self) -> &'static str {
        self.field
    }
}

/// An error that occurred while creating a temporary workspace.
#[derive(Debug, Error)]
#[error("failed to create temporary workspace")]
pub struct WorkspaceCreateError {
    #[source]
    err: std::io::Error,
}

impl WorkspaceCreateError {
    pub(crate) fn new(err: std::io::Error) -> Self {
        Self { err }
    }
}

/// An import target could not be prepared for `soatestcli -import`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportTargetError {
    /// The import target does not exist.
    #[error("project to import does not exist: `{path}`")]
    NotFound {
        /// The path that was looked up.
        path: Utf8PathBuf,
    },

    /// The import target is a file, but not a `.project` file.
    #[error("project to import must be a directory or a `.project` file: `{path}`")]
    NotDescriptor {
        /// The path that was looked up.
        path: Utf8PathBuf,
    },

    /// A `.project` file could not be generated for a directory without one.
    #[error("failed to write `{descriptor}` for project `{path}`")]
    DescriptorWrite {
        /// The directory being imported.
        path: Utf8PathBuf,

        /// The descriptor file that was being written.
        descriptor: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}

/// An error that occurred while running `soatestcli`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommandError {
    /// The process could not be started.
    #[error("failed to execute `{command}`")]
    Exec {
        /// The command, shell-quoted.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// Waiting for the process failed.
    #[error("failed to wait for `{command}`")]
    Wait {
        /// The command, shell-quoted.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The process exited with a non-zero code, or was terminated by a signal.
    #[error(
        "soatestcli returned exit code {}",
        .exit_code.map_or_else(|| "<terminated by signal>".to_owned(), |code| code.to_string()),
    )]
    Failed {
        /// The command, shell-quoted.
        command: String,

        /// The exit code, if the process exited normally.
        exit_code: Option<i32>,
    },

    /// A shutdown signal was received while waiting for the process, and the process was
    /// terminated.
    #[error("interrupted by {event} while waiting for soatestcli")]
    Interrupted {
        /// The command, shell-quoted.
        command: String,

        /// The signal that was received.
        event: ShutdownEvent,
    },
}

impl CommandError {
    pub(crate) fn exec(command: &SoatestCommand, err: std::io::Error) -> Self {
        Self::Exec {
            command: command.to_shell_string(),
            err,
        }
    }

    pub(crate) fn wait(command: &SoatestCommand, err: std::io::Error) -> Self {
        Self::Wait {
            command: command.to_shell_string(),
            err,
        }
    }

    pub(crate) fn failed(command: &SoatestCommand, exit_code: Option<i32>) -> Self {
        Self::Failed {
            command: command.to_shell_string(),
            exit_code,
        }
    }

    pub(crate) fn interrupted(command: &SoatestCommand, event: ShutdownEvent) -> Self {
        Self::Interrupted {
            command: command.to_shell_string(),
            event,
        }
    }

    /// Returns the shell-quoted command line this error is for.
    pub fn command(&self) -> &str {
        match self {
            Self::Exec { command, .. }
            | Self::Wait { command, .. }
            | Self::Failed { command, .. }
            | Self::Interrupted { command, .. } => command,
        }
    }
}

/// An error that occurred while reading an XML report produced by `soatestcli`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportParseError {
    /// The report could not be opened.
    #[error("failed to open XML report `{path}`")]
    Open {
        /// The report path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The report is not well-formed XML.
    #[error("failed to parse XML report{}", DisplayReportPath(.path.as_deref()))]
    Xml {
        /// The report path, if reading from a file.
        path: Option<Utf8PathBuf>,

        /// The underlying error.
        #[source]
        err: quick_xml::Error,
    },
}

struct DisplayReportPath<'a>(Option<&'a Utf8Path>);

impl fmt::Display for DisplayReportPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(path) => write!(f, " `{path}`"),
            None => Ok(()),
        }
    }
}

/// An error that occurred while writing a failsafe summary.
#[derive(Debug, Error)]
#[error("failed to write failsafe summary to `{path}`")]
pub struct SummaryWriteError {
    path: Utf8PathBuf,
    #[source]
    err: std::io::Error,
}

impl SummaryWriteError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, err: std::io::Error) -> Self {
        Self {
            path: path.into(),
            err,
        }
    }

    /// Returns the summary path.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// An error that occurred while setting up the signal handler.
#[derive(Debug, Error)]
#[error("error setting up signal handler")]
pub struct SignalHandlerSetupError(#[from] std::io::Error);

/// An error that occurred while building a [`ProcessExecutor`](crate::runner::ProcessExecutor).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProcessExecutorBuildError {
    /// The async runtime used to wait on child processes could not be created.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] std::io::Error),

    /// The signal handler could not be installed.
    #[error("error setting up signals")]
    SignalHandlerSetupError(#[from] SignalHandlerSetupError),
}

/// An error that aborted a `soatestcli` run.
///
/// Cleanup of the temporary workspace and of generated `.project` files has always happened by
/// the time this error is returned.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// A required setting is missing.
    #[error(transparent)]
    ConfigValidation(#[from] ConfigValidationError),

    /// The temporary workspace could not be created.
    #[error(transparent)]
    WorkspaceCreate(#[from] WorkspaceCreateError),

    /// An import target was invalid.
    #[error(transparent)]
    ImportTarget(#[from] ImportTargetError),

    /// `soatestcli -import` failed.
    #[error("importing `{target}` failed")]
    Import {
        /// The project being imported.
        target: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: CommandError,
    },

    /// `soatestcli -config` failed.
    #[error("running test configuration failed")]
    TestConfig(#[source] CommandError),

    /// The failsafe summary could not be written.
    #[error(transparent)]
    SummaryWrite(#[from] SummaryWriteError),

    /// A shutdown signal was received between `soatestcli` commands.
    #[error("interrupted by {event}")]
    Interrupted {
        /// The signal that was received.
        event: ShutdownEvent,
    },
}
