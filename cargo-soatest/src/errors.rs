// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use owo_colors::OwoColorize;
use soatest_metadata::SoatestExitCode;
use soatest_runner::errors::*;
use std::error::Error;
use thiserror::Error;
use tracing::{error, info};

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An expected failure of `cargo soatest`: bad settings, or a failure reported by `soatestcli`.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    GetCurrentDirFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 {
        #[source]
        err: camino::FromPathBufError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("config validation error")]
    ConfigValidationError {
        #[from]
        err: ConfigValidationError,
    },
    #[error("process executor build error")]
    ProcessExecutorBuildError {
        #[from]
        err: ProcessExecutorBuildError,
    },
    #[error("run error")]
    RunError {
        #[from]
        err: RunError,
    },
    #[error("error writing to output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn write_output_error(err: std::io::Error) -> Self {
        Self::WriteOutputError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::GetCurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::ConfigValidationError { .. }
            | Self::ProcessExecutorBuildError { .. } => SoatestExitCode::SETUP_ERROR,
            Self::RunError { err } => run_error_exit_code(err),
            Self::WriteOutputError { .. } => SoatestExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::GetCurrentDirFailed { err } => {
                error!("could not determine current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { err } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    err.as_path().display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse soatest config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ConfigValidationError { err } => {
                error!("{err}");
                None
            }
            Self::ProcessExecutorBuildError { err } => {
                error!("failed to set up process execution");
                Some(err as &dyn Error)
            }
            Self::RunError { err } => display_run_error(err, styles),
            Self::WriteOutputError { err } => {
                error!("error writing to output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

fn run_error_exit_code(err: &RunError) -> i32 {
    match err {
        RunError::ConfigValidation(_) | RunError::WorkspaceCreate(_) => {
            SoatestExitCode::SETUP_ERROR
        }
        RunError::ImportTarget(_) => SoatestExitCode::IMPORT_FAILED,
        RunError::Import { err, .. } => {
            command_error_exit_code(err).unwrap_or(SoatestExitCode::IMPORT_FAILED)
        }
        RunError::TestConfig(err) => {
            command_error_exit_code(err).unwrap_or(SoatestExitCode::TEST_RUN_FAILED)
        }
        RunError::SummaryWrite(_) => SoatestExitCode::REPORT_FAILED,
        RunError::Interrupted { .. } => SoatestExitCode::INTERRUPTED,
        _ => SoatestExitCode::SETUP_ERROR,
    }
}

/// Returns the exit code for command errors that aren't specific to a phase.
fn command_error_exit_code(err: &CommandError) -> Option<i32> {
    match err {
        CommandError::Exec { .. } => Some(SoatestExitCode::EXEC_FAILED),
        CommandError::Interrupted { .. } => Some(SoatestExitCode::INTERRUPTED),
        _ => None,
    }
}

fn display_run_error<'a>(err: &'a RunError, styles: &StderrStyles) -> Option<&'a dyn Error> {
    match err {
        RunError::Import { target, err } => {
            error!("importing `{}` failed", target.style(styles.bold));
            display_command_error(err, styles)
        }
        RunError::TestConfig(err) => {
            error!("running test configuration failed");
            display_command_error(err, styles)
        }
        RunError::SummaryWrite(err) => {
            error!(
                "failed to write failsafe summary to `{}`",
                err.path().style(styles.bold)
            );
            err.source()
        }
        other => {
            error!("{other}");
            other.source()
        }
    }
}

fn display_command_error<'a>(err: &'a CommandError, styles: &StderrStyles) -> Option<&'a dyn Error> {
    info!(
        target: NO_HEADING_TARGET,
        "  (command: {})",
        err.command().style(styles.bold)
    );
    Some(err as &dyn Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use soatest_runner::config::SoatestConfig;

    #[test]
    fn exit_codes() {
        let config = SoatestConfig::default();
        let err = ExpectedError::from(config.validate().expect_err("home is missing"));
        assert_eq!(err.process_exit_code(), SoatestExitCode::SETUP_ERROR);

        let err = ExpectedError::from(RunError::ImportTarget(ImportTargetError::NotFound {
            path: "missing".into(),
        }));
        assert_eq!(err.process_exit_code(), SoatestExitCode::IMPORT_FAILED);

        let err = ExpectedError::from(RunError::Interrupted {
            event: soatest_runner::signal::ShutdownEvent::Interrupt,
        });
        assert_eq!(err.process_exit_code(), SoatestExitCode::INTERRUPTED);

        let err = ExpectedError::write_output_error(std::io::ErrorKind::BrokenPipe.into());
        assert_eq!(err.process_exit_code(), SoatestExitCode::WRITE_OUTPUT_ERROR);
    }
}
