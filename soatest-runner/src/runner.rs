// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Running `soatestcli`.
//!
//! A run consists of:
//!
//! 1. Acquiring a workspace.
//! 2. Archiving reports left over from a previous run.
//! 3. Importing each project into the workspace, with one `soatestcli -import` per project.
//! 4. Running the test configuration.
//! 5. Reading the XML report, and writing a failsafe summary if configured.
//!
//! The temporary workspace and any generated `.project` descriptors are removed at the end of the
//! run, whether it succeeded or not.
//!
//! The main structure in this module is [`SoatestRunner`].

use crate::{
    command::{SoatestCommand, SoatestCommandBuilder},
    config::SoatestConfig,
    errors::{CommandError, ConfigValidationError, ProcessExecutorBuildError, RunError},
    helpers::{absolutize, plural},
    import::{ImportTarget, SyntheticDescriptors},
    report::{ReportAggregate, ReportLocation},
    signal::{ShutdownEvent, SignalHandler, SignalHandlerKind},
    workspace::{EPHEMERAL_WORKSPACE_PREFIX, WorkspaceDir},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use itertools::Itertools;
use std::{error::Error, process::Stdio};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Runs a single `soatestcli` command to completion.
///
/// [`ProcessExecutor`] is the implementation that spawns real processes.
pub trait CommandExecutor {
    /// Runs `command`, returning an error if it couldn't be run or didn't succeed.
    fn execute(&mut self, command: &SoatestCommand) -> Result<(), CommandError>;

    /// Returns a shutdown signal that arrived while no command was running, if any.
    fn pending_shutdown(&mut self) -> Option<ShutdownEvent> {
        None
    }
}

/// Spawns `soatestcli` as a child process sharing this process's standard streams.
///
/// If a shutdown signal is received while the child is running, the child is killed and the
/// command fails with [`CommandError::Interrupted`].
#[derive(Debug)]
pub struct ProcessExecutor {
    signal_handler: SignalHandler,
    runtime: Runtime,
}

impl ProcessExecutor {
    /// Creates a new executor.
    pub fn new(signal_handler: SignalHandlerKind) -> Result<Self, ProcessExecutorBuildError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ProcessExecutorBuildError::TokioRuntimeCreate)?;
        let signal_handler = {
            let _guard = runtime.enter();
            // signal_handler.build() must be called from within the guard.
            signal_handler.build()?
        };

        Ok(Self {
            signal_handler,
            runtime,
        })
    }
}

impl CommandExecutor for ProcessExecutor {
    fn execute(&mut self, command: &SoatestCommand) -> Result<(), CommandError> {
        debug!("running command:\n{}", command.tokens().join("\n"));

        let mut cmd = tokio::process::Command::new(command.program());
        cmd.args(command.args())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let signal_handler = &mut self.signal_handler;
        self.runtime.block_on(async move {
            let mut child = cmd.spawn().map_err(|err| CommandError::exec(command, err))?;

            let event = tokio::select! {
                status = child.wait() => {
                    let status = status.map_err(|err| CommandError::wait(command, err))?;
                    return if status.success() {
                        Ok(())
                    } else {
                        Err(CommandError::failed(command, status.code()))
                    };
                }
                Some(event) = signal_handler.recv() => event,
            };

            warn!("received {event}, terminating soatestcli");
            if let Err(err) = child.kill().await {
                warn!("failed to terminate soatestcli: {err}");
            }
            Err(CommandError::interrupted(command, event))
        })
    }

    fn pending_shutdown(&mut self) -> Option<ShutdownEvent> {
        let signal_handler = &mut self.signal_handler;
        self.runtime.block_on(async move {
            // Yielding lets the driver deliver signals that are already queued before giving up.
            tokio::select! {
                biased;
                Some(event) = signal_handler.recv() => Some(event),
                () = tokio::task::yield_now() => None,
            }
        })
    }
}

/// The result of a [`SoatestRunner::execute`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run was skipped because `skip` is set.
    Skipped,

    /// The test configuration was run.
    Completed {
        /// Totals from the XML report, or `None` if no report was found.
        aggregate: Option<ReportAggregate>,
    },
}

/// The commands a run would execute, as returned by [`SoatestRunner::planned_commands`].
#[derive(Clone, Debug)]
pub struct PlannedCommands {
    /// One `soatestcli -import` per project, in order.
    pub imports: Vec<SoatestCommand>,

    /// The command that runs the test configuration.
    pub run: SoatestCommand,
}

/// Runs `soatestcli` against a project.
#[derive(Debug)]
pub struct SoatestRunner<'cfg> {
    config: &'cfg SoatestConfig,
    project_dir: Utf8PathBuf,
    current_dir: Utf8PathBuf,
}

impl<'cfg> SoatestRunner<'cfg> {
    /// Creates a new runner.
    ///
    /// Relative paths in `config` are resolved against `project_dir`. `current_dir` is where
    /// `soatestcli` writes its reports if `report` isn't set.
    pub fn new(
        config: &'cfg SoatestConfig,
        project_dir: impl Into<Utf8PathBuf>,
        current_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            config,
            project_dir: project_dir.into(),
            current_dir: current_dir.into(),
        }
    }

    /// Returns where the XML report for this run is expected.
    pub fn report_location(&self) -> ReportLocation {
        let report = self
            .config
            .report
            .as_deref()
            .map(|report| absolutize(&self.project_dir, report));
        ReportLocation::resolve(report.as_deref(), &self.current_dir)
    }

    /// Returns the commands a run would execute, without changing anything on disk.
    ///
    /// If no workspace is configured, the path of the temporary workspace is a placeholder.
    pub fn planned_commands(&self) -> Result<PlannedCommands, ConfigValidationError> {
        let soatest_home = self.config.validate()?;
        let workspace = match &self.config.data {
            Some(data) => data.clone(),
            None => Utf8PathBuf::from_path_buf(std::env::temp_dir())
                .unwrap_or_default()
                .join(format!("{EPHEMERAL_WORKSPACE_PREFIX}XXXXXX")),
        };

        let builder =
            SoatestCommandBuilder::new(self.config, soatest_home, &workspace, &self.project_dir);
        let imports = if self.config.no_import {
            Vec::new()
        } else {
            self.import_targets()
                .iter()
                .map(|target| builder.import_command(target))
                .collect()
        };

        Ok(PlannedCommands {
            imports,
            run: builder.run_command(),
        })
    }

    /// Performs a run.
    ///
    /// Cleanup happens before this returns, on success and on failure.
    pub fn execute(&self, executor: &mut impl CommandExecutor) -> Result<RunOutcome, RunError> {
        if self.config.skip {
            info!("skipping SOAtest run (skip is set)");
            return Ok(RunOutcome::Skipped);
        }

        let soatest_home = self.config.validate()?;
        let explicit_workspace = self
            .config
            .data
            .as_deref()
            .map(|data| absolutize(&self.project_dir, data));
        let workspace = WorkspaceDir::acquire(explicit_workspace.as_deref())?;
        debug!("using workspace `{}`", workspace.path());

        let mut descriptors = SyntheticDescriptors::new();
        let res = self.execute_inner(soatest_home, &workspace, &mut descriptors, executor);

        descriptors.remove_all();
        workspace.close();

        res
    }

    fn execute_inner(
        &self,
        soatest_home: &Utf8Path,
        workspace: &WorkspaceDir,
        descriptors: &mut SyntheticDescriptors,
        executor: &mut impl CommandExecutor,
    ) -> Result<RunOutcome, RunError> {
        let builder = SoatestCommandBuilder::new(
            self.config,
            soatest_home,
            workspace.path(),
            &self.project_dir,
        );

        let location = self.report_location();
        location.archive_existing_reports(Local::now().naive_local());

        self.run_imports(&builder, descriptors, executor)?;

        check_for_shutdown(executor)?;
        info!(
            "running test configuration `{}`",
            self.config.config.as_deref().unwrap_or_default()
        );
        executor
            .execute(&builder.run_command())
            .map_err(RunError::TestConfig)?;

        check_for_shutdown(executor)?;
        let aggregate = self.read_report(&location)?;
        check_for_shutdown(executor)?;
        Ok(RunOutcome::Completed { aggregate })
    }

    fn import_targets(&self) -> Vec<Utf8PathBuf> {
        if self.config.import.is_empty() {
            vec![self.project_dir.clone()]
        } else {
            self.config
                .import
                .iter()
                .map(|target| absolutize(&self.project_dir, target))
                .collect()
        }
    }

    fn run_imports(
        &self,
        builder: &SoatestCommandBuilder<'_>,
        descriptors: &mut SyntheticDescriptors,
        executor: &mut impl CommandExecutor,
    ) -> Result<(), RunError> {
        if self.config.no_import {
            debug!("skipping import");
            return Ok(());
        }

        let targets = self.import_targets();
        debug!(
            "importing {} {}",
            targets.len(),
            plural::projects_str(targets.len())
        );
        for path in targets {
            let target = ImportTarget::prepare(&path, descriptors)?;
            check_for_shutdown(executor)?;
            info!("importing `{}`", target.path());
            executor
                .execute(&builder.import_command(target.path()))
                .map_err(|err| RunError::Import {
                    target: target.path().to_owned(),
                    err,
                })?;
        }

        Ok(())
    }

    fn read_report(&self, location: &ReportLocation) -> Result<Option<ReportAggregate>, RunError> {
        let xml_report = location.xml_report();
        let aggregate = if xml_report.is_file() {
            info!("found XML report `{xml_report}`");
            // A report that can't be read counts as a report without functional tests.
            let aggregate = ReportAggregate::parse_report_xml(xml_report).unwrap_or_else(|err| {
                match err.source() {
                    Some(source) => warn!("{err}: {source}"),
                    None => warn!("{err}"),
                }
                ReportAggregate::default()
            });
            debug!(
                "{} functional tests run, {} failed",
                aggregate.total(),
                aggregate.failed()
            );
            Some(aggregate)
        } else {
            debug!("XML report `{xml_report}` not found");
            None
        };

        if let Some(summary_file) = &self.config.summary_file {
            let summary_file = absolutize(&self.project_dir, summary_file);
            aggregate
                .unwrap_or_default()
                .write_failsafe_summary(&summary_file)?;
            debug!("wrote failsafe summary to `{summary_file}`");
        }

        Ok(aggregate)
    }
}

fn check_for_shutdown(executor: &mut impl CommandExecutor) -> Result<(), RunError> {
    match executor.pending_shutdown() {
        Some(event) => {
            warn!("received {event}, stopping run");
            Err(RunError::Interrupted { event })
        }
        None => Ok(()),
    }
}
