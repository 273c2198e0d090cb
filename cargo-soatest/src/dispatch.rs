// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{
    ExpectedError,
    errors::Result,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use soatest_metadata::SoatestExitCode;
use soatest_runner::{
    config::{ConfigOverrides, SoatestConfig},
    runner::{ProcessExecutor, RunOutcome, SoatestRunner},
    signal::SignalHandlerKind,
};
use std::io::Write;
use tracing::{info, warn};

/// Runs SOAtest functional tests through soatestcli.
///
/// This binary should typically be invoked as `cargo soatest` (in which case
/// this message will not be seen), not `cargo-soatest`.
#[derive(Debug, Parser)]
#[command(
    version,
    bin_name = "cargo",
    styles = crate::output::clap_styles::style(),
    max_term_width = 100
)]
pub struct CargoSoatestApp {
    #[command(subcommand)]
    subcommand: SoatestSubcommand,
}

impl CargoSoatestApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        match &self.subcommand {
            SoatestSubcommand::Soatest(app) => app.output.init(),
        }
    }

    /// Executes the app.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let SoatestSubcommand::Soatest(app) = self.subcommand;
        app.exec(output, output_writer)
    }
}

#[derive(Debug, Subcommand)]
enum SoatestSubcommand {
    /// Runs SOAtest functional tests through soatestcli.
    Soatest(Box<AppOpts>),
}

#[derive(Debug, Args)]
#[command(version)]
struct AppOpts {
    #[command(flatten)]
    common: CommonOpts,

    #[command(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Command,
}

impl AppOpts {
    fn exec(self, _output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let current_dir = current_dir()?;
        let project_dir = self.common.project_dir(&current_dir);

        match self.command {
            Command::Run { settings } => {
                let config = self
                    .common
                    .make_config(&project_dir, &settings, soatest_home_env())?;
                let runner = SoatestRunner::new(&config, project_dir, current_dir);
                let mut executor = ProcessExecutor::new(SignalHandlerKind::Standard)?;

                match runner.execute(&mut executor)? {
                    RunOutcome::Skipped => {}
                    RunOutcome::Completed { aggregate: None } => {
                        info!("soatestcli finished, no XML report was found");
                    }
                    RunOutcome::Completed {
                        aggregate: Some(aggregate),
                    } => {
                        info!(
                            "soatestcli finished: {} functional tests, {} failed",
                            aggregate.total(),
                            aggregate.failed()
                        );
                    }
                }
                Ok(SoatestExitCode::OK)
            }
            Command::ShowCommand { settings } => {
                let config = self
                    .common
                    .make_config(&project_dir, &settings, soatest_home_env())?;
                let runner = SoatestRunner::new(&config, project_dir, current_dir);
                let planned = runner.planned_commands()?;

                let mut writer = output_writer.stdout_writer();
                for command in planned.imports.iter().chain(std::iter::once(&planned.run)) {
                    writeln!(writer, "{}", command.to_shell_string())
                        .map_err(ExpectedError::write_output_error)?;
                }
                writer.flush().map_err(ExpectedError::write_output_error)?;
                Ok(SoatestExitCode::OK)
            }
        }
    }
}

#[derive(Debug, Args)]
struct CommonOpts {
    /// Project directory [default: current directory]
    ///
    /// Relative paths in the config are resolved against this directory.
    #[arg(long, global = true, value_name = "DIR")]
    project_dir: Option<Utf8PathBuf>,

    /// Config file [default: <project-dir>/.config/soatest.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl CommonOpts {
    fn project_dir(&self, current_dir: &Utf8Path) -> Utf8PathBuf {
        match &self.project_dir {
            Some(dir) => current_dir.join(dir),
            None => current_dir.to_owned(),
        }
    }

    fn make_config(
        &self,
        project_dir: &Utf8Path,
        settings: &SettingsOpts,
        soatest_home_env: Option<Utf8PathBuf>,
    ) -> Result<SoatestConfig> {
        let mut config = SoatestConfig::from_sources(project_dir, self.config_file.as_deref())?;
        settings.to_overrides(soatest_home_env).apply(&mut config);
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import projects and run a test configuration
    ///
    /// Each project is imported into the workspace with `soatestcli -import`, then the test
    /// configuration is run with `soatestcli -config`. If a summary file is configured, the
    /// functional test totals from the XML report are written to it in failsafe format.
    Run {
        #[command(flatten)]
        settings: SettingsOpts,
    },

    /// Print the soatestcli commands a run would execute
    ///
    /// Nothing is imported or run, and no workspace or project descriptor is created.
    ShowCommand {
        #[command(flatten)]
        settings: SettingsOpts,
    },
}

/// Settings that override the config file.
#[derive(Debug, Default, Args)]
#[command(next_help_heading = "SOATEST OPTIONS")]
struct SettingsOpts {
    /// SOAtest installation directory [default: $SOATEST_HOME if not set in the config file]
    #[arg(long, value_name = "DIR")]
    soatest_home: Option<Utf8PathBuf>,

    /// Java installation used to run soatestcli
    #[arg(long, value_name = "DIR")]
    java_home: Option<Utf8PathBuf>,

    /// Workspace directory [default: a temporary directory]
    #[arg(long, value_name = "DIR")]
    data: Option<Utf8PathBuf>,

    /// Test configuration to run, e.g. `user://Example Configuration`
    #[arg(long, value_name = "CONFIG")]
    config: Option<String>,

    /// Report file or directory
    #[arg(long, value_name = "PATH")]
    report: Option<Utf8PathBuf>,

    /// Settings file passed to soatestcli
    #[arg(long, value_name = "PATH")]
    settings: Option<Utf8PathBuf>,

    /// Write a failsafe summary of the XML report to this file
    #[arg(long, value_name = "PATH")]
    summary_file: Option<Utf8PathBuf>,

    /// Name of a single test to run
    #[arg(long, value_name = "PATTERN")]
    test: Option<String>,

    /// Project to import (can be specified multiple times) [default: project directory]
    #[arg(long = "import", value_name = "PATH")]
    import: Vec<Utf8PathBuf>,

    /// Resource to test (can be specified multiple times)
    #[arg(long = "resource", value_name = "PATH")]
    resources: Vec<String>,

    /// Setting passed to soatestcli as -property (can be specified multiple times)
    #[arg(
        long = "property",
        short = 'P',
        value_name = "KEY=VALUE",
        value_parser = parse_property
    )]
    properties: Vec<(String, String)>,

    /// Skip the run
    #[arg(long)]
    skip: bool,

    /// Do not import projects before running
    #[arg(long)]
    no_import: bool,

    /// Make soatestcli fail if any test fails
    #[arg(long)]
    fail: bool,

    /// Publish reports to DTP
    #[arg(long)]
    publish: bool,
}

impl SettingsOpts {
    fn to_overrides(&self, soatest_home_env: Option<Utf8PathBuf>) -> ConfigOverrides {
        ConfigOverrides {
            soatest_home: self.soatest_home.clone(),
            soatest_home_fallback: soatest_home_env,
            java_home: self.java_home.clone(),
            data: self.data.clone(),
            config: self.config.clone(),
            report: self.report.clone(),
            settings: self.settings.clone(),
            summary_file: self.summary_file.clone(),
            test: self.test.clone(),
            import: self.import.clone(),
            resources: self.resources.clone(),
            properties: self.properties.clone(),
            skip: self.skip,
            no_import: self.no_import,
            fail: self.fail,
            publish: self.publish,
        }
    }
}

fn parse_property(input: &str) -> std::result::Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.to_owned()))
        }
        _ => Err(format!("expected KEY=VALUE, found `{input}`")),
    }
}

static SOATEST_HOME_ENV: &str = "SOATEST_HOME";

fn soatest_home_env() -> Option<Utf8PathBuf> {
    let value = std::env::var_os(SOATEST_HOME_ENV)?;
    match Utf8PathBuf::try_from(std::path::PathBuf::from(value)) {
        Ok(path) => Some(path),
        Err(err) => {
            warn!(
                "ignoring {SOATEST_HOME_ENV}: `{}` is not valid UTF-8",
                err.as_path().display()
            );
            None
        }
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|err| ExpectedError::GetCurrentDirFailed { err })?;
    Utf8PathBuf::try_from(dir).map_err(|err| ExpectedError::CurrentDirInvalidUtf8 { err })
}
