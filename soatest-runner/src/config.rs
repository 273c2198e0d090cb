// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration for `cargo soatest`.
//!
//! The configuration record is assembled from three layers, lowest priority first:
//!
//! 1. the default config shipped with this crate ([`SoatestConfig::DEFAULT_CONFIG`]),
//! 2. the repository config (`.config/soatest.toml`, or an explicitly provided file),
//! 3. command-line overrides ([`ConfigOverrides`]).
//!
//! Once assembled, a [`SoatestConfig`] is treated as immutable.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind, ConfigValidationError},
    helpers::non_blank,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use indexmap::IndexMap;
use serde::Deserialize;

/// The configuration record for a single `soatestcli` invocation sequence.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SoatestConfig {
    /// Skips running SOAtest entirely.
    #[serde(default)]
    pub skip: bool,

    /// The location of the SOAtest installation. Required.
    pub soatest_home: Option<Utf8PathBuf>,

    /// An alternative Java runtime for starting SOAtest (`-Zjava_home`).
    pub java_home: Option<Utf8PathBuf>,

    /// Additional JVM options, each passed as `-J<arg>`.
    #[serde(default)]
    pub vm_args: Vec<String>,

    /// The Eclipse workspace to run tests in. A temporary workspace is created and removed
    /// afterwards if this isn't set.
    pub data: Option<Utf8PathBuf>,

    /// Skips importing projects into the workspace.
    #[serde(default)]
    pub no_import: bool,

    /// The projects to import into the workspace. Defaults to the project directory.
    #[serde(default)]
    pub import: Vec<Utf8PathBuf>,

    /// The test configuration to run, e.g. `soatest.builtin://Demo Configuration`. Required.
    pub config: Option<String>,

    /// Where to print the text that would be shown in the Console view: `stdout` or a file path.
    pub appconsole: Option<String>,

    /// Disables building of projects before executing the tests.
    #[serde(default)]
    pub no_build: bool,

    /// Refreshes the workspace, forcing it to resync with the file system.
    #[serde(default)]
    pub refresh: bool,

    /// Prints detailed test progress information.
    #[serde(default)]
    pub show_details: bool,

    /// An XML file specifying the active data source for each data group.
    pub data_group_config: Option<Utf8PathBuf>,

    /// The name of the data source associated with the tests to run.
    pub data_source_name: Option<String>,

    /// The data source rows to run with, e.g. `1,2,5` or `2-5,7`.
    pub data_source_row: Option<String>,

    /// The SOAtest environment to run the tests with.
    pub environment: Option<String>,

    /// An XML file specifying the active environment variables for each test.
    pub environment_config: Option<Utf8PathBuf>,

    /// Makes soatestcli return a non-zero exit code if any violations are reported.
    #[serde(default)]
    pub fail: bool,

    /// Prints the current settings and where they were configured.
    #[serde(default)]
    pub show_settings: bool,

    /// An Eclipse workspace preferences file or URL to import.
    pub prefs: Option<String>,

    /// Publishes reports to DTP.
    #[serde(default)]
    pub publish: bool,

    /// Where to generate the report: a `.xml`/`.html` file, or a directory.
    pub report: Option<Utf8PathBuf>,

    /// A `.properties` file with custom configuration settings.
    pub settings: Option<Utf8PathBuf>,

    /// Patterns matching files to include during testing.
    #[serde(default)]
    pub includes: Vec<String>,

    /// Patterns matching files to exclude during testing.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Settings that override those in [`settings`](Self::settings), in the order they are
    /// passed to soatestcli.
    #[serde(default)]
    pub properties: IndexMap<String, String>,

    /// The test suites to run, relative to the workspace.
    #[serde(default)]
    pub resources: Vec<String>,

    /// Limits the run to resources associated with these work items.
    #[serde(default)]
    pub work_items: Vec<String>,

    /// A single `.tst` file name, path or pattern to include; useful for debugging one test.
    pub test: Option<String>,

    /// Runs tests impacted by change, against this baseline coverage report.
    pub impacted_tests: Option<Utf8PathBuf>,

    /// Filters matching the names of tests to run.
    #[serde(default)]
    pub test_filters: Vec<TestFilter>,

    /// Where to write a failsafe summary derived from the XML report. No summary is written if
    /// this isn't set.
    pub summary_file: Option<Utf8PathBuf>,
}

impl SoatestConfig {
    /// The location of the repository config, relative to the project directory.
    pub const CONFIG_PATH: &'static str = ".config/soatest.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the given file, or if not present from `.config/soatest.toml` in the
    /// given project directory.
    ///
    /// If the file isn't specified and the directory doesn't have `.config/soatest.toml`, uses the
    /// default config options.
    pub fn from_sources(
        project_dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = project_dir.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file, kind))
    }

    /// Returns the default config, with no repository config applied.
    pub fn default_config() -> Self {
        Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid")
    }

    /// Checks that the settings required to run soatestcli are present.
    ///
    /// Returns the installation directory on success.
    pub fn validate(&self) -> Result<&Utf8Path, ConfigValidationError> {
        let soatest_home = self
            .soatest_home
            .as_deref()
            .filter(|home| !home.as_str().trim().is_empty())
            .ok_or_else(|| {
                ConfigValidationError::missing(
                    "soatest-home",
                    "set it in .config/soatest.toml, pass --soatest-home, or set SOATEST_HOME",
                )
            })?;
        if non_blank(self.config.as_deref()).is_none() {
            return Err(ConfigValidationError::missing(
                "config",
                "set it in .config/soatest.toml or pass --config",
            ));
        }
        Ok(soatest_home)
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<Self, ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|err| ConfigParseErrorKind::BuildError(Box::new(err)))?;

        serde_path_to_error::deserialize(config)
            .map_err(|err| ConfigParseErrorKind::DeserializeError(Box::new(err)))
    }
}

/// A filter matching the name of a test to run, passed as `-testName`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TestFilter {
    /// The name of the test or test suite. Filters without a name are ignored.
    pub test_name: Option<String>,

    /// Runs every test whose name contains `test_name`, rather than only exact matches.
    #[serde(default)]
    pub substring_match: bool,

    /// Limits the data source rows the test is run with.
    pub data_source_row: Option<String>,

    /// The data source that `data_source_row` refers to.
    pub data_source_name: Option<String>,
}

/// Settings provided on the command line, applied on top of the config files.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Overrides [`SoatestConfig::soatest_home`].
    pub soatest_home: Option<Utf8PathBuf>,
    /// Used for [`SoatestConfig::soatest_home`] only if neither the config files nor
    /// `soatest_home` set it. Typically read from `SOATEST_HOME`.
    pub soatest_home_fallback: Option<Utf8PathBuf>,
    /// Overrides [`SoatestConfig::java_home`].
    pub java_home: Option<Utf8PathBuf>,
    /// Overrides [`SoatestConfig::data`].
    pub data: Option<Utf8PathBuf>,
    /// Overrides [`SoatestConfig::config`].
    pub config: Option<String>,
    /// Overrides [`SoatestConfig::report`].
    pub report: Option<Utf8PathBuf>,
    /// Overrides [`SoatestConfig::settings`].
    pub settings: Option<Utf8PathBuf>,
    /// Overrides [`SoatestConfig::summary_file`].
    pub summary_file: Option<Utf8PathBuf>,
    /// Overrides [`SoatestConfig::test`].
    pub test: Option<String>,
    /// Replaces [`SoatestConfig::import`] if non-empty.
    pub import: Vec<Utf8PathBuf>,
    /// Replaces [`SoatestConfig::resources`] if non-empty.
    pub resources: Vec<String>,
    /// Added to (or replacing entries in) [`SoatestConfig::properties`].
    pub properties: Vec<(String, String)>,
    /// Sets [`SoatestConfig::skip`] if true.
    pub skip: bool,
    /// Sets [`SoatestConfig::no_import`] if true.
    pub no_import: bool,
    /// Sets [`SoatestConfig::fail`] if true.
    pub fail: bool,
    /// Sets [`SoatestConfig::publish`] if true.
    pub publish: bool,
}

impl ConfigOverrides {
    /// Applies these overrides to `config`.
    pub fn apply(&self, config: &mut SoatestConfig) {
        fn set<T: Clone>(target: &mut Option<T>, value: Option<&T>) {
            if let Some(value) = value {
                *target = Some(value.clone());
            }
        }

        set(&mut config.soatest_home, self.soatest_home.as_ref());
        if non_blank(config.soatest_home.as_deref().map(Utf8Path::as_str)).is_none() {
            set(&mut config.soatest_home, self.soatest_home_fallback.as_ref());
        }
        set(&mut config.java_home, self.java_home.as_ref());
        set(&mut config.data, self.data.as_ref());
        set(&mut config.config, self.config.as_ref());
        set(&mut config.report, self.report.as_ref());
        set(&mut config.settings, self.settings.as_ref());
        set(&mut config.summary_file, self.summary_file.as_ref());
        set(&mut config.test, self.test.as_ref());

        if !self.import.is_empty() {
            config.import = self.import.clone();
        }
        if !self.resources.is_empty() {
            config.resources = self.resources.clone();
        }
        for (key, value) in &self.properties {
            config.properties.insert(key.clone(), value.clone());
        }

        config.skip |= self.skip;
        config.no_import |= self.no_import;
        config.fail |= self.fail;
        config.publish |= self.publish;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn temp_project(contents: &str) -> Utf8TempDir {
        let dir = camino_tempfile::Builder::new()
            .prefix("soatest-config-")
            .tempdir()
            .expect("created temp dir");
        std::fs::create_dir_all(dir.path().join(".config")).expect("created .config");
        std::fs::write(dir.path().join(SoatestConfig::CONFIG_PATH), contents)
            .expect("wrote config");
        dir
    }

    #[test]
    fn default_config_is_valid() {
        let config = SoatestConfig::default_config();
        assert_eq!(config, SoatestConfig::default());
    }

    #[test]
    fn missing_repo_config_uses_defaults() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let config = SoatestConfig::from_sources(dir.path(), None).expect("config is valid");
        assert_eq!(config, SoatestConfig::default());
    }

    #[test]
    fn repo_config_is_layered_over_defaults() {
        let dir = temp_project(indoc! {r#"
            soatest-home = "/opt/parasoft/soatest"
            config = "soatest.builtin://Demo Configuration"
            vm-args = ["-Xmx8g", "-Dssl.debug=true"]
            publish = true
            work-items = ["TEST-7140", "TEST-16447"]

            [properties]
            "techsupport.auto_creation" = "true"
            "report.dtp.publish" = "false"

            [[test-filters]]
            test-name = "MyTest"
            substring-match = true
            data-source-row = "1"

            [[test-filters]]
            test-name = "WSDL Tests"
        "#});

        let config = SoatestConfig::from_sources(dir.path(), None).expect("config is valid");
        assert_eq!(
            config.soatest_home.as_deref(),
            Some(Utf8Path::new("/opt/parasoft/soatest"))
        );
        assert_eq!(
            config.config.as_deref(),
            Some("soatest.builtin://Demo Configuration")
        );
        assert_eq!(config.vm_args, ["-Xmx8g", "-Dssl.debug=true"]);
        assert!(config.publish);
        assert!(!config.fail, "default is kept");
        assert_eq!(config.work_items, ["TEST-7140", "TEST-16447"]);

        let properties: Vec<_> = config
            .properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            properties,
            [
                ("techsupport.auto_creation", "true"),
                ("report.dtp.publish", "false"),
            ],
            "properties preserve their order"
        );

        assert_eq!(
            config.test_filters,
            [
                TestFilter {
                    test_name: Some("MyTest".to_owned()),
                    substring_match: true,
                    data_source_row: Some("1".to_owned()),
                    data_source_name: None,
                },
                TestFilter {
                    test_name: Some("WSDL Tests".to_owned()),
                    ..Default::default()
                },
            ]
        );
        config.validate().expect("required settings are present");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let dir = temp_project(indoc! {r#"
            soatest-home = "/opt/parasoft/soatest"
            no-such-setting = true
        "#});

        let error = SoatestConfig::from_sources(dir.path(), None).expect_err("unknown field");
        assert_eq!(
            error.config_file(),
            dir.path().join(SoatestConfig::CONFIG_PATH)
        );
        assert!(
            matches!(error.kind(), ConfigParseErrorKind::DeserializeError(_)),
            "unexpected error kind: {:?}",
            error.kind()
        );
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let missing = dir.path().join("missing.toml");
        let error =
            SoatestConfig::from_sources(dir.path(), Some(&missing)).expect_err("file is missing");
        assert_eq!(error.config_file(), missing);
        assert!(matches!(error.kind(), ConfigParseErrorKind::BuildError(_)));
    }

    #[test]
    fn validate_requires_home_and_config() {
        let mut config = SoatestConfig::default();
        assert_eq!(
            config.validate().expect_err("home missing").field(),
            "soatest-home"
        );

        config.soatest_home = Some("/opt/parasoft/soatest".into());
        assert_eq!(
            config.validate().expect_err("config missing").field(),
            "config"
        );

        config.config = Some("   ".to_owned());
        assert_eq!(
            config.validate().expect_err("blank config").field(),
            "config"
        );

        config.config = Some("user://Example Configuration".to_owned());
        config.validate().expect("valid");
    }

    #[test]
    fn overrides_are_applied_last() {
        let mut config = SoatestConfig {
            soatest_home: Some("/opt/a".into()),
            report: Some("reports".into()),
            import: vec!["project1".into()],
            properties: [("a".to_owned(), "1".to_owned())].into_iter().collect(),
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            soatest_home: Some("/opt/b".into()),
            import: vec!["project2".into(), "project3".into()],
            properties: vec![
                ("b".to_owned(), "2".to_owned()),
                ("a".to_owned(), "3".to_owned()),
            ],
            fail: true,
            ..Default::default()
        };
        overrides.apply(&mut config);

        assert_eq!(config.soatest_home.as_deref(), Some(Utf8Path::new("/opt/b")));
        assert_eq!(
            config.report.as_deref(),
            Some(Utf8Path::new("reports")),
            "unset overrides keep the config value"
        );
        assert_eq!(
            config.import,
            [Utf8PathBuf::from("project2"), Utf8PathBuf::from("project3")]
        );
        let properties: Vec<_> = config
            .properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(properties, [("a", "3"), ("b", "2")]);
        assert!(config.fail);
        assert!(!config.skip);
    }

    #[test]
    fn soatest_home_fallback_is_lowest_priority() {
        let fallback = ConfigOverrides {
            soatest_home_fallback: Some("/opt/from-env".into()),
            ..Default::default()
        };

        let mut config = SoatestConfig {
            soatest_home: Some("/opt/from-file".into()),
            ..Default::default()
        };
        fallback.apply(&mut config);
        assert_eq!(
            config.soatest_home.as_deref(),
            Some(Utf8Path::new("/opt/from-file")),
            "the config file wins over the fallback"
        );

        let mut config = SoatestConfig::default();
        ConfigOverrides {
            soatest_home: Some("/opt/from-cli".into()),
            ..fallback.clone()
        }
        .apply(&mut config);
        assert_eq!(
            config.soatest_home.as_deref(),
            Some(Utf8Path::new("/opt/from-cli")),
            "the command line wins over the fallback"
        );

        for home in [None, Some(" ")] {
            let mut config = SoatestConfig {
                soatest_home: home.map(Utf8PathBuf::from),
                ..Default::default()
            };
            fallback.apply(&mut config);
            assert_eq!(
                config.soatest_home.as_deref(),
                Some(Utf8Path::new("/opt/from-env")),
                "the fallback fills in a missing or blank home ({home:?})"
            );
        }
    }
}
