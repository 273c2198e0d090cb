// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runs soatest-runner against a fake `soatestcli`.
//!
//! Everything is in a single test: writing an executable while another thread forks can cause
//! `ETXTBSY` when the executable is later run.

#![cfg(unix)]

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use indoc::indoc;
use pretty_assertions::assert_eq;
use soatest_runner::{
    config::SoatestConfig,
    errors::{CommandError, RunError},
    report::ReportAggregate,
    runner::{ProcessExecutor, RunOutcome, SoatestRunner},
    signal::{ShutdownEvent, SignalHandlerKind},
};
use std::{
    os::unix::fs::PermissionsExt,
    process::Command,
    time::{Duration, Instant},
};

static FAKE_SOATESTCLI: &str = indoc! {r#"
    #!/bin/sh
    home=$(dirname "$0")
    printf '%s\n' "$*" >> "$home/invocations.log"
    [ -f "$home/fail" ] && exit 7

    report=""
    while [ $# -gt 0 ]; do
      case "$1" in
        -import)
          [ -f "$2/.project" ] || exit 3
          shift
          ;;
        -report)
          report="$2"
          shift
          ;;
      esac
      shift
    done

    if [ -n "$report" ]; then
      mkdir -p "$report"
      cat > "$report/report.xml" <<'XML'
    <?xml version="1.0" encoding="UTF-8"?>
    <ResultsSession>
      <ExecutedTestsDetails type="FT" functional="true">
        <Total total="10" pass="8" fail="2"/>
      </ExecutedTestsDetails>
    </ResultsSession>
    XML
    fi
"#};

// Records its pid once it has started, then waits to be killed.
static SLOW_SOATESTCLI: &str = indoc! {r#"
    #!/bin/sh
    home=$(dirname "$0")
    printf '%s\n' "$*" >> "$home/invocations.log"
    echo $$ > "$home/pid.tmp" && mv "$home/pid.tmp" "$home/pid"
    exec sleep 60
"#};

fn install_fake_soatestcli(home: &Utf8Path, script: &str) {
    std::fs::create_dir_all(home).unwrap();
    let path = home.join("soatestcli");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn process_exists(pid: &str) -> bool {
    Command::new("kill")
        .args(["-0", pid])
        .stderr(std::process::Stdio::null())
        .status()
        .expect("ran kill")
        .success()
}

fn read_invocations(home: &Utf8Path) -> Vec<String> {
    std::fs::read_to_string(home.join("invocations.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn run_fake_soatestcli() {
    let root = Utf8TempDir::new().expect("created temp dir");
    let home = root.path().join("home");
    let slow_home = root.path().join("slow-home");
    let project_dir = root.path().join("project");
    std::fs::create_dir(&project_dir).unwrap();
    install_fake_soatestcli(&home, FAKE_SOATESTCLI);
    install_fake_soatestcli(&slow_home, SLOW_SOATESTCLI);

    let mut config = SoatestConfig {
        soatest_home: Some(home.clone()),
        config: Some("builtin://Demo Configuration".to_owned()),
        report: Some("reports".into()),
        summary_file: Some("target/failsafe-reports/failsafe-summary.xml".into()),
        ..Default::default()
    };
    let mut executor =
        ProcessExecutor::new(SignalHandlerKind::Noop).expect("created process executor");

    // A successful run.
    let outcome = SoatestRunner::new(&config, &project_dir, root.path())
        .execute(&mut executor)
        .expect("run succeeded");
    assert_eq!(
        outcome,
        RunOutcome::Completed {
            aggregate: Some(ReportAggregate::new(10, 2))
        }
    );

    let invocations = read_invocations(&home);
    assert_eq!(invocations.len(), 2, "{invocations:?}");
    assert!(
        invocations[0].ends_with(&format!("-import {project_dir}")),
        "{invocations:?}"
    );
    assert!(
        invocations[1].contains("-config builtin://Demo Configuration"),
        "{invocations:?}"
    );
    assert!(!project_dir.join(".project").exists());

    let summary =
        std::fs::read_to_string(project_dir.join("target/failsafe-reports/failsafe-summary.xml"))
            .expect("summary written");
    assert_eq!(
        summary,
        indoc! {r#"
            <?xml version="1.0" encoding="UTF-8"?>
            <failsafe-summary result="FAILURE" timeout="false">
              <completed>10</completed>
              <errors>0</errors>
              <failures>2</failures>
              <skipped>0</skipped>
              <failureMessage></failureMessage>
            </failsafe-summary>
        "#}
    );

    // soatestcli fails: the exit code is reported and the generated descriptor is removed.
    std::fs::write(home.join("fail"), "").unwrap();
    let error = SoatestRunner::new(&config, &project_dir, root.path())
        .execute(&mut executor)
        .expect_err("import failed");
    assert!(
        matches!(
            &error,
            RunError::Import {
                err: CommandError::Failed {
                    exit_code: Some(7),
                    ..
                },
                ..
            }
        ),
        "{error:?}"
    );
    assert!(!project_dir.join(".project").exists());

    // soatestcli is missing.
    config.soatest_home = Some(root.path().join("no-such-home"));
    let error = SoatestRunner::new(&config, &project_dir, root.path())
        .execute(&mut executor)
        .expect_err("soatestcli is missing");
    assert!(
        matches!(
            &error,
            RunError::Import {
                err: CommandError::Exec { .. },
                ..
            }
        ),
        "{error:?}"
    );

    // SIGTERM while soatestcli is running: the child is killed and the workspace is removed.
    config.soatest_home = Some(slow_home.clone());
    config.no_import = true;
    config.summary_file = None;
    let mut executor =
        ProcessExecutor::new(SignalHandlerKind::Standard).expect("created process executor");

    let pid_file = slow_home.join("pid");
    let signaller = std::thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(30);
        while !pid_file.exists() {
            assert!(Instant::now() < deadline, "soatestcli did not start");
            std::thread::sleep(Duration::from_millis(10));
        }
        let status = Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .expect("ran kill");
        assert!(status.success(), "sent SIGTERM");
    });

    let error = SoatestRunner::new(&config, &project_dir, root.path())
        .execute(&mut executor)
        .expect_err("run was interrupted");
    signaller.join().expect("signaller thread succeeded");
    assert!(
        matches!(
            &error,
            RunError::TestConfig(CommandError::Interrupted {
                event: ShutdownEvent::Term,
                ..
            })
        ),
        "{error:?}"
    );

    let pid = std::fs::read_to_string(slow_home.join("pid")).expect("pid recorded");
    assert!(!process_exists(pid.trim()), "soatestcli was killed");

    let invocations = read_invocations(&slow_home);
    let workspace = invocations[0]
        .split_whitespace()
        .skip_while(|arg| *arg != "-data")
        .nth(1)
        .expect("-data was passed");
    assert!(
        workspace.contains("soatest.workspace"),
        "temporary workspace: {workspace}"
    );
    assert!(!Utf8Path::new(workspace).exists(), "workspace was removed");
}
