//! Unit tests for the CLI runner and the lifecycle controller.

use std::ffi::OsString;
use std::fs;
use std::process::ExitCode;

use fleet_config::LifecycleMode;
use rstest::rstest;

use super::support::{FakeHost, TestFleet, buffered_output, test_fleet};
use crate::CliRunner;
use crate::lifecycle::{FleetLifecycle, LifecycleError, TcpProbe};

struct CliRun {
    exit: ExitCode,
    stdout: String,
    stderr: String,
    host: FakeHost,
}

fn run_cli(args: &[&str]) -> CliRun {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut host = FakeHost::default();
    let argv = std::iter::once("fleet")
        .chain(args.iter().copied())
        .map(OsString::from);
    let exit = CliRunner::new(&mut stdout, &mut stderr)
        .without_telemetry()
        .run(argv, &mut host, TcpProbe::default());
    CliRun {
        exit,
        stdout: String::from_utf8(stdout).expect("stdout utf8"),
        stderr: String::from_utf8(stderr).expect("stderr utf8"),
        host,
    }
}

#[test]
fn unknown_command_exits_with_two() {
    let run = run_cli(&["stopServers"]);
    assert_eq!(run.exit, ExitCode::from(2));
    assert!(run.stderr.contains("stopServers"));
    assert!(run.host.runs.is_empty());
}

#[test]
fn help_goes_to_stdout_and_succeeds() {
    let run = run_cli(&["--help"]);
    assert_eq!(run.exit, ExitCode::SUCCESS);
    assert!(run.stdout.contains("startServers"));
}

#[rstest]
fn test_command_runs_suites_in_project_root(test_fleet: TestFleet) {
    let run = run_cli(&["test", "--project-root", test_fleet.root().as_str()]);
    assert_eq!(run.exit, ExitCode::SUCCESS, "stderr: {}", run.stderr);
    assert_eq!(run.host.runs, ["npm run test", "npx playwright test"]);
}

#[rstest]
fn kill_servers_reaps_and_removes_container(test_fleet: TestFleet) {
    let run = run_cli(&["killServers", "--project-root", test_fleet.root().as_str()]);
    assert_eq!(run.exit, ExitCode::SUCCESS, "stderr: {}", run.stderr);
    assert_eq!(run.host.runs_of("pgrep").len(), 4);
    assert_eq!(run.host.runs_of("docker"), ["docker rm --force modbus2mqtt-e2e"]);
    assert!(run.stdout.contains("::group::E2E cleanup"));
}

#[rstest]
fn start_docker_uses_requested_image(test_fleet: TestFleet) {
    let run = run_cli(&[
        "startdocker",
        "--docker-image",
        "example/gateway:dev",
        "--project-root",
        test_fleet.root().as_str(),
    ]);
    assert_eq!(run.exit, ExitCode::SUCCESS, "stderr: {}", run.stderr);
    assert!(
        run.host
            .runs
            .contains(&String::from("docker pull example/gateway:dev"))
    );
}

#[rstest]
fn missing_lib_dir_fails_start_with_two(test_fleet: TestFleet) {
    let run = run_cli(&[
        "startServers",
        "--permanent",
        "--project-root",
        test_fleet.root().as_str(),
        "--proxy-binary",
        "sh",
        "--proxy-lib-dir",
        "/nonexistent/fleet/proxy-lib",
    ]);
    assert_eq!(run.exit, ExitCode::from(2));
    assert!(run.stderr.contains("/nonexistent/fleet/proxy-lib directory not found"));
    assert!(run.host.spawned.is_empty());
}

#[rstest]
fn run_brings_fleet_up_and_removes_capture(test_fleet: TestFleet) {
    let mut host = FakeHost::default();
    let mut output = buffered_output();
    let mut lifecycle = FleetLifecycle::new(&test_fleet.config, &mut host, TcpProbe::default());

    let fleet = lifecycle
        .run(LifecycleMode::Full, false, &mut output)
        .expect("fleet comes up");

    assert_eq!(fleet.handles.len(), 6);
    assert!(!test_fleet.config.paths.capture_file().exists());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert!(stdout.contains("All required ports are open."));

    let report = lifecycle.shutdown(&fleet);
    assert_eq!(report.terminated.len(), 6);
    assert_eq!(lifecycle.host().running_count(), 0);
}

#[rstest]
fn restart_reaps_previous_members_before_launching(test_fleet: TestFleet) {
    let mut host = FakeHost::default();
    let mut output = buffered_output();
    let mut lifecycle = FleetLifecycle::new(&test_fleet.config, &mut host, TcpProbe::default());

    lifecycle
        .run(LifecycleMode::RestartOnly, false, &mut output)
        .expect("first start");
    lifecycle
        .run(LifecycleMode::RestartOnly, true, &mut output)
        .expect("restart rebinds the same ports");

    assert_eq!(lifecycle.host().running_count(), 4);
    assert_eq!(lifecycle.host().terminated.len(), 4);
}

#[rstest]
fn port_timeout_keeps_capture_and_members(test_fleet: TestFleet) {
    let mut host = FakeHost::default();
    host.never_bind(test_fleet.config.ports.broker_no_auth);
    let mut output = buffered_output();
    let mut lifecycle = FleetLifecycle::new(&test_fleet.config, &mut host, TcpProbe::default());

    let error = lifecycle
        .run(LifecycleMode::Full, false, &mut output)
        .expect_err("broker port never opens");

    let LifecycleError::PortTimeout { ports, .. } = error else {
        panic!("expected a port timeout, got {error:?}");
    };
    assert_eq!(ports, [test_fleet.config.ports.broker_no_auth]);
    assert!(test_fleet.config.paths.capture_file().exists());
    assert_eq!(lifecycle.host().running_count(), 6);
    let capture = fs::read_to_string(test_fleet.config.paths.capture_file()).expect("capture");
    assert!(capture.contains("failed to bind port"));
    let stderr = String::from_utf8(output.stderr).expect("utf8");
    assert!(stderr.contains("failed to bind port"));
}
