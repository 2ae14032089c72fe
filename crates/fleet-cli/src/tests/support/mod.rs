//! Test support utilities for fleet lifecycle coverage.
//!
//! Supplies a throwaway project root laid out like a gateway checkout, a fake
//! process host, and the behaviour-test world so step definitions and unit
//! tests remain focused on their assertions.

mod fake_host;

use std::cell::RefCell;
use std::fs;
use std::io;
use std::net::TcpListener;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, ensure};
use camino::{Utf8Path, Utf8PathBuf};
use fleet_config::{FleetConfig, LifecycleMode, PortTable};
use rstest::fixture;
use tempfile::TempDir;

use crate::lifecycle::{
    FleetLifecycle, LifecycleCommand, LifecycleError, LifecycleInvocation, LifecycleOutput,
    TcpProbe,
};

pub(crate) use fake_host::FakeHost;

const PROXY_TEMPLATE: &str = "http {\n    include mime.types;\n}\n";

/// Project root in a temporary directory with every fixture file the
/// launcher reads, wired to ephemeral ports.
pub(crate) struct TestFleet {
    _root: TempDir,
    pub config: FleetConfig,
}

impl TestFleet {
    pub(crate) fn new() -> Result<Self> {
        let root = TempDir::new().context("create project root")?;
        let root_path = Utf8PathBuf::from_path_buf(root.path().to_path_buf())
            .map_err(|path| anyhow!("temporary root {} is not UTF-8", path.display()))?;

        let mut config = FleetConfig::for_project_root(root_path.clone());
        config.ports = ephemeral_ports().context("allocate ports")?;
        config.probe_host = String::from("127.0.0.1");
        config.max_port_retries = 3;
        config.poll_interval = Duration::from_millis(10);
        config.proxy_binary = String::from("sh");
        config.build_command = ["sh", "-c", "true"].into_iter().map(String::from).collect();
        config.proxy_lib_dir = root_path.join("proxy-lib");
        config.mime_types = root_path.join("mime.types");

        fs::create_dir_all(&config.proxy_lib_dir).context("create proxy lib dir")?;
        fs::write(&config.mime_types, "types {}\n").context("write mime types")?;
        let template = config.paths.proxy_template();
        let template_dir = template
            .parent()
            .context("proxy template has a parent directory")?;
        fs::create_dir_all(template_dir).context("create template dir")?;
        fs::write(&template, PROXY_TEMPLATE).context("write proxy template")?;

        Ok(Self {
            _root: root,
            config,
        })
    }

    pub(crate) fn root(&self) -> &Utf8Path {
        self.config.paths.root()
    }
}

/// Reserves seven distinct free ports by holding their listeners at once.
fn ephemeral_ports() -> io::Result<PortTable> {
    let listeners = (0..7)
        .map(|_| TcpListener::bind(("127.0.0.1", 0)))
        .collect::<io::Result<Vec<_>>>()?;
    let ports = listeners
        .iter()
        .map(|listener| listener.local_addr().map(|address| address.port()))
        .collect::<io::Result<Vec<_>>>()?;
    let [
        simulator,
        proxy,
        broker,
        broker_no_auth,
        gateway_ingress,
        gateway,
        gateway_no_auth,
    ] = ports[..]
    else {
        return Err(io::Error::other("expected seven ports"));
    };
    Ok(PortTable {
        simulator,
        proxy,
        broker,
        broker_no_auth,
        gateway_ingress,
        gateway,
        gateway_no_auth,
    })
}

/// Buffered lifecycle output.
pub(crate) type BufferedOutput = LifecycleOutput<Vec<u8>, Vec<u8>>;

pub(crate) fn buffered_output() -> BufferedOutput {
    LifecycleOutput::new(Vec::new(), Vec::new())
}

#[derive(Default)]
pub(crate) struct TestWorld {
    pub fleet: Option<TestFleet>,
    pub host: FakeHost,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub outcome: Option<Result<(), LifecycleError>>,
}

impl TestWorld {
    pub fn prepare_fleet(&mut self) -> Result<()> {
        self.fleet = Some(TestFleet::new()?);
        Ok(())
    }

    pub fn fleet(&self) -> Result<&TestFleet> {
        self.fleet.as_ref().context("fixture project not prepared")
    }

    pub fn config_mut(&mut self) -> Result<&mut FleetConfig> {
        self.fleet
            .as_mut()
            .map(|fleet| &mut fleet.config)
            .context("fixture project not prepared")
    }

    pub fn run(&mut self, command: LifecycleCommand, mode: LifecycleMode) -> Result<()> {
        self.stdout.clear();
        self.stderr.clear();
        let fleet = self
            .fleet
            .as_ref()
            .context("fixture project not prepared")?;
        let mut output = LifecycleOutput::new(&mut self.stdout, &mut self.stderr);
        let mut lifecycle = FleetLifecycle::new(&fleet.config, &mut self.host, TcpProbe::default());
        self.outcome = Some(lifecycle.handle(LifecycleInvocation { command, mode }, &mut output));
        Ok(())
    }

    pub fn stdout_text(&self) -> Result<String> {
        String::from_utf8(self.stdout.clone()).context("stdout utf8")
    }

    pub fn stderr_text(&self) -> Result<String> {
        String::from_utf8(self.stderr.clone()).context("stderr utf8")
    }

    pub fn assert_succeeded(&self) -> Result<()> {
        match &self.outcome {
            Some(Ok(())) => Ok(()),
            Some(Err(error)) => Err(anyhow!("lifecycle failed: {error}")),
            None => Err(anyhow!("lifecycle was not run")),
        }
    }

    pub fn error(&self) -> Result<&LifecycleError> {
        match &self.outcome {
            Some(Err(error)) => Ok(error),
            Some(Ok(())) => Err(anyhow!("lifecycle unexpectedly succeeded")),
            None => Err(anyhow!("lifecycle was not run")),
        }
    }

    pub fn assert_spawned_exactly(&self, expected: &[&str]) -> Result<()> {
        ensure!(
            self.host.spawned == expected,
            "spawned {:?}, expected {:?}",
            self.host.spawned,
            expected
        );
        Ok(())
    }
}

#[fixture]
pub(crate) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}

#[fixture]
pub(crate) fn test_fleet() -> TestFleet {
    TestFleet::new().expect("prepare fixture project")
}
