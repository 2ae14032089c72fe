//! Readiness polling for fleet ports.
//!
//! A port counts as ready once a TCP connection to it succeeds. Ports are
//! awaited one after another with a bounded number of probes each; a port
//! that never opens is recorded and the remaining ports are still awaited so
//! the final report names every failure.

use std::fs;
use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use camino::Utf8Path;
use fleet_config::FleetConfig;
use tracing::{debug, info, warn};

use super::error::LifecycleError;
use super::types::LifecycleOutput;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Answers whether something accepts TCP connections on `host:port`.
pub trait PortProbe {
    fn is_open(&mut self, host: &str, port: u16) -> bool;

    /// Longest a single probe may block; `None` when probes return at once.
    fn connect_timeout(&self) -> Option<Duration> {
        None
    }
}

/// [`PortProbe`] that opens and immediately closes a real TCP connection.
///
/// Every address `host` resolves to is tried, so `localhost` works whether the
/// server bound the IPv4 or the IPv6 loopback.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(CONNECT_TIMEOUT)
    }
}

impl PortProbe for TcpProbe {
    fn is_open(&mut self, host: &str, port: u16) -> bool {
        match connect_any(host, port, self.timeout) {
            Ok(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
                true
            }
            Err(error) => {
                debug!(host, port, error = %error, "port not accepting connections");
                false
            }
        }
    }

    fn connect_timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }
}

fn connect_any(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = None;
    for address in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&address, timeout) {
            Ok(stream) => return Ok(stream),
            Err(error) => last_error = Some(error),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{host} did not resolve to any address"),
        )
    }))
}

/// How often and how long a port is probed.
///
/// The pauses alone bound the wait for one port to
/// `(max_retries - 1) * poll_interval`. Each attempt may additionally block
/// for the probe's connect timeout when the host drops packets instead of
/// refusing them; [`RetryPolicy::worst_case_wait`] accounts for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub poll_interval: Duration,
}

impl RetryPolicy {
    /// Longest time a single port can be awaited when every attempt blocks
    /// for `connect_timeout` before failing.
    pub fn worst_case_wait(self, connect_timeout: Duration) -> Duration {
        let attempts = self.max_retries;
        connect_timeout
            .saturating_mul(attempts)
            .saturating_add(self.poll_interval.saturating_mul(attempts.saturating_sub(1)))
    }
}

impl From<&FleetConfig> for RetryPolicy {
    fn from(config: &FleetConfig) -> Self {
        Self {
            max_retries: config.max_port_retries,
            poll_interval: config.poll_interval,
        }
    }
}

/// Blocks until every port of a set accepts connections or exhausts its
/// retry budget.
#[derive(Debug, Clone)]
pub struct PortWaiter<'a> {
    host: &'a str,
    policy: RetryPolicy,
    capture_file: Option<&'a Utf8Path>,
}

impl<'a> PortWaiter<'a> {
    pub const fn new(host: &'a str, policy: RetryPolicy) -> Self {
        Self {
            host,
            policy,
            capture_file: None,
        }
    }

    /// Dumps `path` to stderr when a port fails, so the output of members
    /// that died during startup lands in the CI log.
    #[must_use]
    pub const fn with_capture_file(mut self, path: &'a Utf8Path) -> Self {
        self.capture_file = Some(path);
        self
    }

    /// Awaits `ports` in order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::PortTimeout`] naming every port that never
    /// opened, or [`LifecycleError::Io`] when output cannot be written.
    pub fn await_ports<P, W, E>(
        &self,
        probe: &mut P,
        ports: &[u16],
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<(), LifecycleError>
    where
        P: PortProbe,
        W: io::Write,
        E: io::Write,
    {
        let mut failed = Vec::new();
        let mut report = String::new();
        let budget = self
            .policy
            .worst_case_wait(probe.connect_timeout().unwrap_or_default());
        debug!(ports = ?ports, per_port = ?budget, "awaiting ports");
        for &port in ports {
            if self.await_port(probe, port) {
                debug!(port, "port open");
                continue;
            }
            warn!(
                port,
                attempts = self.policy.max_retries,
                "port never opened"
            );
            failed.push(port);
            report.push_str(&format!("Port {port} not opened!\n"));
        }

        if failed.is_empty() {
            info!(ports = ?ports, "all required ports are open");
            return output.stdout_line(format_args!("All required ports are open."));
        }
        self.surface_capture(output)?;
        Err(LifecycleError::PortTimeout {
            ports: failed,
            report,
        })
    }

    fn await_port<P: PortProbe>(&self, probe: &mut P, port: u16) -> bool {
        let attempts = self.policy.max_retries;
        for attempt in 1..=attempts {
            if probe.is_open(self.host, port) {
                return true;
            }
            if attempt < attempts {
                thread::sleep(self.policy.poll_interval);
            }
        }
        false
    }

    fn surface_capture<W: io::Write, E: io::Write>(
        &self,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<(), LifecycleError> {
        let Some(path) = self.capture_file else {
            return Ok(());
        };
        match fs::read_to_string(path) {
            Ok(contents) => output.stderr_line(format_args!("{}", contents.trim_end())),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => {
                warn!(path = %path, error = %error, "failed to read capture file");
                Ok(())
            }
        }
    }
}
