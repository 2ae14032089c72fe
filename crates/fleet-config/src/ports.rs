//! Port assignments for every fleet member.

use crate::defaults::{PERMANENT_PORTS, RESTART_PORTS};

/// Listening ports of the fleet, one field per service endpoint.
///
/// The defaults mirror the fixed table the browser tests are written against.
/// Tests substitute ephemeral ports so several runs can share a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortTable {
    /// Modbus-TCP device simulator.
    pub simulator: u16,
    /// Reverse proxy fronting the ingress gateway.
    pub proxy: u16,
    /// Broker listener that requires credentials.
    pub broker: u16,
    /// Broker listener without authentication.
    pub broker_no_auth: u16,
    /// Gateway instance running in ingress mode.
    pub gateway_ingress: u16,
    /// Gateway instance driven by the main browser flow.
    pub gateway: u16,
    /// Gateway instance talking to the unauthenticated broker.
    pub gateway_no_auth: u16,
}

impl Default for PortTable {
    fn default() -> Self {
        let [simulator, proxy] = PERMANENT_PORTS;
        let [broker, broker_no_auth, gateway_ingress, gateway, gateway_no_auth] = RESTART_PORTS;
        Self {
            simulator,
            proxy,
            broker,
            broker_no_auth,
            gateway_ingress,
            gateway,
            gateway_no_auth,
        }
    }
}
