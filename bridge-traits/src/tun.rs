//! TUN Device Abstractions
//!
//! Mobile hosts own the VPN permission and therefore open the TUN device
//! themselves (`VpnService.Builder#establish`, `NEPacketTunnelProvider`).
//! The core only ever sees the resulting descriptor, wrapped in a
//! [`TunDevice`] so that closing it is explicit and observable.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Parameters the engine wants the TUN device opened with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunOptions {
    /// Interface name hint; hosts may ignore it
    pub name: String,
    pub mtu: u32,
    /// IPv4 addresses in CIDR notation
    pub inet4_address: Vec<String>,
    /// IPv6 addresses in CIDR notation
    pub inet6_address: Vec<String>,
    pub auto_route: bool,
    pub strict_route: bool,
    pub inet4_route_address: Vec<String>,
    pub inet6_route_address: Vec<String>,
    pub include_package: Vec<String>,
    pub exclude_package: Vec<String>,
    /// DNS server address advertised to the OS
    pub dns_server_address: Option<String>,
    /// HTTP proxy advertised to the OS, as `host:port`
    pub http_proxy: Option<String>,
}

impl Default for TunOptions {
    fn default() -> Self {
        Self {
            name: "tun0".to_string(),
            mtu: 9000,
            inet4_address: Vec::new(),
            inet6_address: Vec::new(),
            auto_route: true,
            strict_route: false,
            inet4_route_address: Vec::new(),
            inet6_route_address: Vec::new(),
            include_package: Vec::new(),
            exclude_package: Vec::new(),
            dns_server_address: None,
            http_proxy: None,
        }
    }
}

/// An open OS TUN resource.
///
/// `close` is called at most once by the core; implementations should still
/// tolerate repeated calls.
pub trait TunDevice: Send + Sync {
    /// The descriptor the engine reads and writes packets on.
    fn fd(&self) -> i32;

    /// Release the OS resource.
    fn close(&self) -> Result<()>;
}

/// Opens TUN devices on the engine's behalf.
pub trait TunProvider: Send + Sync {
    fn open_tun(&self, options: &TunOptions) -> Result<Box<dyn TunDevice>>;
}
