//! Network Interface Abstractions
//!
//! The engine binds outbound sockets to the host's default interface and
//! needs to hear when it changes. Hosts that cannot observe interfaces simply
//! leave the monitor unset; the core then treats monitoring as a no-op.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// Interface type as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum InterfaceType {
    WiFi = 0,
    Cellular = 1,
    Ethernet = 2,
    Other = 3,
}

impl From<i32> for InterfaceType {
    fn from(value: i32) -> Self {
        match value {
            0 => InterfaceType::WiFi,
            1 => InterfaceType::Cellular,
            2 => InterfaceType::Ethernet,
            _ => InterfaceType::Other,
        }
    }
}

/// A network interface known to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub index: i32,
    pub mtu: i32,
    pub name: String,
    /// Addresses in CIDR notation
    pub addresses: Vec<String>,
    /// Raw OS interface flags
    pub flags: i32,
    pub interface_type: InterfaceType,
    pub dns_servers: Vec<String>,
    /// Whether the connection is metered (has data limits/costs)
    pub metered: bool,
}

/// Default interface change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultInterfaceUpdate {
    pub interface_name: String,
    pub interface_index: i32,
    /// Whether the OS considers the connection expensive
    pub is_expensive: bool,
    /// Whether the OS has put the connection in low-data mode
    pub is_constrained: bool,
}

/// WIFI association details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiState {
    pub ssid: String,
    pub bssid: String,
}

impl WifiState {
    pub fn new(ssid: impl Into<String>, bssid: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            bssid: bssid.into(),
        }
    }
}

/// Receives default-interface changes.
///
/// Implemented by the engine when it subscribes through a monitor, and by
/// hosts that want to be told which interface the engine settled on.
#[cfg_attr(test, mockall::automock)]
pub trait InterfaceUpdateListener: Send + Sync {
    fn update_default_interface(&self, update: DefaultInterfaceUpdate);
}

/// Host-side default interface monitor
///
/// # Platform Support
///
/// - **Android**: `ConnectivityManager.NetworkCallback`
/// - **iOS/macOS**: `NWPathMonitor`
/// - **Desktop**: usually absent
#[cfg_attr(test, mockall::automock)]
pub trait InterfaceMonitor: Send + Sync {
    /// Start delivering updates to `listener`.
    fn start(&self, listener: Arc<dyn InterfaceUpdateListener>) -> Result<()>;

    /// Stop delivering updates to `listener`.
    fn close(&self, listener: Arc<dyn InterfaceUpdateListener>) -> Result<()>;

    /// Enumerate the host's interfaces.
    fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        Ok(Vec::new())
    }
}

/// Reads the current WIFI association.
pub trait WifiStateReader: Send + Sync {
    /// Returns `None` when not associated or not permitted to read.
    fn read_wifi_state(&self) -> Option<WifiState>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_type_from_raw() {
        assert_eq!(InterfaceType::from(0), InterfaceType::WiFi);
        assert_eq!(InterfaceType::from(1), InterfaceType::Cellular);
        assert_eq!(InterfaceType::from(2), InterfaceType::Ethernet);
        assert_eq!(InterfaceType::from(3), InterfaceType::Other);
        assert_eq!(InterfaceType::from(42), InterfaceType::Other);
    }

    #[test]
    fn test_default_interfaces_are_empty() {
        struct NoEnumeration;
        impl InterfaceMonitor for NoEnumeration {
            fn start(&self, _listener: Arc<dyn InterfaceUpdateListener>) -> Result<()> {
                Ok(())
            }
            fn close(&self, _listener: Arc<dyn InterfaceUpdateListener>) -> Result<()> {
                Ok(())
            }
        }

        assert!(NoEnumeration.interfaces().unwrap().is_empty());
    }
}
