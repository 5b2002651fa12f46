//! # Host Bridge Traits
//!
//! Capability traits that a host application implements so the tunnel
//! engine can reach platform services it cannot access on its own.
//!
//! ## Overview
//!
//! This crate defines the contract between the core and whatever sits on the
//! other side of the native boundary: a Kotlin `VpnService`, a Swift packet
//! tunnel provider, a desktop shell, or the C ABI in `bridge-ffi`. Each trait
//! is one capability; a host supplies any subset of them in a
//! [`CapabilitySet`](capability::CapabilitySet).
//!
//! ## Traits
//!
//! ### Logging
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ### Process attribution
//! - [`ConnectionOwnerLookup`](process::ConnectionOwnerLookup) - Socket owner uid
//! - [`PackageResolver`](process::PackageResolver) - uid ⇄ package name
//!
//! ### Network
//! - [`InterfaceMonitor`](network::InterfaceMonitor) - Default interface changes
//! - [`InterfaceUpdateListener`](network::InterfaceUpdateListener) - Receiver of those changes
//! - [`WifiStateReader`](network::WifiStateReader) - SSID/BSSID
//! - [`LocalDnsTransport`](dns::LocalDnsTransport) - OS resolver access
//!
//! ### Devices and system
//! - [`TunProvider`](tun::TunProvider) / [`TunDevice`](tun::TunDevice) - TUN acquisition
//! - [`NotificationSender`](system::NotificationSender) - User notifications
//! - [`CertificateStore`](system::CertificateStore) - Trusted roots
//!
//! ## Missing Capabilities
//!
//! Absence of a capability is never a construction error. The core degrades
//! per capability: log output is dropped, monitors become no-ops, lookups
//! fail with a capability error, and DNS falls back to a fixed NXDOMAIN
//! answer.
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should convert platform-specific errors to `BridgeError`
//! and return [`BridgeError::NotAvailable`] when a capability exists but
//! cannot serve the request on this host.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`: the engine calls them from its
//! worker threads, and DNS responders may be completed from host threads.

pub mod capability;
pub mod dns;
pub mod error;
pub mod logging;
pub mod network;
pub mod process;
pub mod system;
pub mod tun;

pub use error::BridgeError;

// Re-export commonly used types
pub use capability::{CapabilitySet, CapabilitySetBuilder, HostFlags};
pub use dns::{CancelCallback, ExchangeResponder, LocalDnsTransport};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use network::{
    DefaultInterfaceUpdate, InterfaceMonitor, InterfaceType, InterfaceUpdateListener,
    NetworkInterface, WifiState, WifiStateReader,
};
pub use process::{ConnectionOwnerLookup, ConnectionOwnerRequest, PackageResolver};
pub use system::{CertificateStore, Notification, NotificationSender};
pub use tun::{TunDevice, TunOptions, TunProvider};
