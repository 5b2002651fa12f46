//! Engine-facing platform contract.
//!
//! The engine never sees the host capabilities directly. Everything it needs
//! from the operating system goes through this trait, which
//! [`PlatformBridge`](crate::PlatformBridge) implements on top of a
//! [`CapabilitySet`](bridge_traits::CapabilitySet).

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::{
    ConnectionOwnerRequest, DefaultInterfaceUpdate, InterfaceUpdateListener, NetworkInterface,
    Notification, TunOptions, WifiState,
};
use core_async::cancel::CancellationToken;
use core_runtime::Result;
use hickory_proto::op::Message;

#[async_trait]
pub trait PlatformInterface: Send + Sync {
    /// Engine log output. Never fails; dropped when the host has no logger.
    fn write_log(&self, message: &str);

    fn use_proc_fs(&self) -> bool;

    fn under_network_extension(&self) -> bool;

    fn include_all_networks(&self) -> bool;

    /// uid owning the socket described by `request`.
    fn find_connection_owner(&self, request: &ConnectionOwnerRequest) -> Result<i32>;

    fn package_name_by_uid(&self, uid: i32) -> Result<String>;

    fn uid_by_package_name(&self, package_name: &str) -> Result<i32>;

    fn start_default_interface_monitor(
        &self,
        listener: Arc<dyn InterfaceUpdateListener>,
    ) -> Result<()>;

    fn close_default_interface_monitor(
        &self,
        listener: Arc<dyn InterfaceUpdateListener>,
    ) -> Result<()>;

    /// Reports a default-interface change to the host.
    fn update_default_interface(&self, update: DefaultInterfaceUpdate);

    fn interfaces(&self) -> Result<Vec<NetworkInterface>>;

    /// Binds an outbound socket to the current default interface.
    fn auto_detect_interface_control(&self, fd: i32) -> Result<()>;

    /// Opens a TUN device and returns the descriptor the engine should use.
    fn open_tun(&self, options: &TunOptions) -> Result<i32>;

    /// Closes a TUN device previously returned by [`open_tun`](Self::open_tun).
    fn release_tun(&self, fd: i32) -> Result<()>;

    /// PEM-encoded trust roots; empty when the host has none to offer.
    fn system_certificates(&self) -> Vec<String>;

    fn read_wifi_state(&self) -> Option<WifiState>;

    fn send_notification(&self, notification: &Notification) -> Result<()>;

    fn clear_dns_cache(&self);

    /// Whether DNS exchanges reach a host resolver.
    fn has_local_dns(&self) -> bool;

    /// Resolves `request` through the host resolver. Cancelling `scope`
    /// before the host answers fails the exchange.
    async fn exchange_dns(&self, request: &Message, scope: &CancellationToken) -> Result<Message>;
}
