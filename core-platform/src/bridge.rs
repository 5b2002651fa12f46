//! Platform Bridge
//!
//! [`PlatformBridge`] implements [`PlatformInterface`] by forwarding each call
//! to the matching slot of a [`CapabilitySet`]. Every slot has its own rule
//! for when the host left it empty:
//!
//! | Call                                   | Missing capability             |
//! |----------------------------------------|--------------------------------|
//! | `write_log`                            | dropped                        |
//! | owner / package / uid lookups          | `CapabilityUnavailable`        |
//! | interface monitor start/close          | no-op success                  |
//! | `interfaces`                           | empty list                     |
//! | `update_default_interface`             | dropped                        |
//! | certificates / Wi-Fi state             | empty / `None`                 |
//! | `send_notification`                    | no-op success                  |
//! | `open_tun`                             | `CapabilityUnavailable`        |
//! | DNS exchange                           | NXDOMAIN reply                 |
//!
//! No lock is held while a host capability runs, so a host callback may call
//! back into the boundary.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::{
    CapabilitySet, ConnectionOwnerRequest, DefaultInterfaceUpdate, InterfaceUpdateListener,
    LogEntry, LogLevel, LoggerSink, NetworkInterface, Notification, TunOptions, WifiState,
};
use core_async::cancel::CancellationToken;
use core_async::runtime;
use core_runtime::events::{CoreEvent, EventBus, PlatformEvent};
use core_runtime::{Error, Result};
use futures::FutureExt;
use hickory_proto::op::Message;
use tracing::{debug, warn};

use crate::dns::DnsExchangeBridge;
use crate::platform::PlatformInterface;
use crate::tun_table::TunDeviceTable;

/// Log target used for engine output forwarded to the host.
pub const ENGINE_LOG_TARGET: &str = "engine";

pub struct PlatformBridge {
    capabilities: CapabilitySet,
    tun_devices: Arc<TunDeviceTable>,
    dns: DnsExchangeBridge,
    events: Option<EventBus>,
}

impl PlatformBridge {
    pub fn new(capabilities: CapabilitySet, tun_devices: Arc<TunDeviceTable>) -> Self {
        let dns = DnsExchangeBridge::new(capabilities.local_dns.clone());
        Self {
            capabilities,
            tun_devices,
            dns,
            events: None,
        }
    }

    /// Publishes TUN lifecycle events on `events`.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn tun_devices(&self) -> &Arc<TunDeviceTable> {
        &self.tun_devices
    }

    fn emit(&self, event: PlatformEvent) {
        if let Some(events) = &self.events {
            events.emit(CoreEvent::Platform(event)).ok();
        }
    }
}

impl std::fmt::Debug for PlatformBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformBridge")
            .field("capabilities", &self.capabilities)
            .field("tun_devices", &self.tun_devices)
            .finish()
    }
}

#[async_trait]
impl PlatformInterface for PlatformBridge {
    fn write_log(&self, message: &str) {
        let Some(logger) = self.capabilities.logger.as_ref() else {
            return;
        };
        let entry = LogEntry::new(LogLevel::Info, ENGINE_LOG_TARGET, message);
        deliver_log(Arc::clone(logger), entry);
    }

    fn use_proc_fs(&self) -> bool {
        self.capabilities.flags.use_proc_fs
    }

    fn under_network_extension(&self) -> bool {
        self.capabilities.flags.under_network_extension
    }

    fn include_all_networks(&self) -> bool {
        self.capabilities.flags.include_all_networks
    }

    fn find_connection_owner(&self, request: &ConnectionOwnerRequest) -> Result<i32> {
        let lookup = self
            .capabilities
            .connection_owner
            .as_ref()
            .ok_or_else(|| Error::capability("find_connection_owner"))?;
        Ok(lookup.find_connection_owner(request)?)
    }

    fn package_name_by_uid(&self, uid: i32) -> Result<String> {
        let resolver = self
            .capabilities
            .package_resolver
            .as_ref()
            .ok_or_else(|| Error::capability("package_name_by_uid"))?;
        Ok(resolver.package_name_by_uid(uid)?)
    }

    fn uid_by_package_name(&self, package_name: &str) -> Result<i32> {
        let resolver = self
            .capabilities
            .package_resolver
            .as_ref()
            .ok_or_else(|| Error::capability("uid_by_package_name"))?;
        Ok(resolver.uid_by_package_name(package_name)?)
    }

    fn start_default_interface_monitor(
        &self,
        listener: Arc<dyn InterfaceUpdateListener>,
    ) -> Result<()> {
        match &self.capabilities.interface_monitor {
            Some(monitor) => Ok(monitor.start(listener)?),
            None => Ok(()),
        }
    }

    fn close_default_interface_monitor(
        &self,
        listener: Arc<dyn InterfaceUpdateListener>,
    ) -> Result<()> {
        match &self.capabilities.interface_monitor {
            Some(monitor) => Ok(monitor.close(listener)?),
            None => Ok(()),
        }
    }

    fn update_default_interface(&self, update: DefaultInterfaceUpdate) {
        if let Some(listener) = &self.capabilities.interface_updates {
            listener.update_default_interface(update);
        }
    }

    fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        match &self.capabilities.interface_monitor {
            Some(monitor) => Ok(monitor.interfaces()?),
            None => Ok(Vec::new()),
        }
    }

    fn auto_detect_interface_control(&self, _fd: i32) -> Result<()> {
        Ok(())
    }

    fn open_tun(&self, options: &TunOptions) -> Result<i32> {
        let provider = self
            .capabilities
            .tun_provider
            .as_ref()
            .ok_or_else(|| Error::capability("open_tun"))?;

        let device = provider.open_tun(options)?;
        let fd = device.fd();
        if fd < 0 {
            // The host handed back a device without a usable descriptor.
            if let Err(err) = device.close() {
                warn!(fd, error = %err, "failed to close rejected tun device");
            }
            return Err(Error::Validation(format!(
                "tun provider returned invalid descriptor {}",
                fd
            )));
        }

        self.tun_devices.store(fd, device);
        debug!(fd, name = %options.name, mtu = options.mtu, "opened tun device");
        self.emit(PlatformEvent::TunOpened { fd });
        Ok(fd)
    }

    fn release_tun(&self, fd: i32) -> Result<()> {
        self.tun_devices.remove(fd)?;
        self.emit(PlatformEvent::TunReleased { fd });
        Ok(())
    }

    fn system_certificates(&self) -> Vec<String> {
        self.capabilities
            .certificates
            .as_ref()
            .map(|store| store.system_certificates())
            .unwrap_or_default()
    }

    fn read_wifi_state(&self) -> Option<WifiState> {
        self.capabilities
            .wifi_state
            .as_ref()
            .and_then(|reader| reader.read_wifi_state())
    }

    fn send_notification(&self, notification: &Notification) -> Result<()> {
        match &self.capabilities.notifications {
            Some(sender) => Ok(sender.send_notification(notification)?),
            None => Ok(()),
        }
    }

    fn clear_dns_cache(&self) {
        self.dns.clear_cache();
    }

    fn has_local_dns(&self) -> bool {
        self.dns.has_transport()
    }

    async fn exchange_dns(&self, request: &Message, scope: &CancellationToken) -> Result<Message> {
        let result = self.dns.exchange(request, scope).await;
        if scope.is_cancelled() && result.is_err() {
            self.emit(PlatformEvent::DnsExchangeCancelled {
                message_id: request.id(),
            });
        }
        result
    }
}

/// Hands `entry` to `logger` without blocking the caller on a pending sink.
fn deliver_log(logger: Arc<dyn LoggerSink>, entry: LogEntry) {
    let mut pending = Box::pin(async move { logger.log(entry).await });
    let result = match pending.as_mut().now_or_never() {
        Some(result) => result,
        None => match runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = pending.await {
                        eprintln!("LoggerSink error: {}", err);
                    }
                });
                return;
            }
            Err(_) => futures::executor::block_on(pending),
        },
    };

    if let Err(err) = result {
        eprintln!("LoggerSink error: {}", err);
    }
}

/// [`LoggerSink`] that writes formatted entries through
/// [`PlatformInterface::write_log`], so structured engine logs end up in the
/// host's log stream.
pub struct PlatformLogSink {
    platform: Arc<dyn PlatformInterface>,
    min_level: LogLevel,
}

impl PlatformLogSink {
    pub fn new(platform: Arc<dyn PlatformInterface>) -> Self {
        Self {
            platform,
            min_level: LogLevel::Info,
        }
    }

    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }
}

#[async_trait]
impl LoggerSink for PlatformLogSink {
    async fn log(&self, entry: LogEntry) -> bridge_traits::error::Result<()> {
        if entry.level >= self.min_level {
            self.platform.write_log(&entry.to_line());
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{BridgeError, PackageResolver};
    use mockall::mock;
    use parking_lot::Mutex;

    mock! {
        pub Resolver {}

        impl PackageResolver for Resolver {
            fn package_name_by_uid(&self, uid: i32) -> bridge_traits::error::Result<String>;
            fn uid_by_package_name(&self, package_name: &str) -> bridge_traits::error::Result<i32>;
        }
    }

    #[derive(Default)]
    struct RecordingLogger {
        lines: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LoggerSink for RecordingLogger {
        async fn log(&self, entry: LogEntry) -> bridge_traits::error::Result<()> {
            self.lines.lock().push(entry.message);
            Ok(())
        }
    }

    fn bridge(capabilities: CapabilitySet) -> PlatformBridge {
        PlatformBridge::new(capabilities, Arc::new(TunDeviceTable::new()))
    }

    #[test]
    fn test_missing_lookups_are_capability_errors() {
        let bridge = bridge(CapabilitySet::empty());

        let request = ConnectionOwnerRequest::tcp("10.0.0.2", 40000, "1.1.1.1", 443);
        assert!(matches!(
            bridge.find_connection_owner(&request),
            Err(Error::CapabilityUnavailable { ref capability }) if capability == "find_connection_owner"
        ));
        assert!(matches!(
            bridge.package_name_by_uid(10001),
            Err(Error::CapabilityUnavailable { .. })
        ));
        assert!(matches!(
            bridge.uid_by_package_name("com.example"),
            Err(Error::CapabilityUnavailable { .. })
        ));
    }

    #[test]
    fn test_missing_optional_capabilities_degrade() {
        let bridge = bridge(CapabilitySet::empty());

        bridge.write_log("dropped");
        assert!(bridge.interfaces().unwrap().is_empty());
        assert!(bridge.system_certificates().is_empty());
        assert!(bridge.read_wifi_state().is_none());
        assert!(bridge.send_notification(&Notification::default()).is_ok());
        assert!(bridge.auto_detect_interface_control(3).is_ok());
        assert!(!bridge.has_local_dns());
        bridge.clear_dns_cache();
        assert!(matches!(
            bridge.open_tun(&TunOptions::default()),
            Err(Error::CapabilityUnavailable { .. })
        ));
    }

    #[test]
    fn test_package_resolver_is_forwarded() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_package_name_by_uid()
            .withf(|uid| *uid == 10042)
            .returning(|_| Ok("com.example.browser".to_string()));
        resolver
            .expect_uid_by_package_name()
            .returning(|_| Err(BridgeError::not_found("com.missing")));

        let bridge = bridge(
            CapabilitySet::builder()
                .package_resolver(Arc::new(resolver))
                .build(),
        );

        assert_eq!(
            bridge.package_name_by_uid(10042).unwrap(),
            "com.example.browser"
        );
        assert!(matches!(
            bridge.uid_by_package_name("com.missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_write_log_reaches_host_logger() {
        let logger = Arc::new(RecordingLogger::default());
        let bridge = bridge(CapabilitySet::builder().logger(logger.clone()).build());

        bridge.write_log("inbound/tun[tun-in]: started");
        assert_eq!(
            logger.lines.lock().as_slice(),
            ["inbound/tun[tun-in]: started".to_string()]
        );
    }

    #[test]
    fn test_platform_log_sink_formats_entries() {
        let logger = Arc::new(RecordingLogger::default());
        let platform: Arc<dyn PlatformInterface> =
            Arc::new(bridge(CapabilitySet::builder().logger(logger.clone()).build()));
        let sink = PlatformLogSink::new(platform).with_min_level(LogLevel::Warn);

        futures::executor::block_on(async {
            sink.log(LogEntry::new(LogLevel::Info, "router", "skipped"))
                .await
                .unwrap();
            sink.log(LogEntry::new(LogLevel::Error, "router", "no route"))
                .await
                .unwrap();
        });

        let lines = logger.lines.lock();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("no route"));
        assert!(lines[0].contains("router"));
    }

    #[test]
    fn test_host_flags_are_reported() {
        let bridge = bridge(
            CapabilitySet::builder()
                .use_proc_fs(true)
                .under_network_extension(true)
                .build(),
        );
        assert!(bridge.use_proc_fs());
        assert!(bridge.under_network_extension());
        assert!(!bridge.include_all_networks());
    }
}
