//! Capability Set
//!
//! The fixed collection of host-supplied capabilities a service is created
//! with. Every slot is independently optional; the core decides per slot
//! whether absence degrades to a default or fails the call.
//!
//! A set is immutable once built and is shared read-only between the
//! platform bridge and any in-flight exchange.
//!
//! # Example
//!
//! ```ignore
//! use bridge_traits::capability::CapabilitySet;
//! use std::sync::Arc;
//!
//! let capabilities = CapabilitySet::builder()
//!     .logger(Arc::new(MyLogger))
//!     .package_resolver(Arc::new(MyPackageManager))
//!     .use_proc_fs(true)
//!     .build();
//! ```

use std::sync::Arc;

use crate::{
    dns::LocalDnsTransport,
    logging::LoggerSink,
    network::{InterfaceMonitor, InterfaceUpdateListener, WifiStateReader},
    process::{ConnectionOwnerLookup, PackageResolver},
    system::{CertificateStore, NotificationSender},
    tun::TunProvider,
};

/// Plain host facts that need no callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostFlags {
    /// Resolve socket owners from `/proc` instead of the host callback
    pub use_proc_fs: bool,
    /// Running inside an Apple network extension
    pub under_network_extension: bool,
    /// The host routes all networks, including local ones, through the tunnel
    pub include_all_networks: bool,
}

/// Host-supplied capabilities.
#[derive(Clone, Default)]
pub struct CapabilitySet {
    pub logger: Option<Arc<dyn LoggerSink>>,
    pub connection_owner: Option<Arc<dyn ConnectionOwnerLookup>>,
    pub package_resolver: Option<Arc<dyn PackageResolver>>,
    pub interface_updates: Option<Arc<dyn InterfaceUpdateListener>>,
    pub interface_monitor: Option<Arc<dyn InterfaceMonitor>>,
    pub local_dns: Option<Arc<dyn LocalDnsTransport>>,
    pub notifications: Option<Arc<dyn NotificationSender>>,
    pub tun_provider: Option<Arc<dyn TunProvider>>,
    pub wifi_state: Option<Arc<dyn WifiStateReader>>,
    pub certificates: Option<Arc<dyn CertificateStore>>,
    pub flags: HostFlags,
}

impl CapabilitySet {
    pub fn builder() -> CapabilitySetBuilder {
        CapabilitySetBuilder::default()
    }

    /// A set with no capabilities, used when checking configurations.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Names of the capabilities present, for diagnostics.
    pub fn present(&self) -> Vec<&'static str> {
        let slots: [(&'static str, bool); 10] = [
            ("logger", self.logger.is_some()),
            ("connection_owner", self.connection_owner.is_some()),
            ("package_resolver", self.package_resolver.is_some()),
            ("interface_updates", self.interface_updates.is_some()),
            ("interface_monitor", self.interface_monitor.is_some()),
            ("local_dns", self.local_dns.is_some()),
            ("notifications", self.notifications.is_some()),
            ("tun_provider", self.tun_provider.is_some()),
            ("wifi_state", self.wifi_state.is_some()),
            ("certificates", self.certificates.is_some()),
        ];
        slots
            .into_iter()
            .filter_map(|(name, present)| present.then_some(name))
            .collect()
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("present", &self.present())
            .field("flags", &self.flags)
            .finish()
    }
}

/// Builder for [`CapabilitySet`].
#[derive(Default)]
pub struct CapabilitySetBuilder {
    set: CapabilitySet,
}

impl CapabilitySetBuilder {
    pub fn logger(mut self, logger: Arc<dyn LoggerSink>) -> Self {
        self.set.logger = Some(logger);
        self
    }

    pub fn connection_owner(mut self, lookup: Arc<dyn ConnectionOwnerLookup>) -> Self {
        self.set.connection_owner = Some(lookup);
        self
    }

    pub fn package_resolver(mut self, resolver: Arc<dyn PackageResolver>) -> Self {
        self.set.package_resolver = Some(resolver);
        self
    }

    pub fn interface_updates(mut self, listener: Arc<dyn InterfaceUpdateListener>) -> Self {
        self.set.interface_updates = Some(listener);
        self
    }

    pub fn interface_monitor(mut self, monitor: Arc<dyn InterfaceMonitor>) -> Self {
        self.set.interface_monitor = Some(monitor);
        self
    }

    pub fn local_dns(mut self, transport: Arc<dyn LocalDnsTransport>) -> Self {
        self.set.local_dns = Some(transport);
        self
    }

    pub fn notifications(mut self, sender: Arc<dyn NotificationSender>) -> Self {
        self.set.notifications = Some(sender);
        self
    }

    pub fn tun_provider(mut self, provider: Arc<dyn TunProvider>) -> Self {
        self.set.tun_provider = Some(provider);
        self
    }

    pub fn wifi_state(mut self, reader: Arc<dyn WifiStateReader>) -> Self {
        self.set.wifi_state = Some(reader);
        self
    }

    pub fn certificates(mut self, store: Arc<dyn CertificateStore>) -> Self {
        self.set.certificates = Some(store);
        self
    }

    pub fn use_proc_fs(mut self, enabled: bool) -> Self {
        self.set.flags.use_proc_fs = enabled;
        self
    }

    pub fn under_network_extension(mut self, enabled: bool) -> Self {
        self.set.flags.under_network_extension = enabled;
        self
    }

    pub fn include_all_networks(mut self, enabled: bool) -> Self {
        self.set.flags.include_all_networks = enabled;
        self
    }

    pub fn build(self) -> CapabilitySet {
        self.set
    }
}
