//! # Boundary Façade
//!
//! Rust-level entry points behind the native call boundary. The C ABI in
//! `bridge-ffi` is a thin translation layer over [`Boundary::global`]; Rust
//! hosts and tests construct their own [`Boundary`] for isolation.
//!
//! ## Handles
//!
//! Services are addressed by opaque positive `i64` handles. Operations on an
//! unknown handle fail with `NotFound("service not found")`, except `pause`
//! and `wake` which ignore it and `needs_wifi_state` which reports `false`.
//!
//! ## Errors
//!
//! `create_service` records its failure in a last-error slot so that a host
//! which only receives `-1` can still fetch the message. The slot is cleared
//! at the start of every `create_service` call.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_service::{Boundary, SetupOptions};
//! use bridge_traits::CapabilitySet;
//!
//! let boundary = Boundary::global();
//! boundary.register_engine_factory(my_engine_factory());
//! boundary.setup(
//!     SetupOptions::builder()
//!         .base_path("/data/app")
//!         .working_path("/data/app/work")
//!         .temp_path("/data/app/tmp")
//!         .build()?,
//! )?;
//!
//! let handle = boundary.create_service(&config_json, CapabilitySet::empty())?;
//! boundary.start_service(handle)?;
//! // ...
//! boundary.close_service(handle)?;
//! ```

use std::path::Path;
use std::sync::{Arc, OnceLock};

use bridge_traits::CapabilitySet;
use core_platform::TunDeviceTable;
use core_runtime::config::SetupOptions;
use core_runtime::events::{CoreEvent, EventBus, ServiceEvent};
use core_runtime::options::{format_options, parse_options};
use core_runtime::{logging, Error, Result};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::engine::EngineFactory;
use crate::handle_table::HandleTable;
use crate::instance::{ServiceConfig, ServiceInstance};
use crate::service_error::BoundaryErrorChannel;
use crate::shutdown::FatalStopPolicy;

/// Library version reported to hosts.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct Boundary {
    services: HandleTable<ServiceInstance>,
    tun_devices: Arc<TunDeviceTable>,
    factory: RwLock<Option<Arc<dyn EngineFactory>>>,
    setup: RwLock<Option<SetupOptions>>,
    service_errors: BoundaryErrorChannel,
    last_error: Mutex<String>,
    events: EventBus,
    fatal_stop: FatalStopPolicy,
    worker_threads: usize,
}

impl Boundary {
    pub fn new(tun_devices: Arc<TunDeviceTable>) -> Self {
        Self {
            services: HandleTable::new(),
            tun_devices,
            factory: RwLock::new(None),
            setup: RwLock::new(None),
            service_errors: BoundaryErrorChannel::new(),
            last_error: Mutex::new(String::new()),
            events: EventBus::default(),
            fatal_stop: FatalStopPolicy::default(),
            worker_threads: 2,
        }
    }

    /// Process-wide boundary over [`TunDeviceTable::global`].
    pub fn global() -> &'static Boundary {
        static GLOBAL: OnceLock<Boundary> = OnceLock::new();
        GLOBAL.get_or_init(|| Boundary::new(TunDeviceTable::global()))
    }

    pub fn with_engine_factory(self, factory: Arc<dyn EngineFactory>) -> Self {
        *self.factory.write() = Some(factory);
        self
    }

    pub fn with_fatal_stop(mut self, policy: FatalStopPolicy) -> Self {
        self.fatal_stop = policy;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Links the engine implementation used by `create_service` and
    /// `validate_config`. Replaces any earlier registration.
    pub fn register_engine_factory(&self, factory: Arc<dyn EngineFactory>) {
        *self.factory.write() = Some(factory);
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn tun_devices(&self) -> &Arc<TunDeviceTable> {
        &self.tun_devices
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn setup_options(&self) -> Option<SetupOptions> {
        self.setup.read().clone()
    }

    #[instrument(skip_all, fields(working = %options.working_path.display()))]
    pub fn setup(&self, options: SetupOptions) -> Result<()> {
        options.validate()?;
        options.prepare_directories()?;
        self.service_errors.configure(&options.working_path);
        info!(
            restricted_os = options.is_restricted_os,
            fix_thread_affinity = options.fix_thread_affinity,
            "boundary configured"
        );
        *self.setup.write() = Some(options);
        Ok(())
    }

    /// Parses `config`, builds an engine over `capabilities` and registers
    /// it. The service is not started.
    pub fn create_service(&self, config: &str, capabilities: CapabilitySet) -> Result<i64> {
        self.clear_last_error();
        self.build_service(config, capabilities)
            .inspect_err(|err| self.record_error(err.to_string()))
    }

    /// Records a `create_service` failure that was detected before reaching
    /// the boundary, such as a null argument at the C layer.
    pub fn reject_create(&self, message: &str) {
        self.record_error(message.to_string());
    }

    fn build_service(&self, config: &str, capabilities: CapabilitySet) -> Result<i64> {
        let options = parse_options(config)?;
        let factory = self.engine_factory()?;

        let instance = ServiceInstance::create(
            factory.as_ref(),
            options,
            capabilities,
            self.service_config(),
        )?;
        let handle = self.services.register_with(|handle| {
            instance.attach_handle(handle);
            Arc::new(instance)
        });

        info!(handle, "service created");
        self.events
            .emit(CoreEvent::Service(ServiceEvent::Created { handle }))
            .ok();
        Ok(handle)
    }

    pub fn start_service(&self, handle: i64) -> Result<()> {
        self.services.lookup(handle)?.start()
    }

    /// Releases `handle` and shuts its service down. The handle is invalid
    /// as soon as this is called, even if the engine fails to close.
    pub fn close_service(&self, handle: i64) -> Result<()> {
        let instance = self
            .services
            .remove(handle)
            .ok_or_else(|| Error::NotFound("service not found".to_string()))?;
        instance.close()
    }

    pub fn pause_service(&self, handle: i64) {
        match self.services.lookup(handle) {
            Ok(instance) => instance.pause(),
            Err(_) => debug!(handle, "pause for unknown handle ignored"),
        }
    }

    pub fn wake_service(&self, handle: i64) {
        match self.services.lookup(handle) {
            Ok(instance) => instance.wake(),
            Err(_) => debug!(handle, "wake for unknown handle ignored"),
        }
    }

    pub fn needs_wifi_state(&self, handle: i64) -> bool {
        self.services
            .lookup(handle)
            .map(|instance| instance.needs_wifi_state())
            .unwrap_or(false)
    }

    /// Checks that `config` parses and that the engine accepts it, then
    /// discards the engine.
    ///
    /// Without a registered engine only the parse step runs.
    pub fn validate_config(&self, config: &str) -> Result<()> {
        let options = parse_options(config)?;
        let Some(factory) = self.factory.read().clone() else {
            debug!("no engine registered; configuration parsed only");
            return Ok(());
        };

        let config = ServiceConfig::new(Arc::new(TunDeviceTable::new()))
            .with_fatal_stop(self.fatal_stop.clone())
            .with_worker_threads(1);
        let instance =
            ServiceInstance::create(factory.as_ref(), options, CapabilitySet::empty(), config)?;
        instance.close()
    }

    /// Canonical, 2-space indented rendering of `config`.
    pub fn format_config(&self, config: &str) -> Result<String> {
        format_options(config)
    }

    pub fn read_boundary_error(&self) -> Result<Option<String>> {
        self.service_errors.read()
    }

    pub fn write_boundary_error(&self, message: &str) -> Result<()> {
        self.service_errors.write(message)
    }

    pub fn clear_boundary_error(&self) {
        self.service_errors.clear();
    }

    /// Message of the last failed `create_service`; empty when none.
    pub fn last_error(&self) -> String {
        self.last_error.lock().clone()
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }

    pub fn redirect_stderr(&self, path: impl AsRef<Path>) -> Result<()> {
        logging::redirect_stderr(path)
    }

    fn engine_factory(&self) -> Result<Arc<dyn EngineFactory>> {
        self.factory
            .read()
            .clone()
            .ok_or_else(|| Error::Engine("no tunnel engine registered".to_string()))
    }

    fn service_config(&self) -> ServiceConfig {
        let fix_thread_affinity = self
            .setup
            .read()
            .as_ref()
            .map(|options| options.fix_thread_affinity)
            .unwrap_or(false);

        ServiceConfig::new(Arc::clone(&self.tun_devices))
            .with_events(self.events.clone())
            .with_fatal_stop(self.fatal_stop.clone())
            .with_thread_affinity(fix_thread_affinity)
            .with_worker_threads(self.worker_threads)
    }

    fn clear_last_error(&self) {
        self.last_error.lock().clear();
    }

    fn record_error(&self, message: String) {
        warn!(error = %message, "create service failed");
        *self.last_error.lock() = message;
    }
}

impl std::fmt::Debug for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Boundary")
            .field("services", &self.services)
            .field("tun_devices", &self.tun_devices.len())
            .field("engine", &self.factory.read().is_some())
            .field("configured", &self.setup.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockEngineFactory, MockTunnelEngine, TunnelEngine};

    fn passive_factory() -> Arc<dyn EngineFactory> {
        let mut factory = MockEngineFactory::new();
        factory.expect_create().returning(|_| {
            let mut engine = MockTunnelEngine::new();
            engine.expect_start().returning(|| Ok(()));
            engine.expect_close().returning(|| Ok(()));
            engine.expect_needs_wifi_state().return_const(false);
            Ok(Arc::new(engine) as Arc<dyn TunnelEngine>)
        });
        Arc::new(factory)
    }

    fn boundary() -> Boundary {
        Boundary::new(Arc::new(TunDeviceTable::new()))
            .with_engine_factory(passive_factory())
            .with_worker_threads(1)
    }

    #[test]
    fn test_invalid_config_sets_last_error() {
        let boundary = boundary();
        let err = boundary
            .create_service("{not json", CapabilitySet::empty())
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(boundary.last_error().contains("parse config"));
        assert_eq!(boundary.service_count(), 0);
    }

    #[test]
    fn test_last_error_cleared_by_next_create() {
        let boundary = boundary();
        boundary
            .create_service(r#"{"inbound": []}"#, CapabilitySet::empty())
            .unwrap_err();
        assert!(!boundary.last_error().is_empty());

        let handle = boundary.create_service("{}", CapabilitySet::empty()).unwrap();
        assert_eq!(boundary.last_error(), "");
        boundary.close_service(handle).unwrap();
    }

    #[test]
    fn test_missing_engine_is_reported() {
        let boundary = Boundary::new(Arc::new(TunDeviceTable::new()));
        let err = boundary
            .create_service("{}", CapabilitySet::empty())
            .unwrap_err();

        assert!(matches!(err, Error::Engine(_)));
        assert_eq!(boundary.last_error(), err.to_string());
        // Parsing alone still works.
        boundary.validate_config("{}").unwrap();
    }

    #[test]
    fn test_unknown_handles() {
        let boundary = boundary();
        assert!(matches!(boundary.start_service(42), Err(Error::NotFound(_))));
        assert!(matches!(boundary.close_service(42), Err(Error::NotFound(_))));
        boundary.pause_service(42);
        boundary.wake_service(42);
        assert!(!boundary.needs_wifi_state(42));
    }

    #[test]
    fn test_format_config() {
        let formatted = boundary()
            .format_config(r#"{"log":{"level":"info"}}"#)
            .unwrap();
        assert!(formatted.contains("\n  \"log\""));
    }

    #[test]
    fn test_version() {
        assert_eq!(boundary().version(), env!("CARGO_PKG_VERSION"));
    }
}
