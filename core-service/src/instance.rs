//! # Service Lifecycle
//!
//! A [`ServiceInstance`] owns one engine together with everything the engine
//! was built on: the runtime that drives it, its root cancellation scope, the
//! pause manager, the URL test history and the platform bridge.
//!
//! ## States
//!
//! ```text
//! Constructed ──start──> Started ──pause──> Paused
//!      │                   │  ^               │
//!      │                   │  └─────wake──────┘
//!      └───────────────────┴──────close──────────> Closing ──> Closed
//! ```
//!
//! A failed `start` leaves the instance in `Constructed`; the host is
//! expected to close it.
//!
//! ## Blocking
//!
//! `start` and `close` block the calling thread. When called from a thread
//! that is already driving an async runtime, the blocking part moves to a
//! dedicated thread and the caller waits for it, so the outcome is the same
//! as on a plain host thread.
//!
//! `close` is bounded: the engine gets [`FatalStopPolicy::deadline`] to shut
//! down before the policy's terminate action runs. Whatever the outcome,
//! every tracked TUN descriptor is closed before `close` returns.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use bridge_traits::CapabilitySet;
use core_async::cancel::CancellationToken;
use core_async::runtime::{self, Runtime};
use core_platform::{PlatformBridge, PlatformInterface, PlatformLogSink, TunDeviceTable};
use core_runtime::events::{CoreEvent, EventBus, PlatformEvent, ServiceEvent};
use core_runtime::options::EngineOptions;
use core_runtime::{Error, Result};
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::{EngineContext, EngineFactory, TunnelEngine};
use crate::history::UrlTestHistory;
use crate::pause::PauseManager;
use crate::shutdown::FatalStopPolicy;

/// Stack size of the dedicated start thread in affinity mode.
const AFFINITY_STACK_SIZE: usize = 16 * 1024 * 1024;

const ENGINE_THREAD_NAME: &str = "tunnel-engine";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Constructed,
    Started,
    Paused,
    Closing,
    Closed,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Constructed => "constructed",
            ServiceState::Started => "started",
            ServiceState::Paused => "paused",
            ServiceState::Closing => "closing",
            ServiceState::Closed => "closed",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ServiceState::Started | ServiceState::Paused)
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Construction settings shared by every service of a boundary.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub tun_devices: Arc<TunDeviceTable>,
    pub events: EventBus,
    pub fatal_stop: FatalStopPolicy,
    /// Run `start` on a dedicated thread with an enlarged stack
    pub fix_thread_affinity: bool,
    pub worker_threads: usize,
}

impl ServiceConfig {
    pub fn new(tun_devices: Arc<TunDeviceTable>) -> Self {
        Self {
            tun_devices,
            events: EventBus::default(),
            fatal_stop: FatalStopPolicy::default(),
            fix_thread_affinity: false,
            worker_threads: 2,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_fatal_stop(mut self, policy: FatalStopPolicy) -> Self {
        self.fatal_stop = policy;
        self
    }

    pub fn with_thread_affinity(mut self, enabled: bool) -> Self {
        self.fix_thread_affinity = enabled;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }
}

pub struct ServiceInstance {
    handle: AtomicI64,
    engine: Arc<dyn TunnelEngine>,
    runtime: Mutex<Option<Runtime>>,
    scope: CancellationToken,
    pause: PauseManager,
    history: Arc<UrlTestHistory>,
    bridge: Arc<PlatformBridge>,
    state: Mutex<ServiceState>,
    config: ServiceConfig,
}

impl ServiceInstance {
    /// Builds the engine for `options` on top of `capabilities`.
    ///
    /// Nothing is started; a failed construction leaves no runtime or scope
    /// behind.
    pub fn create(
        factory: &dyn EngineFactory,
        options: EngineOptions,
        capabilities: CapabilitySet,
        config: ServiceConfig,
    ) -> Result<Self> {
        let runtime = runtime::multi_thread(ENGINE_THREAD_NAME, config.worker_threads)?;
        let scope = CancellationToken::new();
        let pause = PauseManager::new();
        let history = Arc::new(UrlTestHistory::new());

        debug!(capabilities = ?capabilities.present(), "building platform bridge");
        let bridge = Arc::new(
            PlatformBridge::new(capabilities, Arc::clone(&config.tun_devices))
                .with_events(config.events.clone()),
        );
        let platform: Arc<dyn PlatformInterface> = bridge.clone();

        let context = EngineContext {
            options,
            platform: Arc::clone(&platform),
            scope: scope.clone(),
            history: Arc::clone(&history),
            pause: pause.clone(),
            log_writer: Arc::new(PlatformLogSink::new(platform)),
        };

        let engine = {
            let _entered = runtime.enter();
            factory.create(context)
        };
        let engine = match engine {
            Ok(engine) => engine,
            Err(err) => {
                scope.cancel();
                runtime.shutdown_background();
                return Err(Error::Engine(format!("create service: {:#}", err)));
            }
        };

        Ok(Self {
            handle: AtomicI64::new(0),
            engine,
            runtime: Mutex::new(Some(runtime)),
            scope,
            pause,
            history,
            bridge,
            state: Mutex::new(ServiceState::Constructed),
            config,
        })
    }

    /// Records the handle this instance is registered under; used in events
    /// and logs.
    pub fn attach_handle(&self, handle: i64) {
        self.handle.store(handle, Ordering::SeqCst);
    }

    pub fn handle(&self) -> i64 {
        self.handle.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    pub fn pause_manager(&self) -> &PauseManager {
        &self.pause
    }

    pub fn history(&self) -> &Arc<UrlTestHistory> {
        &self.history
    }

    pub fn platform(&self) -> &Arc<PlatformBridge> {
        &self.bridge
    }

    #[instrument(skip(self), fields(handle = self.handle(), affinity = self.config.fix_thread_affinity))]
    pub fn start(&self) -> Result<()> {
        {
            let state = self.state.lock();
            if *state != ServiceState::Constructed {
                return Err(Error::Validation(format!(
                    "cannot start service in state {}",
                    state
                )));
            }
        }

        let handle = self.runtime_handle()?;
        let engine = Arc::clone(&self.engine);
        let outcome = if self.config.fix_thread_affinity {
            let worker = thread::Builder::new()
                .name(format!("{}-start", ENGINE_THREAD_NAME))
                .stack_size(AFFINITY_STACK_SIZE)
                .spawn(move || handle.block_on(async move { engine.start().await }))?;
            worker
                .join()
                .map_err(|_| Error::Engine("engine start panicked".to_string()))?
        } else {
            run_outside_runtime("start", move || {
                handle.block_on(async move { engine.start().await })
            })?
        };

        match outcome {
            Ok(()) => {
                self.transition(ServiceState::Constructed, ServiceState::Started)?;
                info!("service started");
                self.emit(ServiceEvent::Started {
                    handle: self.handle(),
                });
                Ok(())
            }
            Err(err) => {
                let message = format!("start service: {:#}", err);
                warn!(error = %message, "service start failed");
                self.emit(ServiceEvent::StartFailed {
                    handle: self.handle(),
                    message: message.clone(),
                });
                Err(Error::Engine(message))
            }
        }
    }

    /// Shuts the engine down and releases every tracked TUN descriptor.
    ///
    /// A second call returns `Ok(())` without doing anything.
    #[instrument(skip(self), fields(handle = self.handle()))]
    pub fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if matches!(*state, ServiceState::Closing | ServiceState::Closed) {
                debug!(state = %*state, "close ignored");
                return Ok(());
            }
            *state = ServiceState::Closing;
        }

        match run_outside_runtime("close", || self.shutdown()) {
            Ok(result) => result,
            Err(err) => {
                // The shutdown thread never ran to completion; descriptors
                // still have to go.
                self.drain_tun_devices();
                *self.state.lock() = ServiceState::Closed;
                Err(err)
            }
        }
    }

    fn shutdown(&self) -> Result<()> {
        self.scope.cancel();
        self.history.close();

        let result = match self.runtime.lock().take() {
            Some(runtime) => {
                let result = self.close_engine(&runtime);
                runtime.shutdown_background();
                result
            }
            None => Ok(()),
        };

        self.drain_tun_devices();
        *self.state.lock() = ServiceState::Closed;

        let handle = self.handle();
        match &result {
            Ok(()) => {
                info!("service closed");
                self.emit(ServiceEvent::Closed { handle });
            }
            Err(Error::FatalTimeout(_)) => {
                self.emit(ServiceEvent::CloseTimedOut {
                    handle,
                    timeout_ms: self.config.fatal_stop.deadline().as_millis() as u64,
                });
            }
            Err(err) => {
                warn!(error = %err, "service close failed");
                self.emit(ServiceEvent::CloseFailed {
                    handle,
                    message: err.to_string(),
                });
            }
        }
        result
    }

    pub fn pause(&self) {
        if self.transition(ServiceState::Started, ServiceState::Paused).is_ok() {
            self.pause.device_pause();
            self.emit(ServiceEvent::Paused {
                handle: self.handle(),
            });
        } else {
            debug!(handle = self.handle(), state = %self.state(), "pause ignored");
        }
    }

    pub fn wake(&self) {
        if self.transition(ServiceState::Paused, ServiceState::Started).is_ok() {
            self.pause.device_wake();
            self.emit(ServiceEvent::Woken {
                handle: self.handle(),
            });
        } else {
            debug!(handle = self.handle(), state = %self.state(), "wake ignored");
        }
    }

    pub fn needs_wifi_state(&self) -> bool {
        self.engine.needs_wifi_state()
    }

    /// Waits for the engine to close, up to the fatal stop deadline.
    fn close_engine(&self, runtime: &Runtime) -> Result<()> {
        let deadline = self.config.fatal_stop.deadline();
        let engine = Arc::clone(&self.engine);
        let (done, finished) = mpsc::sync_channel(1);

        // The wait below happens on this thread, outside the runtime, so a
        // wedged engine cannot starve the deadline.
        runtime.spawn(async move {
            let result = engine.close().await;
            done.send(result).ok();
        });

        match finished.recv_timeout(deadline) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(Error::Engine(format!("close service: {:#}", err))),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(Error::Engine("engine close task aborted".to_string()))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let reason = format!(
                    "engine close exceeded {} ms",
                    deadline.as_millis()
                );
                error!(handle = self.handle(), "{}", reason);
                self.config.fatal_stop.trigger(&reason);
                Err(Error::FatalTimeout(reason))
            }
        }
    }

    fn drain_tun_devices(&self) {
        let report = self.config.tun_devices.drain_all();
        for (fd, message) in &report.failures {
            warn!(fd, error = %message, "tun device close failed during drain");
        }
        if report.closed > 0 || !report.is_clean() {
            self.config
                .events
                .emit(CoreEvent::Platform(PlatformEvent::TunDrained {
                    closed: report.closed,
                    failed: report.failures.len(),
                }))
                .ok();
        }
    }

    fn runtime_handle(&self) -> Result<runtime::Handle> {
        self.runtime
            .lock()
            .as_ref()
            .map(|runtime| runtime.handle().clone())
            .ok_or_else(|| Error::Validation("service runtime already shut down".to_string()))
    }

    fn transition(&self, from: ServiceState, to: ServiceState) -> Result<()> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(Error::Validation(format!(
                "cannot move service from {} to {}",
                state, to
            )));
        }
        *state = to;
        Ok(())
    }

    fn emit(&self, event: ServiceEvent) {
        self.config.events.emit(CoreEvent::Service(event)).ok();
    }
}

impl Drop for ServiceInstance {
    fn drop(&mut self) {
        self.scope.cancel();
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("handle", &self.handle())
            .field("state", &self.state())
            .field("affinity", &self.config.fix_thread_affinity)
            .finish()
    }
}

/// Runs `blocking` on the calling thread, or on a scoped helper thread when
/// the caller is inside a runtime, where blocking on another runtime or on a
/// channel would stall or panic.
fn run_outside_runtime<R, F>(operation: &str, blocking: F) -> Result<R>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    if runtime::Handle::try_current().is_err() {
        return Ok(blocking());
    }

    debug!(operation, "called from an async context; using a helper thread");
    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name(format!("{}-{}", ENGINE_THREAD_NAME, operation))
            .spawn_scoped(scope, blocking)?;
        worker
            .join()
            .map_err(|_| Error::Engine(format!("service {} panicked", operation)))
    })
}
