//! Engine seam.
//!
//! The routing engine itself lives outside this workspace. A host library
//! links one in by implementing [`EngineFactory`] and registering it with the
//! [`Boundary`](crate::Boundary) before creating services.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::LoggerSink;
use core_async::cancel::CancellationToken;
use core_platform::PlatformInterface;
use core_runtime::options::EngineOptions;

use crate::history::UrlTestHistory;
use crate::pause::PauseManager;

/// A constructed engine instance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TunnelEngine: Send + Sync {
    /// Brings up inbounds, outbounds and the router.
    async fn start(&self) -> anyhow::Result<()>;

    /// Tears everything down. Called at most once, after the root scope has
    /// been cancelled.
    async fn close(&self) -> anyhow::Result<()>;

    /// Whether routing rules consult the current Wi-Fi SSID/BSSID.
    fn needs_wifi_state(&self) -> bool;
}

/// Everything an engine is constructed with.
#[derive(Clone)]
pub struct EngineContext {
    pub options: EngineOptions,
    pub platform: Arc<dyn PlatformInterface>,
    /// Root cancellation scope of the owning service
    pub scope: CancellationToken,
    pub history: Arc<UrlTestHistory>,
    pub pause: PauseManager,
    /// Engine log output, forwarded to the host's `write_log`
    pub log_writer: Arc<dyn LoggerSink>,
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("inbounds", &self.options.inbound_types())
            .field("scope_cancelled", &self.scope.is_cancelled())
            .field("pause", &self.pause.state())
            .finish()
    }
}

/// Builds engines from parsed options.
///
/// `create` runs inside the owning service's runtime, so implementations may
/// spawn background tasks.
#[cfg_attr(test, mockall::automock)]
pub trait EngineFactory: Send + Sync {
    fn create(&self, context: EngineContext) -> anyhow::Result<Arc<dyn TunnelEngine>>;
}
