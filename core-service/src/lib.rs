//! Service lifecycle coordination and the boundary façade.
//!
//! This crate ties a host-supplied [`CapabilitySet`](bridge_traits::CapabilitySet)
//! to a tunnel engine: it builds the platform bridge, hands the engine its
//! cancellation scope, pause manager and URL test history, registers the
//! result under an opaque handle and guarantees bounded, leak-free shutdown.
//!
//! Hosts talk to [`Boundary`]; the C ABI in `bridge-ffi` is a translation of
//! the same calls.

pub mod boundary;
pub mod engine;
pub mod handle_table;
pub mod history;
pub mod instance;
pub mod pause;
pub mod service_error;
pub mod shutdown;

pub use boundary::{Boundary, VERSION};
pub use core_runtime::config::SetupOptions;
pub use core_runtime::{Error, Result};
pub use engine::{EngineContext, EngineFactory, TunnelEngine};
pub use handle_table::{HandleTable, INVALID_HANDLE};
pub use history::{UrlTestHistory, UrlTestRecord};
pub use instance::{ServiceConfig, ServiceInstance, ServiceState};
pub use pause::{PauseManager, PauseState};
pub use service_error::BoundaryErrorChannel;
pub use shutdown::{FatalStopPolicy, FATAL_STOP_TIMEOUT};
