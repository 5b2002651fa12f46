//! # Core Platform
//!
//! The engine-facing half of the host bridge.
//!
//! ## Overview
//!
//! A host supplies a [`CapabilitySet`](bridge_traits::CapabilitySet); this
//! crate turns it into a [`PlatformInterface`], the contract the engine codes
//! against. Every capability is optional and each one has its own rule for
//! what happens when it is missing (see [`PlatformBridge`]).
//!
//! ## Components
//!
//! - [`TunDeviceTable`]: descriptors of open TUN devices, closed exactly once
//! - [`ExchangeContext`]: one cancellable request waiting on a host answer
//! - [`DnsExchangeBridge`]: DNS messages forwarded to the host resolver
//! - [`PlatformBridge`]: the [`PlatformInterface`] implementation
//! - [`PlatformLogSink`]: engine log output routed to the host logger

pub mod bridge;
pub mod dns;
pub mod exchange;
pub mod platform;
pub mod tun_table;

pub use bridge::{PlatformBridge, PlatformLogSink, ENGINE_LOG_TARGET};
pub use dns::{DnsExchangeBridge, LOOKUP_ANSWER_TTL};
pub use exchange::{ExchangeContext, ExchangeOutcome};
pub use platform::PlatformInterface;
pub use tun_table::{DrainReport, TunDeviceTable};
