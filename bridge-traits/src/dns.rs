//! Local DNS Transport Abstraction
//!
//! Some hosts must resolve names through the OS resolver (VPN extensions on
//! Apple platforms, private DNS on Android). The core forwards those queries
//! through a [`LocalDnsTransport`] and waits for the host to answer through
//! the [`ExchangeResponder`] it was handed.
//!
//! The host may answer synchronously inside `exchange`, or keep the
//! responder and answer later from any thread. Exactly one answer is
//! accepted; every later call returns `false` and is ignored.

use std::net::IpAddr;
use std::sync::Arc;

use crate::error::{BridgeError, Result};

/// Callback invoked when the core abandons an exchange.
pub type CancelCallback = Box<dyn FnOnce() + Send + 'static>;

/// Single-assignment reply slot for one in-flight exchange.
pub trait ExchangeResponder: Send + Sync {
    /// Process-unique exchange identifier, useful for host-side bookkeeping.
    fn id(&self) -> u64;

    /// Deliver a raw DNS response message.
    fn success(&self, message: Vec<u8>) -> bool;

    /// Deliver resolved addresses (lookup mode).
    fn success_addresses(&self, addresses: Vec<IpAddr>) -> bool;

    /// Fail the exchange with a host error message.
    fn error(&self, message: String) -> bool;

    /// Register a callback that runs once if the core cancels the exchange
    /// before an answer is delivered. Runs immediately if already cancelled.
    fn on_cancel(&self, callback: CancelCallback);

    fn is_cancelled(&self) -> bool;
}

/// Host resolver reachable from the core
#[cfg_attr(test, mockall::automock)]
pub trait LocalDnsTransport: Send + Sync {
    /// Whether the host accepts raw wire-format messages. Non-raw transports
    /// are queried through [`lookup`](LocalDnsTransport::lookup).
    fn raw(&self) -> bool {
        true
    }

    /// Resolve a wire-format DNS message.
    fn exchange(&self, context: Arc<dyn ExchangeResponder>, message: &[u8]) -> Result<()>;

    /// Resolve `domain` to addresses. `network` is `"ip"`, `"ip4"` or `"ip6"`.
    fn lookup(
        &self,
        _context: Arc<dyn ExchangeResponder>,
        _network: &str,
        _domain: &str,
    ) -> Result<()> {
        Err(BridgeError::NotAvailable(
            "lookup is not supported by this transport".to_string(),
        ))
    }

    /// Drop any host-side resolver cache.
    fn clear_cache(&self) {}
}
