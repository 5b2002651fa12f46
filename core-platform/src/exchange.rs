//! Cancellable Exchange
//!
//! An [`ExchangeContext`] pairs one request that is waiting on the host with
//! the engine-side cancellation scope it was issued under.
//!
//! ```text
//!            success / error                 scope cancelled
//!   Pending ─────────────────> Delivered     Pending ────────> Cancelled
//!                              Failed                            │
//!                                                                └─> host on_cancel callbacks
//! ```
//!
//! The result slot accepts exactly one write. Whichever of "host answered"
//! and "scope cancelled" lands first wins; the loser is told so through the
//! `false` return value and changes nothing.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_traits::{CancelCallback, ExchangeResponder};
use core_async::cancel::CancellationToken;
use core_async::sync::watch;
use futures::future::{self, Either};
use parking_lot::Mutex;
use tracing::trace;

static NEXT_EXCHANGE_ID: AtomicU64 = AtomicU64::new(1);

/// State of the single-assignment result slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Pending,
    /// Raw response message
    Delivered(Vec<u8>),
    /// Resolved addresses (lookup mode)
    Addresses(Vec<IpAddr>),
    Failed(String),
    Cancelled,
}

impl ExchangeOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, ExchangeOutcome::Pending)
    }
}

pub struct ExchangeContext {
    id: u64,
    token: CancellationToken,
    slot: watch::Sender<ExchangeOutcome>,
    cancel_callbacks: Mutex<Vec<CancelCallback>>,
}

impl ExchangeContext {
    /// Creates a pending exchange bound to a child of `scope`.
    pub fn new(scope: &CancellationToken) -> Arc<Self> {
        let (slot, _) = watch::channel(ExchangeOutcome::Pending);
        Arc::new(Self {
            id: NEXT_EXCHANGE_ID.fetch_add(1, Ordering::Relaxed),
            token: scope.child_token(),
            slot,
            cancel_callbacks: Mutex::new(Vec::new()),
        })
    }

    /// The token this exchange observes. Cancelling it cancels the exchange.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn outcome(&self) -> ExchangeOutcome {
        self.slot.borrow().clone()
    }

    /// Writes `outcome` if the slot is still pending. First write wins.
    fn complete(&self, outcome: ExchangeOutcome) -> bool {
        self.slot.send_if_modified(|current| {
            if current.is_pending() {
                *current = outcome;
                true
            } else {
                false
            }
        })
    }

    /// Marks the exchange cancelled and runs the host's cancel callbacks.
    ///
    /// Returns `false` if a result was already delivered, in which case no
    /// callback runs.
    pub fn cancel(&self) -> bool {
        if !self.complete(ExchangeOutcome::Cancelled) {
            return false;
        }
        trace!(exchange_id = self.id, "exchange cancelled");

        let callbacks = std::mem::take(&mut *self.cancel_callbacks.lock());
        for callback in callbacks {
            callback();
        }
        true
    }

    /// Starts the watcher that turns scope cancellation into
    /// [`ExchangeOutcome::Cancelled`]. The watcher exits without side
    /// effects once a result is delivered.
    pub fn spawn_watcher(self: &Arc<Self>) {
        let context = Arc::clone(self);
        let mut outcome = self.slot.subscribe();

        core_async::spawn(async move {
            let cancelled = Box::pin(context.token.cancelled());
            let settled = Box::pin(outcome.wait_for(|state| !state.is_pending()));

            let cancelled_first = matches!(
                future::select(cancelled, settled).await,
                Either::Left(_)
            );
            if cancelled_first {
                context.cancel();
            }
        });
    }

    /// Waits until the slot leaves [`ExchangeOutcome::Pending`].
    pub async fn wait(&self) -> ExchangeOutcome {
        let mut outcome = self.slot.subscribe();
        let settled = match outcome.wait_for(|state| !state.is_pending()).await {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => ExchangeOutcome::Cancelled,
        };
        settled
    }
}

impl ExchangeResponder for ExchangeContext {
    fn id(&self) -> u64 {
        self.id
    }

    fn success(&self, message: Vec<u8>) -> bool {
        self.complete(ExchangeOutcome::Delivered(message))
    }

    fn success_addresses(&self, addresses: Vec<IpAddr>) -> bool {
        self.complete(ExchangeOutcome::Addresses(addresses))
    }

    fn error(&self, message: String) -> bool {
        self.complete(ExchangeOutcome::Failed(message))
    }

    fn on_cancel(&self, callback: CancelCallback) {
        let mut callbacks = self.cancel_callbacks.lock();
        if *self.slot.borrow() == ExchangeOutcome::Cancelled {
            drop(callbacks);
            callback();
            return;
        }
        callbacks.push(callback);
    }

    fn is_cancelled(&self) -> bool {
        *self.slot.borrow() == ExchangeOutcome::Cancelled
    }
}

impl std::fmt::Debug for ExchangeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeContext")
            .field("id", &self.id)
            .field("outcome", &*self.slot.borrow())
            .finish()
    }
}
