//! # Event Bus System
//!
//! Lifecycle notifications for services and the OS resources they hold,
//! published on a `broadcast` channel so that hosts, tests and diagnostics can
//! observe transitions without being on the call path.
//!
//! ## Overview
//!
//! - **Event Types**: [`ServiceEvent`] for handle lifecycle, [`PlatformEvent`]
//!   for TUN descriptors and DNS exchanges, both wrapped in [`CoreEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐
//! │ ServiceInstance  ├──────────>│           │   subscribe   ┌────────────┐
//! └──────────────────┘           │ EventBus  ├──────────────>│ Subscriber │
//! ┌──────────────────┐   emit    │ (broadcast│               └────────────┘
//! │ PlatformBridge   ├──────────>│  channel) │
//! └──────────────────┘           └───────────┘
//! ```
//!
//! Emitting never blocks and never fails the operation that emitted: with no
//! subscribers the event is simply dropped.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ServiceEvent};
//!
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Service(ServiceEvent::Started { handle: 1 })).ok();
//! assert_eq!(
//!     rx.try_recv().unwrap(),
//!     CoreEvent::Service(ServiceEvent::Started { handle: 1 })
//! );
//! ```

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use broadcast::error::{RecvError, SendError};
pub use broadcast::Receiver;

/// Default buffer size for the event bus
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Service handle lifecycle
    Service(ServiceEvent),
    /// OS resources and host-bound requests
    Platform(PlatformEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Service(e) => e.description(),
            CoreEvent::Platform(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Service(ServiceEvent::StartFailed { .. })
            | CoreEvent::Service(ServiceEvent::CloseFailed { .. }) => EventSeverity::Error,
            CoreEvent::Service(ServiceEvent::CloseTimedOut { .. }) => EventSeverity::Error,
            CoreEvent::Platform(PlatformEvent::TunDrained { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Service(ServiceEvent::Created { .. })
            | CoreEvent::Service(ServiceEvent::Started { .. })
            | CoreEvent::Service(ServiceEvent::Closed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Transitions of a service registered under a handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServiceEvent {
    Created { handle: i64 },
    Started { handle: i64 },
    StartFailed { handle: i64, message: String },
    Paused { handle: i64 },
    Woken { handle: i64 },
    Closed { handle: i64 },
    /// Engine close returned an error; resources were still drained.
    CloseFailed { handle: i64, message: String },
    /// Engine close exceeded the fatal-stop deadline.
    CloseTimedOut { handle: i64, timeout_ms: u64 },
}

impl ServiceEvent {
    pub fn description(&self) -> &str {
        match self {
            ServiceEvent::Created { .. } => "Service created",
            ServiceEvent::Started { .. } => "Service started",
            ServiceEvent::StartFailed { .. } => "Service failed to start",
            ServiceEvent::Paused { .. } => "Service paused",
            ServiceEvent::Woken { .. } => "Service woken",
            ServiceEvent::Closed { .. } => "Service closed",
            ServiceEvent::CloseFailed { .. } => "Service closed with an engine error",
            ServiceEvent::CloseTimedOut { .. } => "Service close timed out",
        }
    }

    pub fn handle(&self) -> i64 {
        match self {
            ServiceEvent::Created { handle }
            | ServiceEvent::Started { handle }
            | ServiceEvent::StartFailed { handle, .. }
            | ServiceEvent::Paused { handle }
            | ServiceEvent::Woken { handle }
            | ServiceEvent::Closed { handle }
            | ServiceEvent::CloseFailed { handle, .. }
            | ServiceEvent::CloseTimedOut { handle, .. } => *handle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlatformEvent {
    TunOpened { fd: i32 },
    TunReleased { fd: i32 },
    /// Every tracked descriptor was closed during teardown.
    TunDrained { closed: usize, failed: usize },
    /// A DNS query was abandoned before the host answered.
    DnsExchangeCancelled { message_id: u16 },
}

impl PlatformEvent {
    pub fn description(&self) -> &str {
        match self {
            PlatformEvent::TunOpened { .. } => "TUN device opened",
            PlatformEvent::TunReleased { .. } => "TUN device released",
            PlatformEvent::TunDrained { .. } => "TUN devices drained",
            PlatformEvent::DnsExchangeCancelled { .. } => "DNS exchange cancelled",
        }
    }
}

/// Central broadcast channel for [`CoreEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events that match `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[core_async::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus
            .emit(CoreEvent::Service(ServiceEvent::Closed { handle: 1 }))
            .is_err());
    }

    #[core_async::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Platform(PlatformEvent::TunOpened { fd: 12 });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[core_async::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Service(_)));

        bus.emit(CoreEvent::Platform(PlatformEvent::TunReleased { fd: 3 }))
            .ok();
        let started = CoreEvent::Service(ServiceEvent::Started { handle: 4 });
        bus.emit(started.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), started);
        assert!(stream.try_recv().is_none());
    }

    #[core_async::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for handle in 0..5 {
            bus.emit(CoreEvent::Service(ServiceEvent::Paused { handle }))
                .ok();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(3)))));
    }

    #[test]
    fn test_severity() {
        let timed_out = CoreEvent::Service(ServiceEvent::CloseTimedOut {
            handle: 1,
            timeout_ms: 10_000,
        });
        assert_eq!(timed_out.severity(), EventSeverity::Error);

        let clean_drain = CoreEvent::Platform(PlatformEvent::TunDrained {
            closed: 2,
            failed: 0,
        });
        assert_eq!(clean_drain.severity(), EventSeverity::Debug);

        let leaky_drain = CoreEvent::Platform(PlatformEvent::TunDrained {
            closed: 1,
            failed: 1,
        });
        assert_eq!(leaky_drain.severity(), EventSeverity::Warning);
    }

    #[test]
    fn test_serialization_shape() {
        let event = CoreEvent::Service(ServiceEvent::StartFailed {
            handle: 9,
            message: "bind: address in use".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Service");
        assert_eq!(json["payload"]["event"], "start_failed");
        assert_eq!(json["payload"]["handle"], 9);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.description(), "Service failed to start");
    }
}
