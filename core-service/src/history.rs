//! URL test history.
//!
//! Latency tests record their last result per outbound tag. The store lives
//! as long as its service and is closed during teardown, after which writes
//! are ignored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use core_async::sync::broadcast;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::trace;

const UPDATE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlTestRecord {
    pub tested_at: DateTime<Utc>,
    /// Round-trip delay in milliseconds
    pub delay_ms: u16,
}

impl UrlTestRecord {
    pub fn now(delay_ms: u16) -> Self {
        Self {
            tested_at: Utc::now(),
            delay_ms,
        }
    }
}

pub struct UrlTestHistory {
    records: RwLock<HashMap<String, UrlTestRecord>>,
    updates: broadcast::Sender<String>,
    closed: AtomicBool,
}

impl UrlTestHistory {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            records: RwLock::new(HashMap::new()),
            updates,
            closed: AtomicBool::new(false),
        }
    }

    pub fn load(&self, tag: &str) -> Option<UrlTestRecord> {
        self.records.read().get(tag).cloned()
    }

    /// Records a result for `tag`. Returns `false` once the store is closed.
    pub fn store(&self, tag: &str, record: UrlTestRecord) -> bool {
        if self.is_closed() {
            return false;
        }
        trace!(tag, delay_ms = record.delay_ms, "url test recorded");
        self.records.write().insert(tag.to_string(), record);
        self.updates.send(tag.to_string()).ok();
        true
    }

    pub fn delete(&self, tag: &str) {
        if self.records.write().remove(tag).is_some() {
            self.updates.send(tag.to_string()).ok();
        }
    }

    /// Tags whose record changed.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> HashMap<String, UrlTestRecord> {
        self.records.read().clone()
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.records.write().clear();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for UrlTestHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UrlTestHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlTestHistory")
            .field("records", &self.records.read().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
