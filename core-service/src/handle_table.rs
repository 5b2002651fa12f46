//! Opaque handle registry.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use core_runtime::{Error, Result};
use dashmap::DashMap;

/// Returned across the boundary when construction fails.
pub const INVALID_HANDLE: i64 = -1;

/// Maps opaque handles to owned values.
///
/// Handles start at 1, only ever increase and are never reused within the
/// process, even after removal.
pub struct HandleTable<T> {
    entries: DashMap<i64, Arc<T>>,
    next: AtomicI64,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next: AtomicI64::new(1),
        }
    }

    /// Inserts a fully constructed value and returns its handle.
    pub fn register(&self, value: Arc<T>) -> i64 {
        self.register_with(|_| value)
    }

    /// Allocates a handle and inserts whatever `build` makes of it.
    ///
    /// The value is constructed before it becomes reachable, so lookups
    /// never see it without its handle.
    pub fn register_with<F>(&self, build: F) -> i64
    where
        F: FnOnce(i64) -> Arc<T>,
    {
        let handle = self.next.fetch_add(1, Ordering::SeqCst);
        self.entries.insert(handle, build(handle));
        handle
    }

    pub fn lookup(&self, handle: i64) -> Result<Arc<T>> {
        self.entries
            .get(&handle)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::NotFound("service not found".to_string()))
    }

    /// Removes `handle`. Idempotent; returns the value if it was present.
    pub fn remove(&self, handle: i64) -> Option<Arc<T>> {
        self.entries.remove(&handle).map(|(_, value)| value)
    }

    pub fn contains(&self, handle: i64) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for HandleTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleTable")
            .field("len", &self.entries.len())
            .field("next", &self.next.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_handles_start_at_one() {
        let table = HandleTable::new();
        assert_eq!(table.register(Arc::new("a")), 1);
        assert_eq!(table.register(Arc::new("b")), 2);
    }

    #[test]
    fn test_removed_handles_are_not_reused() {
        let table = HandleTable::new();
        let first = table.register(Arc::new(1u8));
        assert!(table.remove(first).is_some());
        assert!(table.remove(first).is_none());

        let second = table.register(Arc::new(2u8));
        assert!(second > first);
        assert!(matches!(table.lookup(first), Err(Error::NotFound(_))));
        assert_eq!(*table.lookup(second).unwrap(), 2);
    }

    #[test]
    fn test_concurrent_registration_is_unique() {
        let table = Arc::new(HandleTable::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    (0..250)
                        .map(|i| table.register(Arc::new(i)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut handles: Vec<i64> = workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .collect();
        handles.sort_unstable();
        handles.dedup();

        assert_eq!(handles.len(), 2000);
        assert_eq!(handles.first(), Some(&1));
        assert_eq!(handles.last(), Some(&2000));
        assert_eq!(table.len(), 2000);
    }

    #[test]
    fn test_register_with_sees_its_own_handle() {
        let table = HandleTable::new();
        table.register(Arc::new(0));

        let handle = table.register_with(|handle| Arc::new(handle));
        assert_eq!(handle, 2);
        assert_eq!(*table.lookup(handle).unwrap(), handle);
    }
}
