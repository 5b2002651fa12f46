//! TUN acquisition through the bridge and concurrent teardown

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{CapabilitySet, TunDevice, TunOptions, TunProvider};
use core_platform::{PlatformBridge, PlatformInterface, TunDeviceTable};
use core_runtime::events::{CoreEvent, EventBus, PlatformEvent};
use core_runtime::Error;
use parking_lot::Mutex;

/// Close counts per descriptor, shared by every fake device.
#[derive(Default)]
struct CloseLedger {
    closes: Mutex<HashMap<i32, usize>>,
}

impl CloseLedger {
    fn count(&self, fd: i32) -> usize {
        self.closes.lock().get(&fd).copied().unwrap_or(0)
    }
}

struct FakeDevice {
    fd: i32,
    ledger: Arc<CloseLedger>,
}

impl TunDevice for FakeDevice {
    fn fd(&self) -> i32 {
        self.fd
    }

    fn close(&self) -> BridgeResult<()> {
        *self.ledger.closes.lock().entry(self.fd).or_insert(0) += 1;
        Ok(())
    }
}

struct FakeProvider {
    next_fd: AtomicI32,
    ledger: Arc<CloseLedger>,
}

impl TunProvider for FakeProvider {
    fn open_tun(&self, _options: &TunOptions) -> BridgeResult<Box<dyn TunDevice>> {
        Ok(Box::new(FakeDevice {
            fd: self.next_fd.fetch_add(1, Ordering::SeqCst),
            ledger: Arc::clone(&self.ledger),
        }))
    }
}

fn bridge_with_provider(first_fd: i32) -> (PlatformBridge, Arc<CloseLedger>) {
    let ledger = Arc::new(CloseLedger::default());
    let provider = Arc::new(FakeProvider {
        next_fd: AtomicI32::new(first_fd),
        ledger: Arc::clone(&ledger),
    });
    let bridge = PlatformBridge::new(
        CapabilitySet::builder().tun_provider(provider).build(),
        Arc::new(TunDeviceTable::new()),
    );
    (bridge, ledger)
}

#[test]
fn test_open_tun_tracks_and_release_closes() {
    let (bridge, ledger) = bridge_with_provider(40);
    let events = EventBus::new(8);
    let mut rx = events.subscribe();
    let bridge = bridge.with_events(events);

    let fd = bridge.open_tun(&TunOptions::default()).unwrap();
    assert_eq!(fd, 40);
    assert!(bridge.tun_devices().contains(fd));

    bridge.release_tun(fd).unwrap();
    assert!(!bridge.tun_devices().contains(fd));
    assert_eq!(ledger.count(fd), 1);

    assert!(matches!(bridge.release_tun(fd), Err(Error::NotFound(_))));
    assert_eq!(ledger.count(fd), 1);

    assert_eq!(
        rx.try_recv().unwrap(),
        CoreEvent::Platform(PlatformEvent::TunOpened { fd: 40 })
    );
    assert_eq!(
        rx.try_recv().unwrap(),
        CoreEvent::Platform(PlatformEvent::TunReleased { fd: 40 })
    );
}

#[test]
fn test_drain_after_open_closes_everything_once() {
    let (bridge, ledger) = bridge_with_provider(100);
    let fds: Vec<i32> = (0..4)
        .map(|_| bridge.open_tun(&TunOptions::default()).unwrap())
        .collect();

    bridge.release_tun(fds[0]).unwrap();
    let report = bridge.tun_devices().drain_all();

    assert_eq!(report.closed, 3);
    assert!(report.is_clean());
    for fd in fds {
        assert_eq!(ledger.count(fd), 1, "fd {} closed more or less than once", fd);
    }
}

#[test]
fn test_concurrent_store_and_drain_close_each_fd_exactly_once() {
    const WRITERS: i32 = 8;
    const PER_WRITER: i32 = 200;

    let table = Arc::new(TunDeviceTable::new());
    let ledger = Arc::new(CloseLedger::default());

    let mut workers = Vec::new();
    for writer in 0..WRITERS {
        let table = Arc::clone(&table);
        let ledger = Arc::clone(&ledger);
        workers.push(thread::spawn(move || {
            for i in 0..PER_WRITER {
                let fd = writer * PER_WRITER + i;
                table.store(
                    fd,
                    Box::new(FakeDevice {
                        fd,
                        ledger: Arc::clone(&ledger),
                    }),
                );
            }
        }));
    }
    for _ in 0..4 {
        let table = Arc::clone(&table);
        workers.push(thread::spawn(move || {
            for _ in 0..50 {
                table.drain_all();
                thread::yield_now();
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    // Whatever the interleaving, a final drain leaves nothing open.
    table.drain_all();
    assert!(table.is_empty());
    for fd in 0..WRITERS * PER_WRITER {
        assert_eq!(ledger.count(fd), 1, "fd {} closed {} times", fd, ledger.count(fd));
    }
}
