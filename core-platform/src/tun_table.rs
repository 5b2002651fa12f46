//! TUN Device Table
//!
//! Tracks every TUN device handed to the engine, keyed by descriptor, so
//! that teardown can close whatever the engine did not release itself.
//!
//! Removing an entry and closing its device happen under the table lock as
//! one step: no caller can observe an entry that is present but closed, or
//! removed but still open. Device `close` is an OS call, never a host
//! callback, so holding the lock across it cannot re-enter the boundary.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use bridge_traits::TunDevice;
use core_runtime::{Error, Result};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Outcome of [`TunDeviceTable::drain_all`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// Devices closed cleanly
    pub closed: usize,
    /// Descriptors whose close failed, with the failure message
    pub failures: Vec<(i32, String)>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
pub struct TunDeviceTable {
    devices: Mutex<HashMap<i32, Box<dyn TunDevice>>>,
}

impl TunDeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table. Empty at startup, never torn down.
    pub fn global() -> Arc<TunDeviceTable> {
        static GLOBAL: OnceLock<Arc<TunDeviceTable>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TunDeviceTable::new())))
    }

    /// Tracks `device` under `fd`.
    ///
    /// A descriptor that is already tracked means the OS reused a number the
    /// table still believes is open. The previous device is closed first so
    /// it cannot leak.
    pub fn store(&self, fd: i32, device: Box<dyn TunDevice>) {
        let mut devices = self.devices.lock();
        if let Some(previous) = devices.remove(&fd) {
            warn!(fd, "descriptor reused while still tracked; closing previous device");
            if let Err(err) = previous.close() {
                warn!(fd, error = %err, "failed to close previous device");
            }
        }
        devices.insert(fd, device);
        debug!(fd, tracked = devices.len(), "stored tun device");
    }

    /// Closes and forgets the device tracked under `fd`.
    ///
    /// Returns [`Error::NotFound`] if nothing is tracked, and
    /// [`Error::ResourceLeakGuardTriggered`] if the close itself failed. The
    /// entry is gone in both failure cases.
    pub fn remove(&self, fd: i32) -> Result<()> {
        let mut devices = self.devices.lock();
        let device = devices
            .remove(&fd)
            .ok_or_else(|| Error::NotFound(format!("tun device {}", fd)))?;

        device.close().map_err(|err| {
            warn!(fd, error = %err, "failed to close tun device");
            Error::ResourceLeakGuardTriggered(format!("close tun device {}: {}", fd, err))
        })
    }

    /// Closes and forgets every tracked device.
    ///
    /// A failing device is recorded in the report and draining continues.
    pub fn drain_all(&self) -> DrainReport {
        let mut devices = self.devices.lock();
        let mut report = DrainReport::default();

        for (fd, device) in devices.drain() {
            match device.close() {
                Ok(()) => report.closed += 1,
                Err(err) => {
                    warn!(fd, error = %err, "resource leak guard triggered while draining");
                    report.failures.push((fd, err.to_string()));
                }
            }
        }

        if report.closed > 0 || !report.failures.is_empty() {
            debug!(
                closed = report.closed,
                failed = report.failures.len(),
                "drained tun devices"
            );
        }
        report
    }

    pub fn contains(&self, fd: i32) -> bool {
        self.devices.lock().contains_key(&fd)
    }

    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.lock().is_empty()
    }
}

impl std::fmt::Debug for TunDeviceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunDeviceTable")
            .field("tracked", &self.len())
            .finish()
    }
}
