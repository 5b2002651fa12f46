//! Host callback table and the capability adapters built on it.
//!
//! A C host describes itself with a [`PlatformCallbacks`] struct of nullable
//! function pointers. The struct is copied when a service is created; each
//! non-null slot becomes one capability in the resulting
//! [`CapabilitySet`]. Null slots simply leave the capability out, and the
//! platform bridge degrades accordingly.

use std::ffi::c_char;
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{
    CapabilitySet, ConnectionOwnerLookup, ConnectionOwnerRequest, DefaultInterfaceUpdate,
    InterfaceUpdateListener, LogEntry, LoggerSink, LogLevel, PackageResolver,
};
use core_platform::ENGINE_LOG_TARGET;

use crate::strings::{callback_arg, free_host_string, from_host_str};

pub type WriteLogFn = unsafe extern "C" fn(message: *const c_char);

pub type FindConnectionOwnerFn = unsafe extern "C" fn(
    ip_protocol: i32,
    source_address: *const c_char,
    source_port: i32,
    destination_address: *const c_char,
    destination_port: i32,
) -> i32;

/// Returns a `malloc`ed package name, or null when the uid is unknown.
pub type PackageNameByUidFn = unsafe extern "C" fn(uid: i32) -> *mut c_char;

pub type UidByPackageNameFn = unsafe extern "C" fn(package_name: *const c_char) -> i32;

pub type InterfaceUpdateFn = unsafe extern "C" fn(
    interface_name: *const c_char,
    interface_index: i32,
    is_expensive: i32,
    is_constrained: i32,
);

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformCallbacks {
    pub write_log: Option<WriteLogFn>,
    pub find_connection_owner: Option<FindConnectionOwnerFn>,
    pub package_name_by_uid: Option<PackageNameByUidFn>,
    pub uid_by_package_name: Option<UidByPackageNameFn>,
    pub interface_update: Option<InterfaceUpdateFn>,
}

impl PlatformCallbacks {
    pub fn into_capabilities(self) -> CapabilitySet {
        let mut builder = CapabilitySet::builder();

        if let Some(write_log) = self.write_log {
            builder = builder.logger(Arc::new(HostLogger { write_log }));
        }
        if let Some(find) = self.find_connection_owner {
            builder = builder.connection_owner(Arc::new(HostConnectionOwner { find }));
        }
        if self.package_name_by_uid.is_some() || self.uid_by_package_name.is_some() {
            builder = builder.package_resolver(Arc::new(HostPackageResolver {
                by_uid: self.package_name_by_uid,
                by_name: self.uid_by_package_name,
            }));
        }
        if let Some(update) = self.interface_update {
            builder = builder.interface_updates(Arc::new(HostInterfaceUpdates { update }));
        }

        builder.build()
    }
}

struct HostLogger {
    write_log: WriteLogFn,
}

#[async_trait]
impl LoggerSink for HostLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        // Engine output is already formatted by the engine.
        let line = if entry.target == ENGINE_LOG_TARGET {
            callback_arg(&entry.message)
        } else {
            callback_arg(&entry.to_line())
        };
        // SAFETY: the host guarantees the slot is callable; `line` outlives
        // the call.
        unsafe { (self.write_log)(line.as_ptr()) };
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Trace
    }
}

struct HostConnectionOwner {
    find: FindConnectionOwnerFn,
}

impl ConnectionOwnerLookup for HostConnectionOwner {
    fn find_connection_owner(&self, request: &ConnectionOwnerRequest) -> Result<i32> {
        let source = callback_arg(&request.source_address);
        let destination = callback_arg(&request.destination_address);

        // SAFETY: both strings outlive the call.
        let uid = unsafe {
            (self.find)(
                request.ip_protocol,
                source.as_ptr(),
                request.source_port,
                destination.as_ptr(),
                request.destination_port,
            )
        };
        if uid < 0 {
            return Err(BridgeError::NotFound(format!(
                "no owner for {}:{} -> {}:{}",
                request.source_address,
                request.source_port,
                request.destination_address,
                request.destination_port
            )));
        }
        Ok(uid)
    }
}

struct HostPackageResolver {
    by_uid: Option<PackageNameByUidFn>,
    by_name: Option<UidByPackageNameFn>,
}

impl PackageResolver for HostPackageResolver {
    fn package_name_by_uid(&self, uid: i32) -> Result<String> {
        let lookup = self
            .by_uid
            .ok_or_else(|| BridgeError::not_available("package_name_by_uid"))?;

        // SAFETY: the host returns null or a malloc'ed NUL-terminated string
        // that we own.
        unsafe {
            let raw = lookup(uid);
            let Some(name) = from_host_str(raw).map(|name| name.into_owned()) else {
                return Err(BridgeError::not_found("package not found"));
            };
            free_host_string(raw);
            Ok(name)
        }
    }

    fn uid_by_package_name(&self, package_name: &str) -> Result<i32> {
        let lookup = self
            .by_name
            .ok_or_else(|| BridgeError::not_available("uid_by_package_name"))?;
        let name = callback_arg(package_name);

        // SAFETY: `name` outlives the call.
        let uid = unsafe { lookup(name.as_ptr()) };
        if uid < 0 {
            return Err(BridgeError::NotFound(format!("package {}", package_name)));
        }
        Ok(uid)
    }
}

struct HostInterfaceUpdates {
    update: InterfaceUpdateFn,
}

impl InterfaceUpdateListener for HostInterfaceUpdates {
    fn update_default_interface(&self, update: DefaultInterfaceUpdate) {
        let name = callback_arg(&update.interface_name);
        // SAFETY: `name` outlives the call.
        unsafe {
            (self.update)(
                name.as_ptr(),
                update.interface_index,
                i32::from(update.is_expensive),
                i32::from(update.is_constrained),
            )
        };
    }
}
