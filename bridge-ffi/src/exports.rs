//! `extern "C"` entry points.
//!
//! Conventions shared by every function here:
//!
//! - Functions returning `*mut c_char` return null on success and an owned
//!   error message on failure. The host releases it with [`FreeString`].
//! - Out-parameters are only written on success.
//! - Handles are positive; `NewService` returns `-1` on failure and leaves
//!   the message in [`GetLastBoundaryError`].

#![allow(non_snake_case)]

use std::ffi::{c_char, c_int};
use std::ptr;

use core_runtime::config::SetupOptions;
use core_service::{Boundary, INVALID_HANDLE};
use tracing::debug;

use crate::callbacks::PlatformCallbacks;
use crate::strings::{error_string, free_host_string, from_host_str, to_host_string};

fn ok_or_message<T, E: std::fmt::Display>(result: Result<T, E>) -> *mut c_char {
    match result {
        Ok(_) => ptr::null_mut(),
        Err(err) => error_string(err),
    }
}

/// # Safety
///
/// `value` must be null or a string returned by this library that has not
/// been freed.
#[no_mangle]
pub unsafe extern "C" fn FreeString(value: *mut c_char) {
    free_host_string(value);
}

/// # Safety
///
/// Same contract as [`FreeString`].
#[no_mangle]
pub unsafe extern "C" fn FreeBytes(data: *mut c_char) {
    free_host_string(data);
}

/// # Safety
///
/// Path arguments must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn Setup(
    base_path: *const c_char,
    working_path: *const c_char,
    temp_path: *const c_char,
    is_restricted_os: c_int,
    fix_thread_affinity: c_int,
) -> *mut c_char {
    let (Some(base), Some(working), Some(temp)) = (
        from_host_str(base_path),
        from_host_str(working_path),
        from_host_str(temp_path),
    ) else {
        return to_host_string("path parameters cannot be null");
    };

    let options = SetupOptions::builder()
        .base_path(&*base)
        .working_path(&*working)
        .temp_path(&*temp)
        .is_restricted_os(is_restricted_os != 0)
        .fix_thread_affinity(fix_thread_affinity != 0)
        .build();
    ok_or_message(options.and_then(|options| Boundary::global().setup(options)))
}

#[no_mangle]
pub extern "C" fn Version() -> *mut c_char {
    to_host_string(Boundary::global().version())
}

/// # Safety
///
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn RedirectStderr(path: *const c_char) -> *mut c_char {
    let Some(path) = from_host_str(path) else {
        return to_host_string("path is null");
    };
    ok_or_message(Boundary::global().redirect_stderr(&*path))
}

/// Creates a service and returns its handle, or `-1`.
///
/// The callback table is copied; the host may free it after the call.
///
/// # Safety
///
/// `config_content` must be null or a valid NUL-terminated string and
/// `platform` null or a valid pointer to a `PlatformCallbacks`.
#[no_mangle]
pub unsafe extern "C" fn NewService(
    config_content: *const c_char,
    platform: *const PlatformCallbacks,
) -> i64 {
    let boundary = Boundary::global();
    let Some(callbacks) = platform.as_ref().copied() else {
        boundary.reject_create("PlatformInterface is null");
        return INVALID_HANDLE;
    };
    let Some(config) = from_host_str(config_content) else {
        boundary.reject_create("configContent is null");
        return INVALID_HANDLE;
    };

    match boundary.create_service(&config, callbacks.into_capabilities()) {
        Ok(handle) => handle,
        Err(_) => INVALID_HANDLE,
    }
}

/// Message of the last failed `NewService`; empty when there is none.
#[no_mangle]
pub extern "C" fn GetLastBoundaryError() -> *mut c_char {
    to_host_string(&Boundary::global().last_error())
}

#[no_mangle]
pub extern "C" fn ServiceStart(handle: i64) -> *mut c_char {
    ok_or_message(Boundary::global().start_service(handle))
}

#[no_mangle]
pub extern "C" fn ServiceClose(handle: i64) -> *mut c_char {
    ok_or_message(Boundary::global().close_service(handle))
}

#[no_mangle]
pub extern "C" fn ServicePause(handle: i64) {
    Boundary::global().pause_service(handle);
}

#[no_mangle]
pub extern "C" fn ServiceWake(handle: i64) {
    Boundary::global().wake_service(handle);
}

#[no_mangle]
pub extern "C" fn ServiceNeedWIFIState(handle: i64) -> c_int {
    c_int::from(Boundary::global().needs_wifi_state(handle))
}

/// # Safety
///
/// `config_content` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn CheckConfig(config_content: *const c_char) -> *mut c_char {
    let Some(config) = from_host_str(config_content) else {
        return to_host_string("configContent is null");
    };
    ok_or_message(Boundary::global().validate_config(&config))
}

/// # Safety
///
/// `config_content` must be null or a valid NUL-terminated string and
/// `formatted_out` null or valid for one pointer write.
#[no_mangle]
pub unsafe extern "C" fn FormatConfig(
    config_content: *const c_char,
    formatted_out: *mut *mut c_char,
) -> *mut c_char {
    let Some(config) = from_host_str(config_content) else {
        return to_host_string("configContent is null");
    };
    if formatted_out.is_null() {
        return to_host_string("formattedOut is null");
    }

    match Boundary::global().format_config(&config) {
        Ok(formatted) => {
            *formatted_out = to_host_string(&formatted);
            ptr::null_mut()
        }
        Err(err) => error_string(err),
    }
}

#[no_mangle]
pub extern "C" fn ClearServiceError() {
    Boundary::global().clear_boundary_error();
}

/// Moves the pending service error into `error_out`. Leaves it untouched
/// when there is none.
///
/// # Safety
///
/// `error_out` must be null or valid for one pointer write.
#[no_mangle]
pub unsafe extern "C" fn ReadServiceError(error_out: *mut *mut c_char) -> *mut c_char {
    if error_out.is_null() {
        return to_host_string("errorOut is null");
    }
    match Boundary::global().read_boundary_error() {
        Ok(Some(message)) => {
            *error_out = to_host_string(&message);
            ptr::null_mut()
        }
        Ok(None) => {
            debug!("no pending service error");
            ptr::null_mut()
        }
        Err(err) => error_string(err),
    }
}

/// # Safety
///
/// `message` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn WriteServiceError(message: *const c_char) -> *mut c_char {
    let Some(message) = from_host_str(message) else {
        return to_host_string("message is null");
    };
    ok_or_message(Boundary::global().write_boundary_error(&message))
}
