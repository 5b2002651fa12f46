//! String ownership across the boundary.
//!
//! Every string handed to the host is allocated with `malloc`, so it can be
//! released either through `FreeString` or with the host's own `free`.

use std::borrow::Cow;
use std::ffi::{c_char, CStr, CString};
use std::fmt::Display;
use std::ptr;

/// Copies `value` into a new `malloc` allocation. The copy stops at the first
/// NUL byte. Returns null if the allocation fails.
pub fn to_host_string(value: &str) -> *mut c_char {
    let bytes = value.as_bytes();
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());

    // SAFETY: the allocation holds `len + 1` bytes; we write exactly that.
    unsafe {
        let buffer = libc::malloc(len + 1).cast::<c_char>();
        if buffer.is_null() {
            return ptr::null_mut();
        }
        ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), buffer, len);
        *buffer.add(len) = 0;
        buffer
    }
}

/// Owned error message for the host.
pub fn error_string(err: impl Display) -> *mut c_char {
    to_host_string(&err.to_string())
}

/// Releases a string previously returned to the host. Null is ignored.
///
/// # Safety
///
/// `value` must be null or a pointer obtained from [`to_host_string`] (or
/// another `malloc` allocation) that has not been freed yet.
pub unsafe fn free_host_string(value: *mut c_char) {
    if !value.is_null() {
        libc::free(value.cast());
    }
}

/// Borrows a host string. Invalid UTF-8 is replaced; null yields `None`.
///
/// # Safety
///
/// `value` must be null or point to a NUL-terminated string that stays valid
/// for `'a`.
pub unsafe fn from_host_str<'a>(value: *const c_char) -> Option<Cow<'a, str>> {
    if value.is_null() {
        None
    } else {
        Some(CStr::from_ptr(value).to_string_lossy())
    }
}

/// Converts `value` for a host callback argument, dropping interior NULs.
pub fn callback_arg(value: &str) -> CString {
    match CString::new(value) {
        Ok(arg) => arg,
        Err(err) => {
            let mut bytes = err.into_vec();
            bytes.retain(|&b| b != 0);
            CString::new(bytes).unwrap_or_default()
        }
    }
}
