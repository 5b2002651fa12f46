//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service` for Rust hosts, `bridge-ffi` for the C ABI).
//! Host applications can depend on `tunnel-bridge-workspace` and enable the
//! documented features without needing to wire each crate individually.

#[cfg(feature = "service")]
pub use core_service;

#[cfg(feature = "ffi")]
pub use bridge_ffi;
