//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the platform bridge and the service
//! layer:
//! - Error taxonomy surfaced across the native boundary
//! - Boot configuration (`SetupOptions`) and the engine options model
//! - Logging and tracing, with mirroring into a host `LoggerSink`
//! - Service lifecycle event bus
//!
//! ## Overview
//!
//! Nothing in this crate talks to the host directly. It establishes the
//! conventions (errors, logging, configuration, events) that `core-platform`,
//! `core-service` and `bridge-ffi` build on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod options;

pub use error::{Error, Result};
