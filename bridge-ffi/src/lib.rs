//! # Bridge FFI
//!
//! C ABI over [`core_service::Boundary`]. Desktop hosts load this library as
//! a `cdylib`/`staticlib`, describe their capabilities with a
//! [`PlatformCallbacks`] table and drive services through integer handles.
//!
//! The tunnel engine itself is linked in by the embedding Rust code, which
//! registers it once with [`register_engine_factory`] before the host makes
//! any `NewService` call.
//!
//! TUN devices are not available through this ABI: there is no `open_tun`
//! slot in the callback table, so engines that need one fail at start with a
//! capability error.

mod callbacks;
mod exports;
mod strings;

use std::sync::Arc;

use core_service::{Boundary, EngineFactory};

pub use callbacks::{
    FindConnectionOwnerFn, InterfaceUpdateFn, PackageNameByUidFn, PlatformCallbacks,
    UidByPackageNameFn, WriteLogFn,
};
pub use exports::*;
pub use strings::{free_host_string, to_host_string};

/// Installs the engine used by `NewService` and `CheckConfig`.
pub fn register_engine_factory(factory: Arc<dyn EngineFactory>) {
    Boundary::global().register_engine_factory(factory);
}
