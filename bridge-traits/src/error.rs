//! Errors reported by host capability implementations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host has no implementation for the named capability.
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The host answered, but has nothing for the given key (uid, package,
    /// descriptor, connection).
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn not_available(capability: impl Into<String>) -> Self {
        BridgeError::NotAvailable(capability.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        BridgeError::NotFound(what.into())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
