use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed configuration or missing required argument. Raised before
    /// any resource is allocated.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Capability unavailable: {capability}")]
    CapabilityUnavailable { capability: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// DNS exchange failed, was cancelled, or returned an undecodable answer.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A tracked OS resource failed to close during teardown.
    #[error("Resource leak guard triggered: {0}")]
    ResourceLeakGuardTriggered(String),

    #[error("Fatal timeout: {0}")]
    FatalTimeout(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn capability(name: impl Into<String>) -> Self {
        Error::CapabilityUnavailable {
            capability: name.into(),
        }
    }

    /// Errors that teardown paths swallow instead of reporting.
    pub fn is_absorbed_on_teardown(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::ResourceLeakGuardTriggered(_)
        )
    }
}

impl From<BridgeError> for Error {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::NotAvailable(capability) => Error::CapabilityUnavailable { capability },
            BridgeError::NotFound(what) => Error::NotFound(what),
            BridgeError::OperationFailed(message) => Error::Engine(message),
            BridgeError::Io(err) => Error::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_conversion() {
        let err: Error = BridgeError::NotAvailable("find_connection_owner".to_string()).into();
        assert!(matches!(
            err,
            Error::CapabilityUnavailable { ref capability } if capability == "find_connection_owner"
        ));

        let err: Error = BridgeError::OperationFailed("boom".to_string()).into();
        assert_eq!(err.to_string(), "Engine error: boom");
    }

    #[test]
    fn test_teardown_absorption() {
        assert!(Error::NotFound("fd 3".to_string()).is_absorbed_on_teardown());
        assert!(Error::ResourceLeakGuardTriggered("fd 3".to_string()).is_absorbed_on_teardown());
        assert!(!Error::Transport("cancelled".to_string()).is_absorbed_on_teardown());
        assert!(!Error::capability("tun_provider").is_absorbed_on_teardown());
    }
}
