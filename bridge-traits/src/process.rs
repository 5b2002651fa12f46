//! Process Attribution Abstractions
//!
//! Lets the engine attribute a connection to the local application that owns
//! its socket. On Android this is `ConnectivityManager#getConnectionOwnerUid`
//! plus `PackageManager`; desktop hosts usually leave these unset.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// IP protocol numbers used in owner lookups.
pub const IPPROTO_TCP: i32 = 6;
pub const IPPROTO_UDP: i32 = 17;

/// A connection whose owning process is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOwnerRequest {
    /// IP protocol number (`IPPROTO_TCP` or `IPPROTO_UDP`)
    pub ip_protocol: i32,
    pub source_address: String,
    pub source_port: i32,
    pub destination_address: String,
    pub destination_port: i32,
}

impl ConnectionOwnerRequest {
    pub fn tcp(
        source_address: impl Into<String>,
        source_port: i32,
        destination_address: impl Into<String>,
        destination_port: i32,
    ) -> Self {
        Self {
            ip_protocol: IPPROTO_TCP,
            source_address: source_address.into(),
            source_port,
            destination_address: destination_address.into(),
            destination_port,
        }
    }

    pub fn udp(
        source_address: impl Into<String>,
        source_port: i32,
        destination_address: impl Into<String>,
        destination_port: i32,
    ) -> Self {
        Self {
            ip_protocol: IPPROTO_UDP,
            ..Self::tcp(source_address, source_port, destination_address, destination_port)
        }
    }
}

/// Resolves the uid owning a socket.
///
/// Calls are synchronous because hosts answer them from a native callback
/// on the calling thread.
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionOwnerLookup: Send + Sync {
    /// Returns the owner uid for the connection.
    fn find_connection_owner(&self, request: &ConnectionOwnerRequest) -> Result<i32>;
}

/// Translates between uids and application package names.
#[cfg_attr(test, mockall::automock)]
pub trait PackageResolver: Send + Sync {
    fn package_name_by_uid(&self, uid: i32) -> Result<String>;

    fn uid_by_package_name(&self, package_name: &str) -> Result<i32>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn test_request_constructors() {
        let tcp = ConnectionOwnerRequest::tcp("10.0.0.2", 40000, "1.1.1.1", 443);
        let udp = ConnectionOwnerRequest::udp("10.0.0.2", 40001, "8.8.8.8", 53);

        assert_eq!(tcp.ip_protocol, IPPROTO_TCP);
        assert_eq!(udp.ip_protocol, IPPROTO_UDP);
        assert_eq!(udp.destination_port, 53);
    }

    #[test]
    fn test_mock_package_resolver() {
        let mut resolver = MockPackageResolver::new();
        resolver
            .expect_package_name_by_uid()
            .returning(|uid| match uid {
                10001 => Ok("com.example.browser".to_string()),
                _ => Err(BridgeError::NotFound(format!("uid {}", uid))),
            });

        assert_eq!(
            resolver.package_name_by_uid(10001).unwrap(),
            "com.example.browser"
        );
        assert!(resolver.package_name_by_uid(1).is_err());
    }
}
