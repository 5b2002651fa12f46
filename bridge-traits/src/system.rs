//! System Integration Abstractions
//!
//! User-visible notifications and the host's trusted certificate store.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A notification the engine asks the host to display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub identifier: String,
    pub type_name: String,
    pub type_id: i32,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    /// URL opened when the user taps the notification
    pub open_url: String,
}

/// Posts notifications through the host's notification center.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSender: Send + Sync {
    fn send_notification(&self, notification: &Notification) -> Result<()>;
}

/// Enumerates certificates trusted by the host OS.
pub trait CertificateStore: Send + Sync {
    /// PEM-encoded certificates.
    fn system_certificates(&self) -> Vec<String>;
}
