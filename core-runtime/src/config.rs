//! # Boot Configuration
//!
//! Process-wide options a host passes once through `Setup`, before any
//! service is created.
//!
//! ## Overview
//!
//! [`SetupOptions`] follows the builder pattern used across the workspace:
//! required paths are checked in [`SetupOptionsBuilder::build`], and
//! [`SetupOptions::validate`] can be re-run on values built by hand.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::SetupOptions;
//!
//! let options = SetupOptions::builder()
//!     .base_path("/data/app")
//!     .working_path("/data/app/files")
//!     .temp_path("/data/app/cache")
//!     .fix_thread_affinity(true)
//!     .build()
//!     .expect("valid setup options");
//!
//! assert!(options.fix_thread_affinity);
//! ```
//!
//! ## Thread affinity
//!
//! Some hosts fault when engine startup runs on a small, host-owned thread
//! stack. `fix_thread_affinity` makes every `start` run on a dedicated OS
//! thread with an enlarged stack. It is an explicit option and is never
//! detected automatically.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// File name of the boundary error mailbox inside the working directory.
pub const SERVICE_ERROR_FILE: &str = "service_error";

/// Options recorded by `Setup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOptions {
    /// Read-only application data directory
    pub base_path: PathBuf,

    /// Writable directory for persistent state (boundary error mailbox, caches)
    pub working_path: PathBuf,

    /// Writable directory for scratch files
    pub temp_path: PathBuf,

    /// Host is a restricted OS variant (tvOS and similar) with no
    /// per-app VPN routing
    pub is_restricted_os: bool,

    /// Run engine start on a dedicated thread with an enlarged stack
    pub fix_thread_affinity: bool,
}

impl SetupOptions {
    pub fn builder() -> SetupOptionsBuilder {
        SetupOptionsBuilder::default()
    }

    /// Checks that every path is non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.base_path.as_os_str().is_empty() {
            return Err(Error::Validation("Base path cannot be empty".to_string()));
        }

        if self.working_path.as_os_str().is_empty() {
            return Err(Error::Validation(
                "Working path cannot be empty".to_string(),
            ));
        }

        if self.temp_path.as_os_str().is_empty() {
            return Err(Error::Validation("Temp path cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Creates the working and temp directories, owner-only on unix.
    pub fn prepare_directories(&self) -> Result<()> {
        create_private_dir(&self.working_path)?;
        create_private_dir(&self.temp_path)?;
        Ok(())
    }

    /// Location of the boundary error mailbox.
    pub fn service_error_path(&self) -> PathBuf {
        self.working_path.join(SERVICE_ERROR_FILE)
    }
}

fn create_private_dir(path: &Path) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder.create(path)?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct SetupOptionsBuilder {
    base_path: Option<PathBuf>,
    working_path: Option<PathBuf>,
    temp_path: Option<PathBuf>,
    is_restricted_os: bool,
    fix_thread_affinity: bool,
}

impl SetupOptionsBuilder {
    pub fn base_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.base_path = Some(path.into());
        self
    }

    pub fn working_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.working_path = Some(path.into());
        self
    }

    pub fn temp_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.temp_path = Some(path.into());
        self
    }

    pub fn is_restricted_os(mut self, restricted: bool) -> Self {
        self.is_restricted_os = restricted;
        self
    }

    pub fn fix_thread_affinity(mut self, enabled: bool) -> Self {
        self.fix_thread_affinity = enabled;
        self
    }

    pub fn build(self) -> Result<SetupOptions> {
        let base_path = self.base_path.ok_or_else(|| {
            Error::Validation("Base path is required. Use .base_path() to set it.".to_string())
        })?;

        let working_path = self.working_path.ok_or_else(|| {
            Error::Validation(
                "Working path is required. Use .working_path() to set it.".to_string(),
            )
        })?;

        let temp_path = self.temp_path.ok_or_else(|| {
            Error::Validation("Temp path is required. Use .temp_path() to set it.".to_string())
        })?;

        let options = SetupOptions {
            base_path,
            working_path,
            temp_path,
            is_restricted_os: self.is_restricted_os,
            fix_thread_affinity: self.fix_thread_affinity,
        };

        options.validate()?;

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SetupOptionsBuilder {
        SetupOptions::builder()
            .base_path("/base")
            .working_path("/work")
            .temp_path("/tmp/tunnel")
    }

    #[test]
    fn test_builder_defaults() {
        let options = sample().build().unwrap();
        assert_eq!(options.base_path, PathBuf::from("/base"));
        assert!(!options.is_restricted_os);
        assert!(!options.fix_thread_affinity);
        assert_eq!(
            options.service_error_path(),
            PathBuf::from("/work/service_error")
        );
    }

    #[test]
    fn test_builder_requires_paths() {
        let result = SetupOptions::builder().base_path("/base").build();
        assert!(matches!(result, Err(Error::Validation(ref msg)) if msg.contains("Working path")));
    }

    #[test]
    fn test_validate_rejects_empty_paths() {
        let result = sample().temp_path("").build();
        assert!(matches!(result, Err(Error::Validation(ref msg)) if msg.contains("Temp path")));
    }

    #[test]
    fn test_prepare_directories() {
        let root = tempfile::tempdir().unwrap();
        let options = SetupOptions::builder()
            .base_path(root.path())
            .working_path(root.path().join("work/nested"))
            .temp_path(root.path().join("temp"))
            .build()
            .unwrap();

        options.prepare_directories().unwrap();
        // Second call on existing directories is fine.
        options.prepare_directories().unwrap();

        assert!(options.working_path.is_dir());
        assert!(options.temp_path.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&options.temp_path)
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
