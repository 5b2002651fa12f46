//! Boundary error mailbox.
//!
//! A single file under the working directory through which a service process
//! leaves its last fatal message for the host UI. Writes overwrite, reads
//! consume.
//!
//! Writers stage the message in a sibling file and rename it into place, and
//! readers rename the mailbox away before reading it, so a reader sees either
//! a complete message or nothing. In-process callers are also serialized on
//! one lock.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use core_runtime::config::SERVICE_ERROR_FILE;
use core_runtime::{Error, Result};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct BoundaryErrorChannel {
    path: Mutex<Option<PathBuf>>,
}

impl BoundaryErrorChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the mailbox at `working_path`.
    pub fn configure(&self, working_path: &Path) {
        *self.path.lock() = Some(working_path.join(SERVICE_ERROR_FILE));
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.path.lock().clone()
    }

    pub fn write(&self, message: &str) -> Result<()> {
        let guard = self.path.lock();
        let path = require_path(&guard)?;
        let staged = path.with_extension("writing");
        fs::write(&staged, message)?;
        fs::rename(&staged, path)?;
        debug!(path = %path.display(), "service error written");
        Ok(())
    }

    /// Returns the stored message and deletes it. `None` when no message is
    /// stored.
    pub fn read(&self) -> Result<Option<String>> {
        let guard = self.path.lock();
        let path = require_path(&guard)?;
        let claimed = path.with_extension("reading");
        match fs::rename(path, &claimed) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        let content = fs::read_to_string(&claimed);
        fs::remove_file(&claimed).ok();
        Ok(Some(content?))
    }

    /// Removes any stored message. No-op before configuration.
    pub fn clear(&self) {
        if let Some(path) = self.path.lock().as_ref() {
            fs::remove_file(path).ok();
        }
    }
}

fn require_path(path: &Option<PathBuf>) -> Result<&PathBuf> {
    path.as_ref()
        .ok_or_else(|| Error::Validation("working path not configured".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_consumes() {
        let dir = tempfile::tempdir().unwrap();
        let channel = BoundaryErrorChannel::new();
        channel.configure(dir.path());

        channel.write("x").unwrap();
        assert_eq!(channel.read().unwrap(), Some("x".to_string()));
        assert_eq!(channel.read().unwrap(), None);
    }

    #[test]
    fn test_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let channel = BoundaryErrorChannel::new();
        channel.configure(dir.path());

        channel.write("first").unwrap();
        channel.write("second").unwrap();
        assert_eq!(channel.read().unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_clear_removes_message() {
        let dir = tempfile::tempdir().unwrap();
        let channel = BoundaryErrorChannel::new();
        channel.configure(dir.path());

        channel.write("stale").unwrap();
        channel.clear();
        channel.clear();
        assert_eq!(channel.read().unwrap(), None);
        assert!(!dir.path().join(SERVICE_ERROR_FILE).exists());
    }

    #[test]
    fn test_unconfigured_channel() {
        let channel = BoundaryErrorChannel::new();
        assert!(matches!(channel.write("x"), Err(Error::Validation(_))));
        assert!(matches!(channel.read(), Err(Error::Validation(_))));
        channel.clear();
    }

    #[test]
    fn test_concurrent_reads_never_see_partial_message() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::thread;

        const MESSAGE: &str = "engine crashed: fatal";

        let dir = tempfile::tempdir().unwrap();
        let channel = Arc::new(BoundaryErrorChannel::new());
        channel.configure(dir.path());
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let channel = Arc::clone(&channel);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for _ in 0..500 {
                    channel.write(MESSAGE).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let mut seen = 0;
        while !done.load(Ordering::SeqCst) {
            if let Some(message) = channel.read().unwrap() {
                assert_eq!(message, MESSAGE);
                seen += 1;
            }
        }
        writer.join().unwrap();
        if let Some(message) = channel.read().unwrap() {
            assert_eq!(message, MESSAGE);
            seen += 1;
        }
        assert!(seen > 0);
    }
}
