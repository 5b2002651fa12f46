//! Hard-deadline shutdown.
//!
//! An engine that does not finish closing within the deadline is assumed to
//! be wedged. The default action terminates the process with status 1 so the
//! host can restart cleanly instead of keeping a half-closed tunnel alive.
//! Embedders that must never self-terminate (and tests) install their own
//! action.

use std::sync::Arc;
use std::time::Duration;

use tracing::error;

/// Default engine close deadline.
pub const FATAL_STOP_TIMEOUT: Duration = Duration::from_secs(10);

type FatalAction = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone)]
pub struct FatalStopPolicy {
    deadline: Duration,
    action: FatalAction,
}

impl FatalStopPolicy {
    pub fn new(deadline: Duration, action: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            deadline,
            action: Arc::new(action),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_action(mut self, action: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.action = Arc::new(action);
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Runs the terminate action. With the default action this does not
    /// return.
    pub fn trigger(&self, reason: &str) {
        error!(deadline_ms = self.deadline.as_millis() as u64, reason, "fatal stop");
        (self.action)(reason);
    }
}

impl Default for FatalStopPolicy {
    fn default() -> Self {
        Self::new(FATAL_STOP_TIMEOUT, |_| std::process::exit(1))
    }
}

impl std::fmt::Debug for FatalStopPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FatalStopPolicy")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_default_deadline() {
        assert_eq!(FatalStopPolicy::default().deadline(), Duration::from_secs(10));
    }

    #[test]
    fn test_injected_action_receives_reason() {
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reasons);
        let policy = FatalStopPolicy::default()
            .with_deadline(Duration::from_millis(5))
            .with_action(move |reason| sink.lock().push(reason.to_string()));

        policy.trigger("engine close timed out");

        assert_eq!(policy.deadline(), Duration::from_millis(5));
        assert_eq!(*reasons.lock(), vec!["engine close timed out".to_string()]);
    }
}
