//! Device and network pause state shared between a service and its engine.
//!
//! The host pauses a service when the device goes to sleep and wakes it when
//! it comes back. Engine components that poll or keep connections alive
//! subscribe and back off while paused.

use std::sync::Arc;

use core_async::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseState {
    pub device_paused: bool,
    pub network_paused: bool,
}

impl PauseState {
    pub fn is_paused(&self) -> bool {
        self.device_paused || self.network_paused
    }
}

#[derive(Clone)]
pub struct PauseManager {
    state: Arc<watch::Sender<PauseState>>,
}

impl PauseManager {
    pub fn new() -> Self {
        let (state, _) = watch::channel(PauseState::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Returns `true` if the state changed.
    pub fn device_pause(&self) -> bool {
        self.update(|state| state.device_paused = true)
    }

    pub fn device_wake(&self) -> bool {
        self.update(|state| state.device_paused = false)
    }

    pub fn network_pause(&self) -> bool {
        self.update(|state| state.network_paused = true)
    }

    pub fn network_wake(&self) -> bool {
        self.update(|state| state.network_paused = false)
    }

    pub fn state(&self) -> PauseState {
        *self.state.borrow()
    }

    pub fn is_device_paused(&self) -> bool {
        self.state().device_paused
    }

    pub fn is_network_paused(&self) -> bool {
        self.state().network_paused
    }

    pub fn is_paused(&self) -> bool {
        self.state().is_paused()
    }

    pub fn subscribe(&self) -> watch::Receiver<PauseState> {
        self.state.subscribe()
    }

    /// Resolves once neither the device nor the network is paused.
    pub async fn wait_active(&self) {
        let mut rx = self.subscribe();
        // The sender is owned by `self`, so the channel stays open.
        let _ = rx.wait_for(|state| !state.is_paused()).await;
    }

    fn update(&self, apply: impl FnOnce(&mut PauseState)) -> bool {
        let changed = self.state.send_if_modified(|state| {
            let before = *state;
            apply(state);
            *state != before
        });
        if changed {
            debug!(state = ?self.state(), "pause state changed");
        }
        changed
    }
}

impl Default for PauseManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PauseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PauseManager").field(&self.state()).finish()
    }
}
