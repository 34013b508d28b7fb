//! Responsiveness tracking
//!
//! The module becomes responsive when the first job is fetched. Callbacks
//! waiting for that moment fire exactly once, in registration order. The
//! state never reverts. A panicking callback is logged and does not keep
//! the remaining callbacks from firing.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use tracing::error;

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct State {
    responsive: bool,
    pending: Vec<Callback>,
}

/// One-way responsiveness flag with queued callbacks
#[derive(Default)]
pub struct Responsiveness {
    state: Mutex<State>,
}

impl Responsiveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_responsive(&self) -> bool {
        self.lock().responsive
    }

    /// Runs `callback` once the module is responsive
    ///
    /// If it already is, the callback runs synchronously before this returns.
    pub fn on_responsive(&self, callback: impl FnOnce() + Send + 'static) {
        {
            let mut state = self.lock();
            if !state.responsive {
                state.pending.push(Box::new(callback));
                return;
            }
        }
        fire(Box::new(callback));
    }

    /// Marks the module responsive and drains pending callbacks
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn mark_responsive(&self) -> bool {
        let pending = {
            let mut state = self.lock();
            if state.responsive {
                return false;
            }
            state.responsive = true;
            std::mem::take(&mut state.pending)
        };

        // Callbacks run outside the lock so they may register further callbacks.
        for callback in pending {
            fire(callback);
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn fire(callback: Callback) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!("Responsiveness callback panicked: {}", message);
    }
}
