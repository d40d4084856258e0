//! The shared alert callback slot.
//!
//! Firing timers speak through a single `Fn(&str)` installed at startup.
//! The slot is shared between the tool registry (which installs it) and the
//! scheduler (which reads it at fire time), so a callback installed after
//! a timer was set is still the one that runs.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// A side-effecting sink for alert text (normally "speak this").
pub type AlertCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A cloneable handle to an optional [`AlertCallback`].
#[derive(Clone, Default)]
pub struct AlertSlot {
    inner: Arc<RwLock<Option<AlertCallback>>>,
}

impl AlertSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a callback, replacing any previous one.
    pub fn set(&self, callback: AlertCallback) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The installed callback, if any. The returned handle is detached from
    /// the slot so the caller can invoke it without holding the lock.
    pub fn get(&self) -> Option<AlertCallback> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_set(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for AlertSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertSlot")
            .field("installed", &self.is_set())
            .finish()
    }
}
