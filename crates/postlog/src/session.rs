//! Token and debug-logging state shared by the client and its queues.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// Mutable client state.
///
/// Writes are not ordered against builds already in progress: a call sees
/// whichever token was stored last when its build step runs.
#[derive(Debug, Default)]
pub(crate) struct Session {
    token: RwLock<Option<String>>,
    debug_logging: AtomicBool,
}

impl Session {
    pub(crate) fn new(token: Option<String>, debug_logging: bool) -> Self {
        Self {
            token: RwLock::new(token),
            debug_logging: AtomicBool::new(debug_logging),
        }
    }

    /// Store the token, replacing any previous one.
    pub(crate) fn set_token(&self, token: String) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_debug_logging(&self, enabled: bool) {
        self.debug_logging.store(enabled, Ordering::SeqCst);
    }

    pub(crate) fn debug_logging(&self) -> bool {
        self.debug_logging.load(Ordering::SeqCst)
    }
}
