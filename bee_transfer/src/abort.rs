//! Broadcast abort token.
//!
//! One flag shared by every scheduler thread, arbiter wait and state machine
//! driver loop. Setting it never interrupts a move in flight; each loop
//! observes it at its next poll.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request every observer to stop at its next check.
    pub fn abort(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            warn!("Abort requested");
        }
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
