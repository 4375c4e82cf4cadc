//! Cooperative cancellation signal shared between the caller and a backup worker

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set by the caller, polled by the worker at object and page boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
