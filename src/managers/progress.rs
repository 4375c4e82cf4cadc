//! Run status published from the backup worker to the caller
//!
//! Backed by a `tokio::sync::watch` channel: the caller only ever sees the
//! latest snapshot, updates are never queued.

use std::fmt;
use tokio::sync::watch;

/// Lifecycle of a backup run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Cancelled | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Latest status snapshot of a run
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub state: RunState,
    /// 1-based position of the current object (0 before the first one)
    pub current_index: usize,
    pub total: usize,
    pub current_object: Option<String>,
    /// Objects that reached a final outcome
    pub finished: usize,
    /// Records retrieved so far for the current object
    pub records_retrieved: usize,
    /// Records the current object reported in total
    pub records_expected: u64,
}

impl Progress {
    pub fn idle() -> Self {
        Self {
            state: RunState::Idle,
            current_index: 0,
            total: 0,
            current_object: None,
            finished: 0,
            records_retrieved: 0,
            records_expected: 0,
        }
    }

    /// Share of objects finished, 0-100
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.finished as f64 / self.total as f64 * 100.0
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.state, &self.current_object) {
            (RunState::Running, Some(object)) => write!(
                f,
                "Backing up {} ({}/{})",
                object, self.current_index, self.total
            ),
            (state, _) => write!(f, "Backup {} ({}/{} objects)", state, self.finished, self.total),
        }
    }
}

/// Producer side, owned by the engine and handed to each worker
#[derive(Clone)]
pub struct ProgressPublisher {
    tx: std::sync::Arc<watch::Sender<Progress>>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Progress::idle());
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    /// Replace the published snapshot
    pub fn publish(&self, progress: Progress) {
        self.tx.send_replace(progress);
    }

    /// Modify the published snapshot in place
    pub fn update(&self, f: impl FnOnce(&mut Progress)) {
        self.tx.send_modify(f);
    }

    pub fn latest(&self) -> Progress {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.tx.subscribe()
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new()
    }
}
