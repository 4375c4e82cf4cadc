//! Backup manager - orchestrates backup execution
//!
//! A [`BackupEngine`] runs at most one backup at a time. Each run processes
//! its objects one after another on a dedicated worker thread, so the caller
//! never blocks on network I/O. Per-object failures are recorded and the run
//! moves on; only problems at [`BackupEngine::start_backup`] (misuse, or an
//! output location that cannot hold a run directory) are errors.

use crate::managers::fetcher;
use crate::managers::progress::{Progress, ProgressPublisher, RunState};
use crate::utils::cancel::CancelSignal;
use crate::utils::csv_writer;
use crate::utils::source_ops::RecordSource;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Run directories are named after the run's start time
pub const RUN_DIR_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Caller misuse at run start. Nothing is mutated when these are returned.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("No objects selected for backup")]
    NoSelection,

    #[error("A backup run is already in progress")]
    RunInProgress,

    #[error("Failed to create run directory {path:?}: {source}")]
    RunDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start backup worker: {0}")]
    WorkerSpawn(#[from] io::Error),
}

/// Final outcome of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStatus {
    Success,
    Empty,
    Failed,
    Cancelled,
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectStatus::Success => "success",
            ObjectStatus::Empty => "empty",
            ObjectStatus::Failed => "failed",
            ObjectStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectBackupResult {
    pub object: String,
    pub record_count: usize,
    pub status: ObjectStatus,
    pub error: Option<String>,
    /// CSV written for this object, only set on success
    pub file: Option<PathBuf>,
}

impl ObjectBackupResult {
    fn new(object: &str, status: ObjectStatus, record_count: usize) -> Self {
        Self {
            object: object.to_string(),
            record_count,
            status,
            error: None,
            file: None,
        }
    }

    fn success(object: &str, record_count: usize, file: PathBuf) -> Self {
        Self {
            file: Some(file),
            ..Self::new(object, ObjectStatus::Success, record_count)
        }
    }

    fn failed(object: &str, record_count: usize, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(object, ObjectStatus::Failed, record_count)
        }
    }
}

/// Everything a finished run leaves behind
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_dir: PathBuf,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub state: RunState,
    pub results: Vec<ObjectBackupResult>,
}

impl RunReport {
    pub fn count(&self, status: ObjectStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(ObjectStatus::Failed) > 0
    }

    /// Records written across all successful objects
    pub fn records_written(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ObjectStatus::Success)
            .map(|r| r.record_count)
            .sum()
    }

    pub fn result(&self, object: &str) -> Option<&ObjectBackupResult> {
        self.results.iter().find(|r| r.object == object)
    }

    /// Human-readable summary: one headline plus one line per object
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Backup {}: {} succeeded, {} empty, {} failed, {} cancelled ({} records) in {:.1}s",
            self.state,
            self.count(ObjectStatus::Success),
            self.count(ObjectStatus::Empty),
            self.count(ObjectStatus::Failed),
            self.count(ObjectStatus::Cancelled),
            self.records_written(),
            (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0,
        )];

        for r in &self.results {
            let line = match r.status {
                ObjectStatus::Success => format!(
                    "  {}: {} records -> {}",
                    r.object,
                    r.record_count,
                    r.file.as_deref().map(|p| p.display().to_string()).unwrap_or_default()
                ),
                ObjectStatus::Empty => format!("  {}: no records", r.object),
                ObjectStatus::Failed => format!(
                    "  {}: FAILED - {}",
                    r.object,
                    r.error.as_deref().unwrap_or("unknown error")
                ),
                ObjectStatus::Cancelled => format!(
                    "  {}: cancelled ({} records retrieved)",
                    r.object, r.record_count
                ),
            };
            lines.push(line);
        }

        lines
    }
}

/// Holds the engine's single run slot; released on drop, including unwinding.
struct RunSlot {
    active: Arc<AtomicBool>,
}

impl RunSlot {
    fn acquire(active: &Arc<AtomicBool>) -> Option<Self> {
        active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                active: Arc::clone(active),
            })
    }
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        debug!("Released backup run slot");
    }
}

/// One run: an immutable selection written under one timestamped directory
#[derive(Debug, Clone)]
pub struct BackupRun {
    pub selection: Vec<String>,
    pub run_dir: PathBuf,
    pub started_at: DateTime<Local>,
    cancel: CancelSignal,
}

impl BackupRun {
    /// Claims a fresh run directory under `output_root`
    fn create(
        selection: Vec<String>,
        output_root: &Path,
        cancel: CancelSignal,
    ) -> Result<Self, BackupError> {
        let started_at = Local::now();
        let stamp = started_at.format(RUN_DIR_FORMAT).to_string();
        let run_dir = create_run_dir(output_root, &stamp)?;

        Ok(Self {
            selection,
            run_dir,
            started_at,
            cancel,
        })
    }

    /// Process every object in order, appending to `results`. Returns the
    /// terminal state.
    fn execute(
        &self,
        source: &dyn RecordSource,
        publisher: &ProgressPublisher,
        results: &mut Vec<ObjectBackupResult>,
    ) -> RunState {
        let total = self.selection.len();
        info!("Starting backup of {} objects into {:?}", total, self.run_dir);

        for (i, object) in self.selection.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Backup stopped by user");
                break;
            }

            publisher.update(|p| {
                p.current_index = i + 1;
                p.current_object = Some(object.clone());
                p.records_retrieved = 0;
                p.records_expected = 0;
            });
            info!("Backing up {} ({}/{})", object, i + 1, total);

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                self.backup_object(source, object, publisher)
            }))
            .unwrap_or_else(|payload| {
                ObjectBackupResult::failed(object, 0, format!("worker panicked: {}", panic_message(&*payload)))
            });

            match result.status {
                ObjectStatus::Success => info!(
                    "Successfully backed up {} records of {}",
                    result.record_count, object
                ),
                ObjectStatus::Empty => info!("No records found for {}", object),
                ObjectStatus::Failed => error!(
                    "Error backing up {}: {}",
                    object,
                    result.error.as_deref().unwrap_or_default()
                ),
                ObjectStatus::Cancelled => warn!(
                    "Backup of {} cancelled after {} records",
                    object, result.record_count
                ),
            }

            results.push(result);
            let finished = results.len();
            publisher.update(|p| p.finished = finished);
        }

        let interrupted = results.len() < total
            || results.iter().any(|r| r.status == ObjectStatus::Cancelled);

        for object in &self.selection[results.len()..] {
            results.push(ObjectBackupResult::new(object, ObjectStatus::Cancelled, 0));
        }

        if interrupted {
            RunState::Cancelled
        } else {
            RunState::Completed
        }
    }

    fn backup_object(
        &self,
        source: &dyn RecordSource,
        object: &str,
        publisher: &ProgressPublisher,
    ) -> ObjectBackupResult {
        let fetched = fetcher::fetch_all(source, object, &self.cancel, |retrieved, expected| {
            publisher.update(|p| {
                p.records_retrieved = retrieved;
                p.records_expected = expected;
            })
        });

        let outcome = match fetched {
            Ok(outcome) => outcome,
            Err(e) => return ObjectBackupResult::failed(object, 0, e.to_string()),
        };

        if outcome.cancelled {
            return ObjectBackupResult::new(object, ObjectStatus::Cancelled, outcome.records.len());
        }

        if outcome.is_empty() {
            return ObjectBackupResult::new(object, ObjectStatus::Empty, 0);
        }

        let count = outcome.records.len();
        match csv_writer::write_object(object, &outcome.records, &self.run_dir) {
            Ok(path) => ObjectBackupResult::success(object, count, path),
            Err(e) => ObjectBackupResult::failed(object, count, e.to_string()),
        }
    }
}

/// Create `{output_root}/{stamp}`, or `{stamp}_1`, `{stamp}_2`, ... when an
/// earlier run already owns the name. Never reuses an existing directory.
fn create_run_dir(output_root: &Path, stamp: &str) -> Result<PathBuf, BackupError> {
    let dir_error = |path: &Path, source| BackupError::RunDir {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(output_root).map_err(|e| dir_error(output_root, e))?;

    let mut attempt = 0u32;
    loop {
        let name = match attempt {
            0 => stamp.to_string(),
            n => format!("{}_{}", stamp, n),
        };
        let path = output_root.join(name);

        match fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("Run directory {:?} already taken", path);
                attempt += 1;
            }
            Err(e) => return Err(dir_error(&path, e)),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Caller-side handle of a running backup
pub struct RunHandle {
    run: BackupRun,
    worker: JoinHandle<RunReport>,
    publisher: ProgressPublisher,
    last_report: Arc<Mutex<Option<RunReport>>>,
}

impl RunHandle {
    /// Request cooperative cancellation. The object in flight finishes its
    /// current page first.
    pub fn cancel(&self) {
        info!("Stopping backup...");
        self.run.cancel.cancel();
    }

    /// Signal that can be handed to another thread (e.g. a Ctrl-C listener)
    pub fn cancel_signal(&self) -> CancelSignal {
        self.run.cancel.clone()
    }

    pub fn run(&self) -> &BackupRun {
        &self.run
    }

    pub fn run_dir(&self) -> &Path {
        &self.run.run_dir
    }

    /// Latest published status
    pub fn progress(&self) -> Progress {
        self.publisher.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.publisher.subscribe()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Block until the worker is done and return its report. After this
    /// returns the engine accepts a new run.
    pub fn wait(self) -> RunReport {
        match self.worker.join() {
            Ok(report) => report,
            Err(payload) => {
                let message = panic_message(&*payload);
                error!("Backup worker terminated abnormally: {}", message);

                let report = RunReport {
                    run_dir: self.run.run_dir.clone(),
                    started_at: self.run.started_at,
                    finished_at: Local::now(),
                    state: RunState::Failed,
                    results: Vec::new(),
                };
                self.publisher.update(|p| p.state = RunState::Failed);
                *self
                    .last_report
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
                report
            }
        }
    }
}

/// Backup execution engine
pub struct BackupEngine {
    source: Arc<dyn RecordSource>,
    active: Arc<AtomicBool>,
    publisher: ProgressPublisher,
    last_report: Arc<Mutex<Option<RunReport>>>,
}

impl BackupEngine {
    /// Create a new engine over a connected record source
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            active: Arc::new(AtomicBool::new(false)),
            publisher: ProgressPublisher::new(),
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    /// State of the current or most recent run (`Idle` before the first one)
    pub fn state(&self) -> RunState {
        self.publisher.latest().state
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> Progress {
        self.publisher.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.publisher.subscribe()
    }

    /// Report of the most recently finished run
    pub fn last_report(&self) -> Option<RunReport> {
        self.last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start backing up `selection` into a new timestamped directory under
    /// `output_root`. Duplicate names are collapsed, first occurrence wins.
    pub fn start_backup(
        &self,
        selection: &[String],
        output_root: &Path,
    ) -> Result<RunHandle, BackupError> {
        self.start_backup_with_cancel(selection, output_root, CancelSignal::new())
    }

    /// Like [`start_backup`](Self::start_backup), but observes a signal the
    /// caller already holds. A signal cancelled before the call yields a run
    /// in which no object is started.
    pub fn start_backup_with_cancel(
        &self,
        selection: &[String],
        output_root: &Path,
        cancel: CancelSignal,
    ) -> Result<RunHandle, BackupError> {
        let selection = dedupe(selection);
        if selection.is_empty() {
            return Err(BackupError::NoSelection);
        }

        let slot = RunSlot::acquire(&self.active).ok_or(BackupError::RunInProgress)?;

        let run = BackupRun::create(selection, output_root, cancel)?;
        let total = run.selection.len();

        self.publisher.publish(Progress {
            state: RunState::Running,
            total,
            ..Progress::idle()
        });

        let worker_run = run.clone();
        let source = Arc::clone(&self.source);
        let publisher = self.publisher.clone();
        let last_report = Arc::clone(&self.last_report);

        let spawned = thread::Builder::new()
            .name("backup-worker".to_string())
            .spawn(move || {
                let mut results = Vec::with_capacity(total);
                let state = worker_run.execute(source.as_ref(), &publisher, &mut results);

                let report = RunReport {
                    run_dir: worker_run.run_dir.clone(),
                    started_at: worker_run.started_at,
                    finished_at: Local::now(),
                    state,
                    results,
                };

                *last_report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
                let finished = report.results.len();
                // The slot is freed under the channel lock: whoever sees the
                // terminal state can start again, and that run's first
                // snapshot always lands after this one.
                publisher.update(|p| {
                    p.state = state;
                    p.current_object = None;
                    p.finished = finished;
                    drop(slot);
                });

                info!(
                    "Backup {}: {} of {} objects backed up",
                    state,
                    report.count(ObjectStatus::Success),
                    total
                );
                report
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                self.publisher.publish(Progress::idle());
                return Err(BackupError::WorkerSpawn(e));
            }
        };

        Ok(RunHandle {
            run,
            worker,
            publisher: self.publisher.clone(),
            last_report: Arc::clone(&self.last_report),
        })
    }

    /// Start a run and block until it finishes
    pub fn run_to_completion(
        &self,
        selection: &[String],
        output_root: &Path,
    ) -> Result<RunReport, BackupError> {
        Ok(self.start_backup(selection, output_root)?.wait())
    }
}

fn dedupe(selection: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    selection
        .iter()
        .filter(|name| {
            let first = seen.insert(name.as_str());
            if !first {
                debug!("Ignoring duplicate selection entry: {}", name);
            }
            first
        })
        .cloned()
        .collect()
}
