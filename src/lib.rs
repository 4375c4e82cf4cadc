//! sf-backup library
//!
//! Exports selected objects of a remote data API to one CSV file per object,
//! one object at a time on a background worker, with cooperative
//! cancellation and per-object fault isolation.

pub mod config;
pub mod managers;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, resolve_selection, Config};
pub use managers::backup::{
    BackupEngine, BackupError, BackupRun, ObjectBackupResult, ObjectStatus, RunHandle, RunReport,
};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::progress::{Progress, RunState};
