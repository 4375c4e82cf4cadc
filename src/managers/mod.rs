pub mod backup;
pub mod fetcher;
pub mod logging;
pub mod progress;
