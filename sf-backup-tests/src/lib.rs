//! Test utilities for sf-backup
//!
//! Shared builders, fixtures and re-exports of the mock record source so
//! engine tests never need a live API.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, MockRecordSource, sample_records};
//!
//! #[test]
//! fn my_test() {
//!     let source = MockRecordSource::new()
//!         .with_object("Contact", &["Id", "Name"], sample_records("Contact", 5), 2);
//!     let config = ConfigBuilder::minimal().build();
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{read_csv, ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use sf_backup::config::{Config, ConnectionConfig, GlobalConfig, SelectionConfig};
pub use sf_backup::utils::rest_api::{FieldDescriptor, PageResult, Record};

// Re-export mock implementations from the main crate
pub use sf_backup::utils::source_ops::mock::{page_token, sample_records, MockRecordSource, SourceCall};
pub use sf_backup::utils::source_ops::{RecordSource, SourceError};

/// Owned name list from string literals
pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
