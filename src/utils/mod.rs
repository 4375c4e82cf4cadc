pub mod cancel;
pub mod csv_writer;
pub mod rest_api;

// Trait-based abstraction for testability
pub mod source_ops;

// Re-export commonly used types and traits (used by test crate)
pub use cancel::CancelSignal;
pub use rest_api::{FieldDescriptor, PageResult, Record};
pub use source_ops::{RecordSource, RestRecordSource, SourceError};
