//! Execution logging: each call's input and outcome written as JSON files.

mod error;
mod logger;
mod types;

pub use error::AuditError;
pub use logger::{default_log_dir, ExecutionLog};
pub use types::{ErrorRecord, InputRecord, OutputRecord};
