//! JSONL stream parsing and response aggregation.

mod aggregate;
mod event;
mod parser;
mod response;
mod structured;

pub use aggregate::*;
pub use event::*;
pub use parser::*;
pub use response::*;
pub use structured::*;
