//! Backend adapters.
//!
//! Each adapter turns a prompt and [`ExecuteOptions`] into one CLI
//! invocation, and supplies the [`EventRules`](crate::stream::EventRules)
//! that read that CLI's stream.

pub mod claude;
pub mod codex;
mod execute;
pub mod gemini;
mod options;
mod traits;

use std::sync::Arc;

pub use claude::ClaudeAdapter;
pub use codex::CodexAdapter;
pub(crate) use execute::execute_with;
pub use gemini::GeminiAdapter;
pub use options::*;
pub(crate) use traits::check_request;
pub use traits::{Adapter, Capabilities};

use crate::config::{AdapterConfig, Backend};

/// Build the adapter for `backend`.
#[must_use]
pub fn create_adapter(backend: Backend, config: AdapterConfig) -> Arc<dyn Adapter> {
    match backend {
        Backend::Claude => Arc::new(ClaudeAdapter::new(config)),
        Backend::Codex => Arc::new(CodexAdapter::new(config)),
        Backend::Gemini => Arc::new(GeminiAdapter::new(config)),
    }
}
