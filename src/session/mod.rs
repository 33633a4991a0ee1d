//! Multi-turn sessions and the registry of active ones.

mod registry;
mod session;
mod state;

pub use registry::*;
pub use session::*;
pub use state::*;
