//! Subprocess spawning with live output streaming and deadline enforcement.

mod runner;

pub use runner::*;
