//! Injection passes: per-point ping-pong scheduling and pipeline composition.

mod composer;
mod scheduler;

pub use composer::*;
pub use scheduler::*;
