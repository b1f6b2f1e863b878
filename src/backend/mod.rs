//! Backend abstraction layer
//!
//! Provides the texture, copy and draw interface the post-processing core
//! consumes, plus a recording dummy backend and an optional wgpu backend.

pub mod dummy;
pub mod traits;
pub mod types;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub use dummy::{BackendCommand, DummyBackend};
pub use traits::*;
pub use types::*;
