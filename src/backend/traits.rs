//! Core backend abstraction traits
//!
//! The post-processing core never talks to a GPU API directly. It allocates
//! textures, copies between them and issues full-screen draws through
//! [`GraphicsBackend`], which the dummy and wgpu backends implement.

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Unknown texture handle: {0:?}")]
    UnknownTexture(TextureHandle),
    #[error("No pipeline registered for draw: {0}")]
    UnknownPipeline(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u64);

impl TextureHandle {
    /// Wrap a raw backend id. Hosts use this to hand in their camera target.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Graphics backend consumed by the scheduler, the history ring and effects.
///
/// Commands are recorded in call order. Backends are free to defer the
/// actual GPU submission.
pub trait GraphicsBackend {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Full-screen copy of `source` into `destination`
    fn copy_texture(
        &mut self,
        source: TextureHandle,
        destination: TextureHandle,
    ) -> BackendResult<()>;

    /// Run a full-screen draw
    fn draw_fullscreen(&mut self, draw: &FullscreenDraw) -> BackendResult<()>;
}
