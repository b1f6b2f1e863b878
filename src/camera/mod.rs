//! Camera state owned by the post-processing core.
//!
//! Each camera (game view, scene view, ...) owns a [`PostFxCamera`]: its
//! frame lifecycle and its history ring. Nothing here is shared between
//! cameras.

mod lifecycle;

pub use lifecycle::*;

use glam::UVec2;

use crate::backend::{GraphicsBackend, TextureDescriptor, TextureFormat, TextureHandle};
use crate::effect::{FrameContext, RenderPaths, VolumeStack};
use crate::history::{HistoryBufferRing, SwapOutcome};

/// Identifies a camera across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CameraId(pub u32);

/// Render path the camera is drawn with this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderPath {
    Forward,
    #[default]
    Deferred,
    ForwardPlus,
}

impl RenderPath {
    /// Bit tested against an effect's supported render paths.
    /// Forward+ shades like forward.
    pub fn flag(self) -> RenderPaths {
        match self {
            RenderPath::Forward | RenderPath::ForwardPlus => RenderPaths::FORWARD,
            RenderPath::Deferred => RenderPaths::DEFERRED,
        }
    }
}

/// Per-frame description of the camera being rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub sample_count: u32,
    pub render_path: RenderPath,
    /// Editor / scene-view camera.
    pub is_scene_view: bool,
    pub post_processing_enabled: bool,
    /// The camera's real output buffer.
    pub color_target: TextureHandle,
}

impl CameraDescriptor {
    pub fn new(width: u32, height: u32, color_target: TextureHandle) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgba16Float,
            sample_count: 1,
            render_path: RenderPath::default(),
            is_scene_view: false,
            post_processing_enabled: true,
            color_target,
        }
    }

    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn with_render_path(mut self, render_path: RenderPath) -> Self {
        self.render_path = render_path;
        self
    }

    pub fn with_scene_view(mut self, is_scene_view: bool) -> Self {
        self.is_scene_view = is_scene_view;
        self
    }

    pub fn with_post_processing(mut self, enabled: bool) -> Self {
        self.post_processing_enabled = enabled;
        self
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    /// Descriptor for ping-pong scratch targets: the camera's size and
    /// format, single-sampled.
    pub fn scratch_descriptor(&self) -> TextureDescriptor {
        TextureDescriptor::color_target(self.width, self.height, self.format)
    }
}

/// Post-processing state of one camera.
#[derive(Debug)]
pub struct PostFxCamera {
    id: CameraId,
    descriptor: CameraDescriptor,
    lifecycle: FrameLifecycle,
    history: HistoryBufferRing,
    last_swap: SwapOutcome,
}

impl PostFxCamera {
    pub fn new(id: CameraId, descriptor: CameraDescriptor) -> Self {
        Self {
            id,
            descriptor,
            lifecycle: FrameLifecycle::new(),
            history: HistoryBufferRing::new(),
            last_swap: SwapOutcome::Advanced,
        }
    }

    pub fn id(&self) -> CameraId {
        self.id
    }

    pub fn descriptor(&self) -> &CameraDescriptor {
        &self.descriptor
    }

    pub fn lifecycle(&self) -> &FrameLifecycle {
        &self.lifecycle
    }

    pub fn history(&self) -> &HistoryBufferRing {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryBufferRing {
        &mut self.history
    }

    /// What the history ring did at the start of this frame.
    pub fn last_swap(&self) -> SwapOutcome {
        self.last_swap
    }

    /// Drop all history on the next frame.
    pub fn request_history_reset(&mut self) {
        self.lifecycle.request_history_reset();
    }

    /// Start a new frame: advance the history ring and the frame lifecycle.
    pub fn begin_frame(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        descriptor: CameraDescriptor,
    ) -> FrameInfo {
        let size = descriptor.size();
        self.descriptor = descriptor;

        let mut outcome = self.history.swap(backend, size.x, size.y);
        if self.lifecycle.take_reset_request() {
            log::debug!("Camera {:?}: history reset requested", self.id);
            self.history.release_all(backend);
            outcome = SwapOutcome::Reset;
        }
        self.last_swap = outcome;

        let info = self.lifecycle.advance(size, outcome);
        log::trace!(
            "Camera {:?}: frame {} at {}x{} (reset_history: {})",
            self.id,
            info.frame_count,
            size.x,
            size.y,
            info.reset_history
        );
        info
    }

    /// Read-only context for activity checks and per-frame preparation.
    pub fn frame_context<'a>(&'a self, volumes: &'a VolumeStack) -> FrameContext<'a> {
        FrameContext {
            camera_id: self.id,
            camera: &self.descriptor,
            info: self.lifecycle.info(),
            volumes,
        }
    }

    /// Frame context together with mutable access to the history ring.
    pub fn frame_parts<'a>(
        &'a mut self,
        volumes: &'a VolumeStack,
    ) -> (FrameContext<'a>, &'a mut HistoryBufferRing) {
        let frame = FrameContext {
            camera_id: self.id,
            camera: &self.descriptor,
            info: self.lifecycle.info(),
            volumes,
        };
        (frame, &mut self.history)
    }

    /// Release every history buffer owned by this camera.
    pub fn dispose(&mut self, backend: &mut dyn GraphicsBackend) {
        self.history.dispose(backend);
    }
}
