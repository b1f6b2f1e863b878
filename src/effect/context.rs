use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::backend::{FullscreenDraw, GraphicsBackend, TextureHandle};
use crate::camera::{CameraDescriptor, CameraId, FrameInfo};
use crate::error::PostFxResult;
use crate::history::HistoryBufferRing;

/// Settings snapshot effects read their parameters from.
///
/// Holds at most one value per type.
#[derive(Default)]
pub struct VolumeStack {
    components: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl VolumeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Any + Send + Sync>(mut self, component: T) -> Self {
        self.insert(component);
        self
    }

    /// Insert or replace the component of type `T`.
    pub fn insert<T: Any + Send + Sync>(&mut self, component: T) {
        self.components.insert(TypeId::of::<T>(), Box::new(component));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.components
            .get(&TypeId::of::<T>())
            .and_then(|component| component.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.components
            .get_mut(&TypeId::of::<T>())
            .and_then(|component| component.downcast_mut::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.components
            .remove(&TypeId::of::<T>())
            .and_then(|component| component.downcast::<T>().ok())
            .map(|component| *component)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl std::fmt::Debug for VolumeStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeStack")
            .field("components", &self.components.len())
            .finish()
    }
}

/// Identifies one frame of one camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameStamp {
    pub camera: CameraId,
    pub frame: u32,
}

/// Everything an effect may inspect about the frame being rendered.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub camera_id: CameraId,
    pub camera: &'a CameraDescriptor,
    pub info: FrameInfo,
    pub volumes: &'a VolumeStack,
}

impl<'a> FrameContext<'a> {
    pub fn stamp(&self) -> FrameStamp {
        FrameStamp {
            camera: self.camera_id,
            frame: self.info.frame_count,
        }
    }

    /// Typed settings from the volume stack.
    pub fn settings<T: Any + Send + Sync>(&self) -> Option<&'a T> {
        self.volumes.get::<T>()
    }

    /// History must not be read this frame.
    pub fn history_invalid(&self) -> bool {
        self.info.reset_history
    }
}

/// Context passed to [`Effect::render`](crate::effect::Effect::render).
pub struct RenderContext<'a> {
    pub frame: FrameContext<'a>,
    pub backend: &'a mut dyn GraphicsBackend,
    pub history: &'a mut HistoryBufferRing,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        frame: FrameContext<'a>,
        backend: &'a mut dyn GraphicsBackend,
        history: &'a mut HistoryBufferRing,
    ) -> Self {
        Self {
            frame,
            backend,
            history,
        }
    }

    /// Full-screen copy.
    pub fn blit(&mut self, source: TextureHandle, destination: TextureHandle) -> PostFxResult<()> {
        Ok(self.backend.copy_texture(source, destination)?)
    }

    pub fn draw(&mut self, draw: &FullscreenDraw) -> PostFxResult<()> {
        Ok(self.backend.draw_fullscreen(draw)?)
    }
}
