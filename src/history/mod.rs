//! Temporal history storage.
//!
//! Effects that blend against earlier frames (exposure adaptation, indirect
//! diffuse accumulation, reprojection feedback) keep their frames in a
//! [`HistoryBufferRing`]. An effect only ever holds a [`HistoryId`]; the ring
//! owns every texture, so a reset can never leave an effect holding a
//! dangling handle.

mod ring;

pub use ring::*;

use glam::UVec2;

use crate::backend::{TextureDescriptor, TextureFormat};

/// Key of one history entry in a [`HistoryBufferRing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HistoryId(u32);

impl HistoryId {
    /// Exposure value pair (current / previous).
    pub const EXPOSURE: Self = Self(0);
    /// Indirect diffuse accumulation.
    pub const INDIRECT_DIFFUSE: Self = Self(1);
    /// Screen-space reflection accumulation.
    pub const SCREEN_SPACE_REFLECTIONS: Self = Self(2);
    /// Volumetric fog reprojection feedback.
    pub const VOLUMETRIC_FOG: Self = Self(3);
    /// First id free for user effects.
    pub const FIRST_USER: Self = Self(64);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

/// Allocation parameters for a descriptor-driven history entry.
///
/// Two requests with equal descriptors are the same allocation; any change
/// (scale, format, fixed size) reallocates the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBufferDesc {
    pub label: String,
    pub format: TextureFormat,
    /// Size relative to the ring's reference size.
    pub scale: f32,
    /// Absolute size that ignores the reference size (e.g. 1x1 exposure).
    pub fixed_size: Option<UVec2>,
    pub random_write: bool,
}

impl HistoryBufferDesc {
    pub fn new(label: impl Into<String>, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            format,
            scale: 1.0,
            fixed_size: None,
            random_write: false,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_fixed_size(mut self, width: u32, height: u32) -> Self {
        self.fixed_size = Some(UVec2::new(width, height));
        self
    }

    pub fn with_random_write(mut self, random_write: bool) -> Self {
        self.random_write = random_write;
        self
    }

    /// Pixel size for a given reference size; never smaller than 1x1.
    pub fn resolve_size(&self, reference: UVec2) -> UVec2 {
        match self.fixed_size {
            Some(size) => size.max(UVec2::ONE),
            None => (reference.as_vec2() * self.scale)
                .ceil()
                .as_uvec2()
                .max(UVec2::ONE),
        }
    }

    /// Texture descriptor for one slot of the ring.
    pub fn texture_descriptor(&self, reference: UVec2, slot: usize) -> TextureDescriptor {
        let size = self.resolve_size(reference);
        TextureDescriptor::color_target(size.x, size.y, self.format)
            .with_random_write(self.random_write)
            .with_label(format!("{}_{}", self.label, slot))
    }
}
