//! Common types shared between backends

use bitflags::bitflags;

use crate::backend::traits::TextureHandle;

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    #[default]
    Rgba16Float,
    Rgba32Float,
    Rg11b10Float,
    R16Float,
    R32Float,
    Rg32Float,
}

bitflags! {
    /// Texture usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const TEXTURE_BINDING = 1 << 2;
        const STORAGE_BINDING = 1 << 3;
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// Texture descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub sample_count: u32,
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Descriptor for a sampled, copyable 2D color target.
    pub fn color_target(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            width,
            height,
            format,
            sample_count: 1,
            usage: TextureUsage::RENDER_ATTACHMENT
                | TextureUsage::TEXTURE_BINDING
                | TextureUsage::COPY_SRC
                | TextureUsage::COPY_DST,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Adds storage binding so compute passes can write the texture.
    pub fn with_random_write(mut self, random_write: bool) -> Self {
        self.usage.set(TextureUsage::STORAGE_BINDING, random_write);
        self
    }

    /// Same size and format, ignoring the label.
    pub fn is_compatible(&self, other: &TextureDescriptor) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && self.sample_count == other.sample_count
            && self.usage == other.usage
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self::color_target(1, 1, TextureFormat::default())
    }
}

/// A full-screen draw issued by an effect.
///
/// `variant` is the effect's own shader variant bit set, resolved for this
/// frame and passed through to the backend untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullscreenDraw {
    pub label: String,
    pub inputs: Vec<TextureHandle>,
    pub output: TextureHandle,
    pub variant: u32,
}

impl FullscreenDraw {
    pub fn new(label: impl Into<String>, output: TextureHandle) -> Self {
        Self {
            label: label.into(),
            inputs: Vec::new(),
            output,
            variant: 0,
        }
    }

    pub fn with_input(mut self, input: TextureHandle) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_variant(mut self, variant: u32) -> Self {
        self.variant = variant;
        self
    }
}
