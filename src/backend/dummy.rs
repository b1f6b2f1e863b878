//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. It hands out fresh
//! texture handles and records every call as a [`BackendCommand`], so tests
//! and benchmarks can inspect exactly what the scheduler issued.

use std::collections::{HashMap, HashSet};

use crate::backend::traits::*;
use crate::backend::types::*;

/// A call recorded by [`DummyBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    CreateTexture {
        handle: TextureHandle,
        desc: TextureDescriptor,
    },
    DestroyTexture(TextureHandle),
    Copy {
        source: TextureHandle,
        destination: TextureHandle,
    },
    Draw(FullscreenDraw),
}

/// Dummy GPU backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    next_handle: u64,
    live: HashMap<TextureHandle, TextureDescriptor>,
    external: HashSet<TextureHandle>,
    commands: Vec<BackendCommand>,
    failing_labels: HashSet<String>,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            ..Default::default()
        }
    }

    /// Register a texture owned by the host, such as a camera color target.
    pub fn import_texture(&mut self, desc: TextureDescriptor) -> TextureHandle {
        let handle = self.next();
        self.external.insert(handle);
        self.live.insert(handle, desc);
        handle
    }

    /// Make every draw with this label fail with [`BackendError::DeviceLost`].
    pub fn fail_draws_labeled(&mut self, label: impl Into<String>) {
        self.failing_labels.insert(label.into());
    }

    /// All recorded commands, in call order.
    pub fn commands(&self) -> &[BackendCommand] {
        &self.commands
    }

    /// Drain the recorded commands.
    pub fn take_commands(&mut self) -> Vec<BackendCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Whether a handle refers to a live texture.
    pub fn is_live(&self, texture: TextureHandle) -> bool {
        self.live.contains_key(&texture)
    }

    /// Descriptor of a live texture.
    pub fn descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.live.get(&texture)
    }

    /// Number of textures created by this backend that are still alive.
    pub fn live_texture_count(&self) -> usize {
        self.live.len() - self.external.len()
    }

    fn next(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.next_handle.max(1));
        self.next_handle = handle.0 + 1;
        handle
    }

    fn check_live(&self, texture: TextureHandle) -> BackendResult<()> {
        if self.live.contains_key(&texture) {
            Ok(())
        } else {
            Err(BackendError::UnknownTexture(texture))
        }
    }
}

impl GraphicsBackend for DummyBackend {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?} has zero extent",
                desc.label
            )));
        }

        let handle = self.next();
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}, {:?}) -> {:?}",
            desc.label,
            desc.width,
            desc.height,
            desc.format,
            handle
        );
        self.live.insert(handle, desc.clone());
        self.commands.push(BackendCommand::CreateTexture {
            handle,
            desc: desc.clone(),
        });
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.external.contains(&texture) {
            log::warn!("DummyBackend: refusing to destroy imported texture {texture:?}");
            return;
        }
        if self.live.remove(&texture).is_none() {
            log::warn!("DummyBackend: destroying unknown texture {texture:?}");
        }
        self.commands.push(BackendCommand::DestroyTexture(texture));
    }

    fn copy_texture(
        &mut self,
        source: TextureHandle,
        destination: TextureHandle,
    ) -> BackendResult<()> {
        self.check_live(source)?;
        self.check_live(destination)?;
        log::trace!("DummyBackend: copy {source:?} -> {destination:?}");
        self.commands.push(BackendCommand::Copy {
            source,
            destination,
        });
        Ok(())
    }

    fn draw_fullscreen(&mut self, draw: &FullscreenDraw) -> BackendResult<()> {
        if self.failing_labels.contains(&draw.label) {
            return Err(BackendError::DeviceLost);
        }
        for &input in &draw.inputs {
            self.check_live(input)?;
        }
        self.check_live(draw.output)?;
        log::trace!(
            "DummyBackend: draw {} ({} inputs) -> {:?}",
            draw.label,
            draw.inputs.len(),
            draw.output
        );
        self.commands.push(BackendCommand::Draw(draw.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_backend() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy");
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_create_and_destroy() {
        let mut backend = DummyBackend::new();
        let desc = TextureDescriptor::color_target(8, 8, TextureFormat::Rgba8Unorm);
        let a = backend.create_texture(&desc).unwrap();
        let b = backend.create_texture(&desc).unwrap();
        assert_ne!(a, b);
        assert_eq!(backend.live_texture_count(), 2);

        backend.destroy_texture(a);
        assert!(!backend.is_live(a));
        assert!(backend.is_live(b));
        assert_eq!(backend.commands().len(), 3);
    }

    #[test]
    fn test_zero_extent_fails() {
        let mut backend = DummyBackend::new();
        let desc = TextureDescriptor::color_target(0, 8, TextureFormat::Rgba8Unorm);
        assert!(backend.create_texture(&desc).is_err());
    }

    #[test]
    fn test_imported_texture_survives_destroy() {
        let mut backend = DummyBackend::new();
        let camera = backend.import_texture(TextureDescriptor::default());
        backend.destroy_texture(camera);
        assert!(backend.is_live(camera));
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_copy_requires_live_textures() {
        let mut backend = DummyBackend::new();
        let a = backend.import_texture(TextureDescriptor::default());
        let missing = TextureHandle::from_raw(999);
        assert_eq!(
            backend.copy_texture(a, missing),
            Err(BackendError::UnknownTexture(missing))
        );
    }

    #[test]
    fn test_failing_draw_label() {
        let mut backend = DummyBackend::new();
        let target = backend.import_texture(TextureDescriptor::default());
        backend.fail_draws_labeled("broken");
        let draw = FullscreenDraw::new("broken", target);
        assert_eq!(backend.draw_fullscreen(&draw), Err(BackendError::DeviceLost));
        assert!(backend.commands().is_empty());
    }
}
