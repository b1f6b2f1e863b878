//! wgpu backend implementation
//!
//! Owns the post-processing textures on a host-provided device and records
//! copies and full-screen draws into a single command encoder. Effects'
//! pipelines are registered by draw label and variant; the host calls
//! [`WgpuBackend::submit`] once the frame's passes have been recorded.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::HashMap;
use std::sync::Arc;

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    owned: bool,
}

struct FullscreenPipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
}

/// wgpu backend implementation
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    sampler: wgpu::Sampler,

    textures: HashMap<u64, TextureEntry>,
    pipelines: HashMap<(String, u32), FullscreenPipeline>,
    next_texture_id: u64,

    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("postfx_linear_clamp"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            sampler,
            textures: HashMap::new(),
            pipelines: HashMap::new(),
            next_texture_id: 1,
            encoder: None,
        }
    }

    fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Rg11b10Float => wgpu::TextureFormat::Rg11b10Float,
            TextureFormat::R16Float => wgpu::TextureFormat::R16Float,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
            TextureFormat::Rg32Float => wgpu::TextureFormat::Rg32Float,
        }
    }

    fn convert_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
        let mut result = wgpu::TextureUsages::empty();
        if usage.contains(TextureUsage::COPY_SRC) {
            result |= wgpu::TextureUsages::COPY_SRC;
        }
        if usage.contains(TextureUsage::COPY_DST) {
            result |= wgpu::TextureUsages::COPY_DST;
        }
        if usage.contains(TextureUsage::TEXTURE_BINDING) {
            result |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if usage.contains(TextureUsage::STORAGE_BINDING) {
            result |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
            result |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        result
    }

    /// Register a host-owned texture (e.g. the camera color target).
    ///
    /// Imported textures are never destroyed by the backend.
    pub fn import_texture(&mut self, texture: wgpu::Texture) -> TextureHandle {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                view,
                owned: false,
            },
        );
        TextureHandle(id)
    }

    /// Register the pipeline used for draws with this label and variant.
    ///
    /// The bind group layout must declare one sampled texture per draw input
    /// at bindings `0..n`, followed by a filtering sampler at binding `n`.
    pub fn register_fullscreen_pipeline(
        &mut self,
        label: impl Into<String>,
        variant: u32,
        pipeline: wgpu::RenderPipeline,
        layout: wgpu::BindGroupLayout,
    ) {
        self.pipelines
            .insert((label.into(), variant), FullscreenPipeline { pipeline, layout });
    }

    /// Texture view for a handle, for hosts that sample post-processing output.
    pub fn texture_view(&self, texture: TextureHandle) -> Option<&wgpu::TextureView> {
        self.textures.get(&texture.0).map(|entry| &entry.view)
    }

    /// Submit everything recorded since the last submit.
    pub fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
    }
}

fn lookup(
    textures: &HashMap<u64, TextureEntry>,
    texture: TextureHandle,
) -> BackendResult<&TextureEntry> {
    textures
        .get(&texture.0)
        .ok_or(BackendError::UnknownTexture(texture))
}

impl GraphicsBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?} has zero extent",
                desc.label
            )));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: desc.sample_count.max(1),
            dimension: wgpu::TextureDimension::D2,
            format: Self::convert_texture_format(desc.format),
            usage: Self::convert_texture_usage(desc.usage),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                view,
                owned: true,
            },
        );

        Ok(TextureHandle(id))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        match self.textures.get(&texture.0) {
            Some(entry) if !entry.owned => {
                log::warn!("WgpuBackend: refusing to destroy imported texture {texture:?}");
            }
            Some(_) => {
                if let Some(entry) = self.textures.remove(&texture.0) {
                    entry.texture.destroy();
                }
            }
            None => log::warn!("WgpuBackend: destroying unknown texture {texture:?}"),
        }
    }

    fn copy_texture(
        &mut self,
        source: TextureHandle,
        destination: TextureHandle,
    ) -> BackendResult<()> {
        let src = &lookup(&self.textures, source)?.texture;
        let dst = &lookup(&self.textures, destination)?.texture;
        let extent = wgpu::Extent3d {
            width: src.width().min(dst.width()),
            height: src.height().min(dst.height()),
            depth_or_array_layers: 1,
        };

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("postfx"),
            })
        });
        encoder.copy_texture_to_texture(src.as_image_copy(), dst.as_image_copy(), extent);
        Ok(())
    }

    fn draw_fullscreen(&mut self, draw: &FullscreenDraw) -> BackendResult<()> {
        let pipeline = self
            .pipelines
            .get(&(draw.label.clone(), draw.variant))
            .ok_or_else(|| BackendError::UnknownPipeline(draw.label.clone()))?;

        let mut entries = Vec::with_capacity(draw.inputs.len() + 1);
        for (binding, &input) in draw.inputs.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(&lookup(&self.textures, input)?.view),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: draw.inputs.len() as u32,
            resource: wgpu::BindingResource::Sampler(&self.sampler),
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&draw.label),
            layout: &pipeline.layout,
            entries: &entries,
        });
        let output = &lookup(&self.textures, draw.output)?.view;

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("postfx"),
            })
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&draw.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);

        Ok(())
    }
}

impl Drop for WgpuBackend {
    fn drop(&mut self) {
        for entry in self.textures.values() {
            if entry.owned {
                entry.texture.destroy();
            }
        }
    }
}
