//! # Lilium PostFx
//!
//! Post-processing scheduler and temporal history framework for RedLilium
//! style renderers.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Effect`] - Contract every post-processing effect implements
//! - [`InjectionPass`] - Ping-pong scheduling of the effects at one injection point
//! - [`InjectionPassComposer`] - Builds a [`PostFxPipeline`] from a [`PostFxConfig`]
//! - [`HistoryBufferRing`] - Generation-indexed multi-frame texture storage
//! - [`PostFxCamera`] - Per-camera frame lifecycle and history
//! - [`GraphicsBackend`] - Texture, copy and draw interface, with a recording
//!   [`DummyBackend`] and an optional wgpu backend
//!
//! ## Example
//!
//! ```ignore
//! use lilium_postfx::*;
//!
//! let registry = EffectRegistry::with_builtin_effects();
//! let config = PostFxConfig::new()
//!     .with_effects(InjectionPoint::BeforePostProcessing, ["exposure", "color_tint"]);
//! let mut pipeline = InjectionPassComposer::new(&registry).compose(&config);
//!
//! camera.begin_frame(&mut backend, descriptor);
//! let inputs = pipeline.prepare_all(&camera, &volumes, &mut backend);
//! // Produce depth / normals / motion as requested by `inputs`...
//! pipeline.render(InjectionPoint::BeforePostProcessing, &mut camera, &volumes, &mut backend)?;
//! ```

pub mod backend;
pub mod camera;
pub mod config;
pub mod effect;
pub mod effects;
pub mod error;
pub mod history;
pub mod pass;

// Re-export main types for convenience
pub use backend::{
    BackendError, DummyBackend, FullscreenDraw, GraphicsBackend, TextureDescriptor, TextureFormat,
    TextureHandle,
};
pub use camera::{CameraDescriptor, CameraId, FrameInfo, FrameLifecycle, PostFxCamera, RenderPath};
pub use config::PostFxConfig;
pub use effect::{
    Effect, EffectInputs, EffectInstance, EffectRegistration, EffectRegistry, FrameContext,
    InjectionPoint, InjectionPoints, RenderContext, RenderPaths, SharedEffect, VolumeStack,
};
pub use error::{PostFxError, PostFxResult};
pub use history::{HistoryBufferDesc, HistoryBufferRing, HistoryId, SwapOutcome};
pub use pass::{InjectionPass, InjectionPassComposer, PassOutcome, PostFxPipeline};

#[cfg(feature = "wgpu-backend")]
pub use backend::wgpu_backend::WgpuBackend;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the post-processing subsystem.
pub fn init() {
    log::info!("Lilium PostFx v{} initialized", VERSION);
}
