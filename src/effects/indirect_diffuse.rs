//! Screen-space indirect diffuse lighting.

use bitflags::bitflags;
use std::any::Any;
use std::collections::HashMap;

use crate::backend::{FullscreenDraw, TextureFormat, TextureHandle};
use crate::camera::CameraId;
use crate::effect::{Effect, EffectInputs, FrameContext, RenderContext, RenderPaths};
use crate::error::PostFxResult;
use crate::history::{HistoryBufferDesc, HistoryBufferRing, HistoryId};

/// Draw that traces and accumulates indirect diffuse.
pub const INDIRECT_DIFFUSE_DRAW: &str = "indirect_diffuse_trace";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndirectDiffuseSettings {
    pub enabled: bool,
    /// Trace resolution relative to the camera
    pub resolution_scale: f32,
    pub denoise: bool,
}

impl Default for IndirectDiffuseSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            resolution_scale: 0.5,
            denoise: true,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IndirectDiffuseVariant: u32 {
        const DENOISE = 1 << 0;
        /// Blend with the previous frame's result.
        const ACCUMULATE = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CameraAccumulation {
    accumulated_frames: u32,
    last_traced: Option<u32>,
}

/// Traces indirect diffuse into its own history buffer for later lighting.
///
/// Runs outside the ping-pong chain. Registered as a shared instance so the
/// accumulation advances once per camera frame even when it is configured
/// into several injection points.
#[derive(Debug, Default)]
pub struct IndirectDiffuseEffect {
    cameras: HashMap<CameraId, CameraAccumulation>,
    frames_prepared: u64,
    traces: u64,
}

impl IndirectDiffuseEffect {
    pub const HISTORY: HistoryId = HistoryId::INDIRECT_DIFFUSE;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn history_desc(settings: &IndirectDiffuseSettings) -> HistoryBufferDesc {
        HistoryBufferDesc::new("indirect_diffuse", TextureFormat::Rgba16Float)
            .with_scale(settings.resolution_scale)
            .with_random_write(true)
    }

    /// This frame's result, for the lighting pass.
    pub fn output(history: &HistoryBufferRing) -> PostFxResult<TextureHandle> {
        history.current(Self::HISTORY)
    }

    /// Consecutive frames blended into `camera`'s current result.
    pub fn accumulated_frames(&self, camera: CameraId) -> u32 {
        self.cameras
            .get(&camera)
            .map_or(0, |state| state.accumulated_frames)
    }

    pub fn frames_prepared(&self) -> u64 {
        self.frames_prepared
    }

    pub fn traces(&self) -> u64 {
        self.traces
    }
}

impl Effect for IndirectDiffuseEffect {
    fn name(&self) -> &str {
        "indirect_diffuse"
    }

    fn is_active(&self, frame: &FrameContext<'_>) -> bool {
        frame
            .settings::<IndirectDiffuseSettings>()
            .is_some_and(|settings| settings.enabled)
    }

    fn supported_render_paths(&self) -> RenderPaths {
        RenderPaths::DEFERRED
    }

    fn declared_inputs(&self) -> EffectInputs {
        EffectInputs::DEPTH | EffectInputs::NORMAL | EffectInputs::MOTION
    }

    fn render_to_camera(&self) -> bool {
        false
    }

    fn prepare_frame(&mut self, _frame: &FrameContext<'_>) {
        self.frames_prepared += 1;
    }

    fn render(
        &mut self,
        source: TextureHandle,
        _destination: Option<TextureHandle>,
        ctx: &mut RenderContext<'_>,
    ) -> PostFxResult<()> {
        let frame_count = ctx.frame.info.frame_count;
        let state = self.cameras.entry(ctx.frame.camera_id).or_default();
        if state.last_traced == Some(frame_count) {
            return Ok(());
        }

        let settings = ctx
            .frame
            .settings::<IndirectDiffuseSettings>()
            .copied()
            .unwrap_or_default();
        ctx.history
            .allocate_buffer(&mut *ctx.backend, Self::HISTORY, &Self::history_desc(&settings), 2)?;
        let current = ctx.history.current(Self::HISTORY)?;

        let mut variant = IndirectDiffuseVariant::empty();
        variant.set(IndirectDiffuseVariant::DENOISE, settings.denoise);
        variant.set(
            IndirectDiffuseVariant::ACCUMULATE,
            !ctx.frame.history_invalid() && ctx.history.previous_is_valid(Self::HISTORY),
        );

        let mut draw = FullscreenDraw::new(INDIRECT_DIFFUSE_DRAW, current)
            .with_input(source)
            .with_variant(variant.bits());
        if variant.contains(IndirectDiffuseVariant::ACCUMULATE) {
            draw = draw.with_input(ctx.history.previous(Self::HISTORY)?);
        }
        ctx.draw(&draw)?;
        ctx.history.mark_written(Self::HISTORY)?;

        state.last_traced = Some(frame_count);
        state.accumulated_frames = if variant.contains(IndirectDiffuseVariant::ACCUMULATE) {
            state.accumulated_frames.saturating_add(1)
        } else {
            0
        };
        self.traces += 1;
        Ok(())
    }

    fn on_activation_edge(&mut self, frame: &FrameContext<'_>, became_active: bool) {
        if !became_active {
            self.cameras.remove(&frame.camera_id);
        }
    }

    fn forget_camera(&mut self, camera: CameraId) {
        self.cameras.remove(&camera);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
