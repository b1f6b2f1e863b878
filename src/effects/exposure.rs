//! Exposure control

use bitflags::bitflags;
use std::any::Any;

use crate::backend::{FullscreenDraw, TextureFormat, TextureHandle};
use crate::camera::FrameInfo;
use crate::effect::{Effect, FrameContext, RenderContext};
use crate::error::{PostFxError, PostFxResult};
use crate::history::{HistoryBufferDesc, HistoryId};

/// Draw that writes this frame's exposure value.
pub const EXPOSURE_EVALUATE_DRAW: &str = "exposure_evaluate";
/// Draw that applies the exposure value to the color chain.
pub const EXPOSURE_APPLY_DRAW: &str = "exposure_apply";

/// How the exposure value is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExposureMode {
    #[default]
    Off,
    Fixed,
    /// Adapted from scene luminance over time.
    Automatic,
}

/// Exposure settings read from the volume stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureSettings {
    pub mode: ExposureMode,
    /// Exposure in EV100 for [`ExposureMode::Fixed`]
    pub fixed_ev100: f32,
    pub compensation: f32,
    /// Adaptation speed for [`ExposureMode::Automatic`]
    pub adaptation_speed: f32,
}

impl Default for ExposureSettings {
    fn default() -> Self {
        Self {
            mode: ExposureMode::Off,
            fixed_ev100: 0.0,
            compensation: 0.0,
            adaptation_speed: 1.0,
        }
    }
}

bitflags! {
    /// Shader variant of the exposure draws.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExposureVariant: u32 {
        const AUTOMATIC = 1 << 0;
        /// Ignore the previous exposure and write a neutral value.
        const NEUTRAL = 1 << 1;
    }
}

impl ExposureVariant {
    /// `history_valid` says whether last frame's exposure value was written.
    pub fn resolve(settings: &ExposureSettings, info: &FrameInfo, history_valid: bool) -> Self {
        let mut variant = ExposureVariant::empty();
        variant.set(
            ExposureVariant::AUTOMATIC,
            settings.mode == ExposureMode::Automatic,
        );
        variant.set(
            ExposureVariant::NEUTRAL,
            info.reset_history || info.did_reset_history_last_frame || !history_valid,
        );
        variant
    }
}

/// Writes a 1x1 exposure value every frame and applies it to the chain.
///
/// The value is double-buffered in the history ring so automatic exposure
/// can adapt from the previous frame.
#[derive(Debug, Default)]
pub struct ExposureEffect {
    frames_rendered: u64,
    neutral_frames: u64,
}

impl ExposureEffect {
    pub const HISTORY: HistoryId = HistoryId::EXPOSURE;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn history_desc() -> HistoryBufferDesc {
        HistoryBufferDesc::new("exposure", TextureFormat::Rg32Float)
            .with_fixed_size(1, 1)
            .with_random_write(true)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Frames rendered with the neutral variant.
    pub fn neutral_frames(&self) -> u64 {
        self.neutral_frames
    }
}

impl Effect for ExposureEffect {
    fn name(&self) -> &str {
        "exposure"
    }

    fn is_active(&self, frame: &FrameContext<'_>) -> bool {
        frame
            .settings::<ExposureSettings>()
            .is_some_and(|settings| settings.mode != ExposureMode::Off)
    }

    fn render(
        &mut self,
        source: TextureHandle,
        destination: Option<TextureHandle>,
        ctx: &mut RenderContext<'_>,
    ) -> PostFxResult<()> {
        let destination = destination.ok_or_else(|| PostFxError::EffectFailed {
            effect: self.name().to_string(),
            reason: "no destination".to_string(),
        })?;
        let settings = ctx
            .frame
            .settings::<ExposureSettings>()
            .copied()
            .unwrap_or_default();

        ctx.history
            .allocate_buffer(&mut *ctx.backend, Self::HISTORY, &Self::history_desc(), 2)?;
        let current = ctx.history.current(Self::HISTORY)?;
        let previous = ctx.history.previous(Self::HISTORY)?;

        let history_valid = ctx.history.previous_is_valid(Self::HISTORY);
        let variant = ExposureVariant::resolve(&settings, &ctx.frame.info, history_valid);
        let mut evaluate =
            FullscreenDraw::new(EXPOSURE_EVALUATE_DRAW, current).with_variant(variant.bits());
        if variant.contains(ExposureVariant::AUTOMATIC) {
            evaluate = evaluate.with_input(source);
            if !variant.contains(ExposureVariant::NEUTRAL) {
                evaluate = evaluate.with_input(previous);
            }
        }
        ctx.draw(&evaluate)?;
        ctx.history.mark_written(Self::HISTORY)?;

        ctx.draw(
            &FullscreenDraw::new(EXPOSURE_APPLY_DRAW, destination)
                .with_input(source)
                .with_input(current)
                .with_variant(variant.bits()),
        )?;

        self.frames_rendered += 1;
        if variant.contains(ExposureVariant::NEUTRAL) {
            self.neutral_frames += 1;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
