//! Color tint

use glam::Vec3;
use std::any::Any;

use crate::backend::{FullscreenDraw, TextureHandle};
use crate::effect::{Effect, FrameContext, RenderContext};
use crate::error::{PostFxError, PostFxResult};

pub const COLOR_TINT_DRAW: &str = "color_tint";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTintSettings {
    pub tint: Vec3,
    /// 0 disables the effect
    pub intensity: f32,
}

impl Default for ColorTintSettings {
    fn default() -> Self {
        Self {
            tint: Vec3::ONE,
            intensity: 0.0,
        }
    }
}

/// Single per-pixel draw; safe to run in place on the camera target.
#[derive(Debug, Default)]
pub struct ColorTintEffect {
    frames_rendered: u64,
}

impl ColorTintEffect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}

impl Effect for ColorTintEffect {
    fn name(&self) -> &str {
        "color_tint"
    }

    fn is_active(&self, frame: &FrameContext<'_>) -> bool {
        frame
            .settings::<ColorTintSettings>()
            .is_some_and(|settings| settings.intensity > 0.0 && settings.tint != Vec3::ONE)
    }

    fn dont_care_source_target_copy(&self) -> bool {
        true
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
        ctx.draw(&FullscreenDraw::new(COLOR_TINT_DRAW, destination).with_input(source))?;
        self.frames_rendered += 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
