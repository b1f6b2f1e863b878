//! Declarative post-processing configuration.

use crate::effect::InjectionPoint;

/// Which effects run at each injection point, in execution order.
///
/// Identifiers are resolved against an
/// [`EffectRegistry`](crate::effect::EffectRegistry) when the pipeline is
/// composed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFxConfig {
    /// Effects before the G-buffer is written
    pub before_gbuffer: Vec<String>,
    /// Effects after the G-buffer, before deferred lighting
    pub before_deferred_lights: Vec<String>,
    /// Effects after the skybox is drawn
    pub after_skybox: Vec<String>,
    /// Effects before the built-in post-processing stack
    pub before_post_processing: Vec<String>,
    /// Effects after the built-in post-processing stack
    pub after_post_processing: Vec<String>,
}

impl PostFxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the effect list of one injection point.
    pub fn with_effects<I, S>(mut self, point: InjectionPoint, effects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.effects_mut(point) = effects.into_iter().map(Into::into).collect();
        self
    }

    /// Append one effect to an injection point.
    pub fn push(&mut self, point: InjectionPoint, effect: impl Into<String>) {
        self.effects_mut(point).push(effect.into());
    }

    pub fn effects_for(&self, point: InjectionPoint) -> &[String] {
        match point {
            InjectionPoint::BeforeGBuffer => &self.before_gbuffer,
            InjectionPoint::BeforeDeferredLights => &self.before_deferred_lights,
            InjectionPoint::AfterSkybox => &self.after_skybox,
            InjectionPoint::BeforePostProcessing => &self.before_post_processing,
            InjectionPoint::AfterPostProcessing => &self.after_post_processing,
        }
    }

    fn effects_mut(&mut self, point: InjectionPoint) -> &mut Vec<String> {
        match point {
            InjectionPoint::BeforeGBuffer => &mut self.before_gbuffer,
            InjectionPoint::BeforeDeferredLights => &mut self.before_deferred_lights,
            InjectionPoint::AfterSkybox => &mut self.after_skybox,
            InjectionPoint::BeforePostProcessing => &mut self.before_post_processing,
            InjectionPoint::AfterPostProcessing => &mut self.after_post_processing,
        }
    }

    pub fn is_empty(&self) -> bool {
        InjectionPoint::ALL
            .iter()
            .all(|point| self.effects_for(*point).is_empty())
    }
}
