//! Built-in post-processing effects

mod color_tint;
mod exposure;
mod indirect_diffuse;

pub use color_tint::*;
pub use exposure::*;
pub use indirect_diffuse::*;

use crate::effect::{EffectRegistration, EffectRegistry, InjectionPoints};

/// Register the built-in effects under their default identifiers.
pub fn register_builtin_effects(registry: &mut EffectRegistry) {
    registry.register(
        EffectRegistration::new("exposure", || Box::new(ExposureEffect::new()))
            .at(InjectionPoints::BEFORE_POST_PROCESSING | InjectionPoints::AFTER_POST_PROCESSING),
    );
    registry.register(
        EffectRegistration::new("indirect_diffuse", || Box::new(IndirectDiffuseEffect::new()))
            .at(InjectionPoints::BEFORE_DEFERRED_LIGHTS | InjectionPoints::AFTER_SKYBOX)
            .shared(),
    );
    registry.register(
        EffectRegistration::new("color_tint", || Box::new(ColorTintEffect::new())).at(
            InjectionPoints::AFTER_SKYBOX
                | InjectionPoints::BEFORE_POST_PROCESSING
                | InjectionPoints::AFTER_POST_PROCESSING,
        ),
    );
}
