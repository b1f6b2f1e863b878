//! Builds injection passes from a [`PostFxConfig`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::GraphicsBackend;
use crate::camera::{CameraId, PostFxCamera};
use crate::config::PostFxConfig;
use crate::effect::{
    EffectInputs, EffectInstance, EffectRegistry, InjectionPoint, SharedEffect, VolumeStack,
};
use crate::error::{PostFxError, PostFxResult};
use crate::pass::{InjectionPass, PassOutcome};

/// Instantiates configured effects and groups them into passes.
pub struct InjectionPassComposer<'r> {
    registry: &'r EffectRegistry,
}

impl<'r> InjectionPassComposer<'r> {
    pub fn new(registry: &'r EffectRegistry) -> Self {
        Self { registry }
    }

    /// Build one pass per configured injection point.
    ///
    /// Unknown identifiers and identifiers that cannot run at their point
    /// are logged and left out.
    pub fn compose(&self, config: &PostFxConfig) -> PostFxPipeline {
        let mut shared: HashMap<String, SharedEffect> = HashMap::new();
        let mut instances: Vec<SharedEffect> = Vec::new();
        let mut passes = Vec::new();

        for point in InjectionPoint::ALL {
            let mut effects: Vec<SharedEffect> = Vec::new();
            for identifier in config.effects_for(point) {
                match self.instantiate(identifier, point, &mut shared) {
                    Ok(effect) => {
                        if effects.iter().any(|existing| Arc::ptr_eq(existing, &effect)) {
                            log::warn!(
                                "Shared effect '{identifier}' listed twice at {}; ignoring the repeat",
                                point.name()
                            );
                            continue;
                        }
                        if !instances.iter().any(|existing| Arc::ptr_eq(existing, &effect)) {
                            instances.push(effect.clone());
                        }
                        effects.push(effect);
                    }
                    Err(err) => log::warn!("Skipping effect at {}: {err}", point.name()),
                }
            }

            if !effects.is_empty() {
                log::debug!("Composed {} with {} effects", point.name(), effects.len());
                passes.push(InjectionPass::new(point, effects));
            }
        }

        PostFxPipeline { passes, instances }
    }

    fn instantiate(
        &self,
        identifier: &str,
        point: InjectionPoint,
        shared: &mut HashMap<String, SharedEffect>,
    ) -> PostFxResult<SharedEffect> {
        let registration = self
            .registry
            .get(identifier)
            .ok_or_else(|| PostFxError::UnknownEffect(identifier.to_string()))?;
        if !registration.injection_points().contains(point.flag()) {
            return Err(PostFxError::UnsupportedInjectionPoint {
                effect: identifier.to_string(),
                point,
            });
        }

        if registration.share_instance() {
            if let Some(effect) = shared.get(identifier) {
                effect.lock().add_injection_point(point);
                return Ok(effect.clone());
            }
        }

        let mut instance = EffectInstance::new(
            identifier,
            registration.share_instance(),
            registration.instantiate(),
        );
        instance.add_injection_point(point);
        let effect = instance.into_shared();
        if registration.share_instance() {
            shared.insert(identifier.to_string(), effect.clone());
        }
        Ok(effect)
    }
}

/// The composed set of passes, in injection point order.
#[derive(Debug, Default)]
pub struct PostFxPipeline {
    passes: Vec<InjectionPass>,
    instances: Vec<SharedEffect>,
}

impl PostFxPipeline {
    pub fn passes(&self) -> &[InjectionPass] {
        &self.passes
    }

    pub fn pass(&self, point: InjectionPoint) -> Option<&InjectionPass> {
        self.passes.iter().find(|pass| pass.point() == point)
    }

    pub fn pass_mut(&mut self, point: InjectionPoint) -> Option<&mut InjectionPass> {
        self.passes.iter_mut().find(|pass| pass.point() == point)
    }

    /// Every distinct effect instance; shared instances appear once.
    pub fn instances(&self) -> &[SharedEffect] {
        &self.instances
    }

    /// First instance created for `identifier`.
    pub fn find_instance(&self, identifier: &str) -> Option<SharedEffect> {
        self.instances
            .iter()
            .find(|effect| effect.lock().identifier() == identifier)
            .cloned()
    }

    /// Select the effects that run at `point` this frame and return the
    /// upstream inputs they need.
    pub fn prepare(
        &mut self,
        point: InjectionPoint,
        camera: &PostFxCamera,
        volumes: &VolumeStack,
        backend: &mut dyn GraphicsBackend,
    ) -> EffectInputs {
        let frame = camera.frame_context(volumes);
        match self.pass_mut(point) {
            Some(pass) => pass.prepare(&frame, backend),
            None => EffectInputs::empty(),
        }
    }

    /// Inputs needed by every pass this frame.
    pub fn prepare_all(
        &mut self,
        camera: &PostFxCamera,
        volumes: &VolumeStack,
        backend: &mut dyn GraphicsBackend,
    ) -> EffectInputs {
        let frame = camera.frame_context(volumes);
        self.passes
            .iter_mut()
            .fold(EffectInputs::empty(), |inputs, pass| {
                inputs | pass.prepare(&frame, backend)
            })
    }

    /// Run the pass at `point`. Points without a pass do nothing.
    pub fn render(
        &mut self,
        point: InjectionPoint,
        camera: &mut PostFxCamera,
        volumes: &VolumeStack,
        backend: &mut dyn GraphicsBackend,
    ) -> PostFxResult<PassOutcome> {
        let Some(pass) = self.passes.iter_mut().find(|pass| pass.point() == point) else {
            return Ok(PassOutcome::default());
        };
        let (frame, history) = camera.frame_parts(volumes);
        pass.render(&frame, backend, history)
    }

    /// Run every pass in injection point order.
    pub fn render_all(
        &mut self,
        camera: &mut PostFxCamera,
        volumes: &VolumeStack,
        backend: &mut dyn GraphicsBackend,
    ) -> PostFxResult<Vec<(InjectionPoint, PassOutcome)>> {
        let (frame, history) = camera.frame_parts(volumes);
        let mut outcomes = Vec::with_capacity(self.passes.len());
        for pass in &mut self.passes {
            let outcome = pass.render(&frame, backend, history)?;
            outcomes.push((pass.point(), outcome));
        }
        Ok(outcomes)
    }

    /// Release everything kept for a camera that stopped rendering.
    pub fn forget_camera(&mut self, camera: CameraId, backend: &mut dyn GraphicsBackend) {
        for pass in &mut self.passes {
            pass.forget_camera(camera, backend);
        }
        for effect in &self.instances {
            effect.lock().forget_camera(camera);
        }
        log::debug!("Forgot {camera:?}");
    }

    /// Release scratch targets and dispose every effect once.
    pub fn dispose(&mut self, backend: &mut dyn GraphicsBackend) {
        for pass in &mut self.passes {
            pass.release_scratch(backend);
        }
        for effect in &self.instances {
            effect.lock().dispose(backend);
        }
        log::debug!("Disposed post-processing pipeline ({} effects)", self.instances.len());
    }
}
