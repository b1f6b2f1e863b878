//! Ping-pong scheduling of the effects bound to one injection point.
//!
//! Active effects run in configured order, each reading the previous
//! writer's output. Two scratch targets per camera carry intermediate
//! results and the last camera-writing effect lands on the camera's color
//! target.

use std::collections::HashMap;

use crate::backend::{GraphicsBackend, TextureDescriptor, TextureHandle};
use crate::camera::{CameraDescriptor, CameraId};
use crate::effect::{
    EffectInputs, FrameContext, FrameStamp, InjectionPoint, RenderContext, SharedEffect,
};
use crate::error::PostFxResult;
use crate::history::HistoryBufferRing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Camera,
    Scratch(usize),
}

impl Slot {
    /// The scratch target that is not `self`.
    fn other_scratch(self) -> Slot {
        match self {
            Slot::Scratch(0) => Slot::Scratch(1),
            _ => Slot::Scratch(0),
        }
    }
}

/// The two scratch color targets one pass keeps for one camera.
///
/// Allocated on first use, sized like the camera target but single-sampled,
/// and reallocated when the camera's size or format changes.
#[derive(Debug, Default)]
pub struct ScratchTargets {
    label: String,
    desc: Option<TextureDescriptor>,
    handles: [Option<TextureHandle>; 2],
    allocations: usize,
}

impl ScratchTargets {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Currently allocated scratch textures.
    pub fn handles(&self) -> impl Iterator<Item = TextureHandle> + '_ {
        self.handles.iter().flatten().copied()
    }

    /// Number of textures allocated over the pass's lifetime.
    pub fn allocation_count(&self) -> usize {
        self.allocations
    }

    fn resolve(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        camera: &CameraDescriptor,
        slot: Slot,
    ) -> PostFxResult<TextureHandle> {
        let index = match slot {
            Slot::Camera => return Ok(camera.color_target),
            Slot::Scratch(index) => index,
        };

        let desc = camera.scratch_descriptor();
        if self
            .desc
            .as_ref()
            .is_some_and(|current| !current.is_compatible(&desc))
        {
            log::debug!(
                "{}: camera target changed to {}x{}, reallocating scratch",
                self.label,
                desc.width,
                desc.height
            );
            self.release(backend);
        }

        if let Some(handle) = self.handles[index] {
            return Ok(handle);
        }
        let handle = backend.create_texture(
            &desc
                .clone()
                .with_label(format!("{}_scratch_{}", self.label, index)),
        )?;
        log::trace!("{}: allocated scratch {index} -> {handle:?}", self.label);
        self.handles[index] = Some(handle);
        self.desc = Some(desc);
        self.allocations += 1;
        Ok(handle)
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        for handle in self.handles.iter_mut() {
            if let Some(handle) = handle.take() {
                backend.destroy_texture(handle);
            }
        }
        self.desc = None;
    }
}

/// What one pass did this frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Effects whose render succeeded.
    pub effects_rendered: usize,
    /// The camera target received the chain's final write.
    pub camera_written: bool,
    /// Full-screen copies issued by the scheduler itself.
    pub source_copies: usize,
    /// Identifiers of effects whose render failed.
    pub failed: Vec<String>,
}

/// Scheduling unit for one injection point.
pub struct InjectionPass {
    point: InjectionPoint,
    effects: Vec<SharedEffect>,
    active: Vec<usize>,
    required_inputs: EffectInputs,
    prepared_for: Option<FrameStamp>,
    scratch: HashMap<CameraId, ScratchTargets>,
}

impl InjectionPass {
    pub fn new(point: InjectionPoint, effects: Vec<SharedEffect>) -> Self {
        Self {
            point,
            effects,
            active: Vec::new(),
            required_inputs: EffectInputs::empty(),
            prepared_for: None,
            scratch: HashMap::new(),
        }
    }

    pub fn point(&self) -> InjectionPoint {
        self.point
    }

    /// Configured effects, in execution order.
    pub fn effects(&self) -> &[SharedEffect] {
        &self.effects
    }

    /// Effects selected by the last [`prepare`](Self::prepare).
    pub fn active_effects(&self) -> impl Iterator<Item = &SharedEffect> + '_ {
        self.active.iter().map(|&index| &self.effects[index])
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Inputs required by the effects selected by the last prepare.
    pub fn required_inputs(&self) -> EffectInputs {
        self.required_inputs
    }

    /// Scratch targets allocated for `camera`, if it has rendered here.
    pub fn scratch(&self, camera: CameraId) -> Option<&ScratchTargets> {
        self.scratch.get(&camera)
    }

    /// Build this frame's active list and return the inputs it needs.
    pub fn prepare(
        &mut self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> EffectInputs {
        let stamp = frame.stamp();
        if self.prepared_for == Some(stamp) {
            return self.required_inputs;
        }
        self.prepared_for = Some(stamp);
        self.active.clear();
        self.required_inputs = EffectInputs::empty();

        if !frame.camera.post_processing_enabled {
            return self.required_inputs;
        }

        for (index, effect) in self.effects.iter().enumerate() {
            let mut instance = effect.lock();
            if instance.evaluate(frame, backend) {
                self.active.push(index);
                self.required_inputs |= instance.effect().declared_inputs();
            }
        }
        log::trace!(
            "{}: {} of {} effects active",
            self.point.name(),
            self.active.len(),
            self.effects.len()
        );
        self.required_inputs
    }

    /// Run the active effects through the ping-pong chain.
    ///
    /// A failing effect is logged and skipped; errors are returned only for
    /// scratch allocation and the scheduler's own copies.
    pub fn execute(
        &mut self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
        history: &mut HistoryBufferRing,
    ) -> PostFxResult<PassOutcome> {
        self.prepare(frame, backend);

        let mut outcome = PassOutcome::default();
        if self.active.is_empty() {
            return Ok(outcome);
        }

        let camera = frame.camera;
        let point = self.point;
        let scratch = self.scratch.entry(frame.camera_id).or_insert_with(|| {
            ScratchTargets::new(format!("postfx_{}_camera{}", point.name(), frame.camera_id.0))
        });
        let last_writer = self
            .active
            .iter()
            .rposition(|&index| self.effects[index].lock().effect().render_to_camera());

        let mut source = Slot::Camera;
        let mut target = Slot::Scratch(0);

        for (position, &index) in self.active.iter().enumerate() {
            let mut instance = self.effects[index].lock();

            if !instance.effect().render_to_camera() {
                let input = scratch.resolve(backend, camera, source)?;
                let mut ctx = RenderContext::new(*frame, &mut *backend, &mut *history);
                match instance.effect_mut().render(input, None, &mut ctx) {
                    Ok(()) => outcome.effects_rendered += 1,
                    Err(err) => {
                        log::warn!(
                            "{}: effect '{}' failed: {err}",
                            self.point.name(),
                            instance.identifier()
                        );
                        outcome.failed.push(instance.identifier().to_string());
                    }
                }
                continue;
            }

            let is_last = Some(position) == last_writer;
            if is_last {
                if source == Slot::Camera && !instance.effect().dont_care_source_target_copy() {
                    let copy = scratch.resolve(backend, camera, target)?;
                    backend.copy_texture(camera.color_target, copy)?;
                    outcome.source_copies += 1;
                    std::mem::swap(&mut source, &mut target);
                }
                target = Slot::Camera;
            } else if target == Slot::Camera {
                target = source.other_scratch();
            }

            let input = scratch.resolve(backend, camera, source)?;
            let output = scratch.resolve(backend, camera, target)?;
            let mut ctx = RenderContext::new(*frame, &mut *backend, &mut *history);
            match instance.effect_mut().render(input, Some(output), &mut ctx) {
                Ok(()) => {
                    outcome.effects_rendered += 1;
                    if target == Slot::Camera {
                        outcome.camera_written = true;
                    }
                    std::mem::swap(&mut source, &mut target);
                }
                Err(err) => {
                    log::warn!(
                        "{}: effect '{}' failed: {err}",
                        self.point.name(),
                        instance.identifier()
                    );
                    outcome.failed.push(instance.identifier().to_string());
                    if is_last && source != Slot::Camera {
                        backend.copy_texture(input, camera.color_target)?;
                        outcome.source_copies += 1;
                        outcome.camera_written = true;
                    }
                }
            }
        }

        if last_writer.is_none() {
            log::trace!("{}: no camera writer active this frame", self.point.name());
        }
        Ok(outcome)
    }

    /// [`prepare`](Self::prepare) followed by [`execute`](Self::execute).
    pub fn render(
        &mut self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
        history: &mut HistoryBufferRing,
    ) -> PostFxResult<PassOutcome> {
        self.prepare(frame, backend);
        self.execute(frame, backend, history)
    }

    pub fn release_scratch(&mut self, backend: &mut dyn GraphicsBackend) {
        for scratch in self.scratch.values_mut() {
            scratch.release(backend);
        }
        self.scratch.clear();
    }

    /// Release the scratch targets kept for `camera`.
    pub fn forget_camera(&mut self, camera: CameraId, backend: &mut dyn GraphicsBackend) {
        if let Some(mut scratch) = self.scratch.remove(&camera) {
            scratch.release(backend);
        }
    }
}

impl std::fmt::Debug for InjectionPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectionPass")
            .field("point", &self.point)
            .field("effects", &self.effects.len())
            .field("active", &self.active)
            .field("required_inputs", &self.required_inputs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCommand, DummyBackend, FullscreenDraw, TextureFormat};
    use crate::camera::{CameraId, FrameInfo};
    use crate::effect::{Effect, EffectInstance, VolumeStack};
    use std::any::Any;

    struct Blit {
        name: &'static str,
        active: bool,
        to_camera: bool,
        dont_care: bool,
        inputs: EffectInputs,
    }

    impl Blit {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                active: true,
                to_camera: true,
                dont_care: false,
                inputs: EffectInputs::empty(),
            }
        }
    }

    impl Effect for Blit {
        fn name(&self) -> &str {
            self.name
        }

        fn is_active(&self, _frame: &FrameContext<'_>) -> bool {
            self.active
        }

        fn declared_inputs(&self) -> EffectInputs {
            self.inputs
        }

        fn render_to_camera(&self) -> bool {
            self.to_camera
        }

        fn dont_care_source_target_copy(&self) -> bool {
            self.dont_care
        }

        fn render(
            &mut self,
            source: TextureHandle,
            destination: Option<TextureHandle>,
            ctx: &mut RenderContext<'_>,
        ) -> PostFxResult<()> {
            let output = destination.unwrap_or(source);
            ctx.draw(&FullscreenDraw::new(self.name, output).with_input(source))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn pass(effects: Vec<Blit>) -> InjectionPass {
        let effects = effects
            .into_iter()
            .map(|effect| EffectInstance::new(effect.name, false, Box::new(effect)).into_shared())
            .collect();
        InjectionPass::new(InjectionPoint::BeforePostProcessing, effects)
    }

    fn camera(backend: &mut DummyBackend) -> CameraDescriptor {
        let target =
            backend.import_texture(TextureDescriptor::color_target(64, 64, TextureFormat::Rgba16Float));
        CameraDescriptor::new(64, 64, target)
    }

    fn frame<'a>(camera: &'a CameraDescriptor, volumes: &'a VolumeStack, frame_count: u32) -> FrameContext<'a> {
        FrameContext {
            camera_id: CameraId(0),
            camera,
            info: FrameInfo {
                frame_count,
                ..Default::default()
            },
            volumes,
        }
    }

    #[test]
    fn test_empty_pass_allocates_nothing() {
        let mut backend = DummyBackend::new();
        let camera = camera(&mut backend);
        let volumes = VolumeStack::new();
        let mut history = HistoryBufferRing::new();
        let mut pass = pass(vec![Blit {
            active: false,
            ..Blit::new("off")
        }]);

        let outcome = pass.render(&frame(&camera, &volumes, 0), &mut backend, &mut history).unwrap();
        assert_eq!(outcome, PassOutcome::default());
        assert!(backend.commands().is_empty());
        assert!(pass.scratch(CameraId(0)).is_none());
    }

    #[test]
    fn test_single_writer_copies_camera_first() {
        let mut backend = DummyBackend::new();
        let camera = camera(&mut backend);
        let volumes = VolumeStack::new();
        let mut history = HistoryBufferRing::new();
        let mut pass = pass(vec![Blit::new("only")]);

        let outcome = pass.render(&frame(&camera, &volumes, 0), &mut backend, &mut history).unwrap();
        assert!(outcome.camera_written);
        assert_eq!(outcome.source_copies, 1);

        let scratch = pass.scratch(CameraId(0)).unwrap().handles().next().unwrap();
        let commands = backend.commands();
        assert!(commands.contains(&BackendCommand::Copy {
            source: camera.color_target,
            destination: scratch,
        }));
        assert_eq!(
            commands.last(),
            Some(&BackendCommand::Draw(
                FullscreenDraw::new("only", camera.color_target).with_input(scratch)
            ))
        );
    }

    #[test]
    fn test_dont_care_skips_copy() {
        let mut backend = DummyBackend::new();
        let camera = camera(&mut backend);
        let volumes = VolumeStack::new();
        let mut history = HistoryBufferRing::new();
        let mut pass = pass(vec![Blit {
            dont_care: true,
            ..Blit::new("in_place")
        }]);

        let outcome = pass.render(&frame(&camera, &volumes, 0), &mut backend, &mut history).unwrap();
        assert_eq!(outcome.source_copies, 0);
        assert_eq!(pass.scratch(CameraId(0)).unwrap().allocation_count(), 0);
        assert_eq!(
            backend.commands(),
            &[BackendCommand::Draw(
                FullscreenDraw::new("in_place", camera.color_target).with_input(camera.color_target)
            )]
        );
    }

    #[test]
    fn test_inputs_are_aggregated() {
        let mut backend = DummyBackend::new();
        let camera = camera(&mut backend);
        let volumes = VolumeStack::new();
        let mut pass = pass(vec![
            Blit {
                inputs: EffectInputs::DEPTH,
                ..Blit::new("a")
            },
            Blit {
                inputs: EffectInputs::MOTION,
                ..Blit::new("b")
            },
            Blit {
                active: false,
                inputs: EffectInputs::NORMAL,
                ..Blit::new("c")
            },
        ]);

        let inputs = pass.prepare(&frame(&camera, &volumes, 0), &mut backend);
        assert_eq!(inputs, EffectInputs::DEPTH | EffectInputs::MOTION);
        assert_eq!(pass.active_count(), 2);
    }

    #[test]
    fn test_disabled_post_processing_contributes_nothing() {
        let mut backend = DummyBackend::new();
        let camera = camera(&mut backend).with_post_processing(false);
        let volumes = VolumeStack::new();
        let mut history = HistoryBufferRing::new();
        let mut pass = pass(vec![Blit::new("a")]);

        let outcome = pass.render(&frame(&camera, &volumes, 0), &mut backend, &mut history).unwrap();
        assert!(!outcome.camera_written);
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn test_scratch_follows_camera_size() {
        let mut backend = DummyBackend::new();
        let camera = camera(&mut backend);
        let volumes = VolumeStack::new();
        let mut history = HistoryBufferRing::new();
        let mut pass = pass(vec![Blit::new("a"), Blit::new("b"), Blit::new("c")]);

        pass.render(&frame(&camera, &volumes, 0), &mut backend, &mut history).unwrap();
        pass.render(&frame(&camera, &volumes, 1), &mut backend, &mut history).unwrap();
        assert_eq!(pass.scratch(CameraId(0)).unwrap().allocation_count(), 2);

        let mut resized = camera.clone();
        resized.width = 32;
        pass.render(&frame(&resized, &volumes, 2), &mut backend, &mut history).unwrap();
        assert_eq!(pass.scratch(CameraId(0)).unwrap().allocation_count(), 4);
        for handle in pass.scratch(CameraId(0)).unwrap().handles() {
            assert_eq!(backend.descriptor(handle).map(|d| d.width), Some(32));
        }
        assert_eq!(backend.live_texture_count(), 2);

        pass.release_scratch(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_cameras_keep_their_own_scratch() {
        let mut backend = DummyBackend::new();
        let game = camera(&mut backend);
        let target =
            backend.import_texture(TextureDescriptor::color_target(32, 16, TextureFormat::Rgba16Float));
        let preview = CameraDescriptor::new(32, 16, target);
        let volumes = VolumeStack::new();
        let mut game_history = HistoryBufferRing::new();
        let mut preview_history = HistoryBufferRing::new();
        let mut pass = pass(vec![Blit::new("a"), Blit::new("b"), Blit::new("c")]);

        for frame_count in 0..4 {
            pass.render(&frame(&game, &volumes, frame_count), &mut backend, &mut game_history)
                .unwrap();
            let preview_frame = FrameContext {
                camera_id: CameraId(1),
                ..frame(&preview, &volumes, frame_count)
            };
            pass.render(&preview_frame, &mut backend, &mut preview_history).unwrap();
        }

        assert_eq!(pass.scratch(CameraId(0)).unwrap().allocation_count(), 2);
        assert_eq!(pass.scratch(CameraId(1)).unwrap().allocation_count(), 2);
        assert_eq!(backend.live_texture_count(), 4);

        pass.forget_camera(CameraId(1), &mut backend);
        assert!(pass.scratch(CameraId(1)).is_none());
        assert_eq!(backend.live_texture_count(), 2);
    }
}
