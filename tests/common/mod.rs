//! Common utilities for post-processing integration tests.
//!
//! Provides a scriptable test effect that records every render call, and a
//! test context bundling a dummy backend with one camera.

#![allow(dead_code)]

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use lilium_postfx::{
    CameraDescriptor, CameraId, DummyBackend, Effect, EffectInputs, EffectInstance, FrameContext,
    FrameInfo, FullscreenDraw, GraphicsBackend, InjectionPass, InjectionPoint, PassOutcome,
    PostFxCamera, PostFxError, PostFxResult, RenderContext, RenderPaths, TextureDescriptor,
    TextureFormat, TextureHandle, VolumeStack,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Test Effect
// ============================================================================

/// One `Effect::render` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCall {
    pub effect: String,
    pub source: TextureHandle,
    pub destination: Option<TextureHandle>,
}

pub type Trace = Arc<Mutex<Vec<RenderCall>>>;

pub fn new_trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

#[derive(Debug, Default)]
pub struct Counters {
    pub setups: AtomicUsize,
    pub prepares: AtomicUsize,
    pub renders: AtomicUsize,
    pub activations: AtomicUsize,
    pub deactivations: AtomicUsize,
    pub disposals: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Effect whose routing flags and activity are set by the test.
#[derive(Clone)]
pub struct TestEffect {
    pub name: String,
    pub active: Arc<AtomicBool>,
    pub to_camera: bool,
    pub dont_care: bool,
    pub visible_in_scene_view: bool,
    pub fail: bool,
    pub paths: RenderPaths,
    pub inputs: EffectInputs,
    pub trace: Trace,
    pub counters: Arc<Counters>,
}

impl TestEffect {
    /// Active effect that writes to the ping-pong chain.
    pub fn writer(name: &str, trace: &Trace) -> Self {
        Self {
            name: name.to_string(),
            active: Arc::new(AtomicBool::new(true)),
            to_camera: true,
            dont_care: false,
            visible_in_scene_view: true,
            fail: false,
            paths: RenderPaths::all(),
            inputs: EffectInputs::empty(),
            trace: trace.clone(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Active effect that writes only its own resources.
    pub fn side_output(name: &str, trace: &Trace) -> Self {
        Self {
            to_camera: false,
            ..Self::writer(name, trace)
        }
    }

    pub fn inactive(self) -> Self {
        self.active.store(false, Ordering::SeqCst);
        self
    }

    pub fn dont_care(mut self) -> Self {
        self.dont_care = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn hidden_in_scene_view(mut self) -> Self {
        self.visible_in_scene_view = false;
        self
    }

    pub fn with_paths(mut self, paths: RenderPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_inputs(mut self, inputs: EffectInputs) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl Effect for TestEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self, _frame: &FrameContext<'_>) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn supported_render_paths(&self) -> RenderPaths {
        self.paths
    }

    fn visible_in_scene_view(&self) -> bool {
        self.visible_in_scene_view
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

    fn setup(&mut self, _backend: &mut dyn GraphicsBackend) -> PostFxResult<()> {
        self.counters.setups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn prepare_frame(&mut self, _frame: &FrameContext<'_>) {
        self.counters.prepares.fetch_add(1, Ordering::SeqCst);
    }

    fn render(
        &mut self,
        source: TextureHandle,
        destination: Option<TextureHandle>,
        ctx: &mut RenderContext<'_>,
    ) -> PostFxResult<()> {
        self.trace.lock().push(RenderCall {
            effect: self.name.clone(),
            source,
            destination,
        });
        if self.fail {
            return Err(PostFxError::EffectFailed {
                effect: self.name.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        self.counters.renders.fetch_add(1, Ordering::SeqCst);
        if let Some(destination) = destination {
            ctx.draw(&FullscreenDraw::new(self.name.clone(), destination).with_input(source))?;
        }
        Ok(())
    }

    fn on_activation_edge(&mut self, _frame: &FrameContext<'_>, became_active: bool) {
        if became_active {
            self.counters.activations.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counters.deactivations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn dispose(&mut self, _backend: &mut dyn GraphicsBackend) {
        self.counters.disposals.fetch_add(1, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Pass at `BeforePostProcessing` holding one instance per test effect.
pub fn build_pass(effects: &[TestEffect]) -> InjectionPass {
    let instances = effects
        .iter()
        .map(|effect| {
            EffectInstance::new(effect.name.clone(), false, Box::new(effect.clone())).into_shared()
        })
        .collect();
    InjectionPass::new(InjectionPoint::BeforePostProcessing, instances)
}

// ============================================================================
// Test Context
// ============================================================================

/// Dummy backend plus one camera rendering into an imported color target.
pub struct TestContext {
    pub backend: DummyBackend,
    pub descriptor: CameraDescriptor,
    pub camera: PostFxCamera,
    pub volumes: VolumeStack,
}

impl TestContext {
    pub fn new(width: u32, height: u32) -> Self {
        init_logging();
        let mut backend = DummyBackend::new();
        let descriptor = Self::import_camera_target(&mut backend, width, height);
        let camera = PostFxCamera::new(CameraId(0), descriptor.clone());
        Self {
            backend,
            descriptor,
            camera,
            volumes: VolumeStack::new(),
        }
    }

    fn import_camera_target(backend: &mut DummyBackend, width: u32, height: u32) -> CameraDescriptor {
        let target = backend.import_texture(
            TextureDescriptor::color_target(width, height, TextureFormat::Rgba16Float)
                .with_label("camera"),
        );
        CameraDescriptor::new(width, height, target)
    }

    pub fn camera_target(&self) -> TextureHandle {
        self.descriptor.color_target
    }

    pub fn begin_frame(&mut self) -> FrameInfo {
        self.camera
            .begin_frame(&mut self.backend, self.descriptor.clone())
    }

    /// Switch to a new camera target of a different size.
    pub fn resize(&mut self, width: u32, height: u32) {
        let mut descriptor = Self::import_camera_target(&mut self.backend, width, height);
        descriptor.render_path = self.descriptor.render_path;
        descriptor.is_scene_view = self.descriptor.is_scene_view;
        self.descriptor = descriptor;
    }

    /// Another camera rendering through this context's backend.
    pub fn extra_camera(&mut self, id: CameraId, width: u32, height: u32) -> ExtraCamera {
        let descriptor = Self::import_camera_target(&mut self.backend, width, height);
        let camera = PostFxCamera::new(id, descriptor.clone());
        ExtraCamera { descriptor, camera }
    }

    /// Scratch textures `pass` allocated for this context's camera.
    pub fn scratch_allocations(&self, pass: &InjectionPass) -> usize {
        pass.scratch(self.camera.id())
            .map_or(0, |scratch| scratch.allocation_count())
    }

    pub fn scratch_handles(&self, pass: &InjectionPass) -> Vec<TextureHandle> {
        pass.scratch(self.camera.id())
            .map(|scratch| scratch.handles().collect())
            .unwrap_or_default()
    }

    /// Begin a frame and run one pass.
    pub fn run_pass(&mut self, pass: &mut InjectionPass) -> PassOutcome {
        self.begin_frame();
        let (frame, history) = self.camera.frame_parts(&self.volumes);
        pass.render(&frame, &mut self.backend, history)
            .expect("pass failed")
    }
}

/// Camera sharing a [`TestContext`]'s backend and volumes.
pub struct ExtraCamera {
    pub descriptor: CameraDescriptor,
    pub camera: PostFxCamera,
}

impl ExtraCamera {
    pub fn begin_frame(&mut self, backend: &mut DummyBackend) -> FrameInfo {
        self.camera.begin_frame(backend, self.descriptor.clone())
    }
}
