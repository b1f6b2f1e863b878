use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::GraphicsBackend;
use crate::camera::CameraId;
use crate::effect::{Effect, FrameContext, InjectionPoint, InjectionPoints};

/// An effect instance shared by every pass it is scheduled in.
pub type SharedEffect = Arc<Mutex<EffectInstance>>;

/// Activity of an instance as seen by one camera.
#[derive(Debug, Clone, Copy, Default)]
struct CameraActivity {
    active: bool,
    last_frame: Option<u32>,
}

/// One configured effect plus the scheduler's bookkeeping for it.
///
/// Setup is global to the instance. Activity and activation edges are
/// tracked per camera.
pub struct EffectInstance {
    identifier: String,
    injection_points: InjectionPoints,
    share_instance: bool,
    effect: Box<dyn Effect>,
    cameras: HashMap<CameraId, CameraActivity>,
    initialized: bool,
    disabled: bool,
}

impl EffectInstance {
    pub fn new(identifier: impl Into<String>, share_instance: bool, effect: Box<dyn Effect>) -> Self {
        Self {
            identifier: identifier.into(),
            injection_points: InjectionPoints::empty(),
            share_instance,
            effect,
            cameras: HashMap::new(),
            initialized: false,
            disabled: false,
        }
    }

    pub fn into_shared(self) -> SharedEffect {
        Arc::new(Mutex::new(self))
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Points this instance is configured into.
    pub fn injection_points(&self) -> InjectionPoints {
        self.injection_points
    }

    pub(crate) fn add_injection_point(&mut self, point: InjectionPoint) {
        self.injection_points |= point.flag();
    }

    pub fn share_instance(&self) -> bool {
        self.share_instance
    }

    /// Activity for `camera` as of its last evaluated frame.
    pub fn is_active_for(&self, camera: CameraId) -> bool {
        self.cameras.get(&camera).is_some_and(|state| state.active)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Setup failed; the effect is omitted for the rest of the session.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn effect(&self) -> &dyn Effect {
        self.effect.as_ref()
    }

    pub fn effect_mut(&mut self) -> &mut dyn Effect {
        self.effect.as_mut()
    }

    pub fn downcast_ref<T: Effect + 'static>(&self) -> Option<&T> {
        self.effect.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Effect + 'static>(&mut self) -> Option<&mut T> {
        self.effect.as_any_mut().downcast_mut::<T>()
    }

    /// Scene-view, render-path and activity filters for this frame.
    pub fn is_schedulable(&self, frame: &FrameContext<'_>) -> bool {
        !self.disabled
            && (!frame.camera.is_scene_view || self.effect.visible_in_scene_view())
            && self
                .effect
                .supported_render_paths()
                .contains(frame.camera.render_path.flag())
            && self.effect.is_active(frame)
    }

    /// Decide whether the effect runs this frame.
    ///
    /// The first evaluation per camera frame runs setup if needed, fires
    /// the camera's activation edge and calls `prepare_frame`. Later
    /// evaluations in the same frame, e.g. from a second pass sharing this
    /// instance, only return the cached answer.
    pub fn evaluate(&mut self, frame: &FrameContext<'_>, backend: &mut dyn GraphicsBackend) -> bool {
        let camera = frame.camera_id;
        let frame_count = frame.info.frame_count;
        if let Some(state) = self.cameras.get(&camera) {
            if state.last_frame == Some(frame_count) {
                return state.active;
            }
        }

        let schedulable = self.is_schedulable(frame);
        if schedulable && !self.initialized {
            match self.effect.setup(backend) {
                Ok(()) => {
                    log::debug!("Effect '{}' initialized", self.identifier);
                    self.initialized = true;
                }
                Err(err) => {
                    log::warn!(
                        "Effect '{}' failed to set up and is disabled: {err}",
                        self.identifier
                    );
                    self.disabled = true;
                }
            }
        }

        let now_active = schedulable && self.initialized && !self.disabled;
        let state = self.cameras.entry(camera).or_default();
        let was_active = state.active;
        state.active = now_active;
        state.last_frame = Some(frame_count);
        if now_active != was_active {
            log::debug!(
                "Effect '{}' {} for {camera:?}",
                self.identifier,
                if now_active { "activated" } else { "deactivated" }
            );
            self.effect.on_activation_edge(frame, now_active);
        }

        if now_active {
            self.effect.prepare_frame(frame);
        }
        now_active
    }

    /// Drop the activity state kept for `camera`.
    pub fn forget_camera(&mut self, camera: CameraId) {
        self.cameras.remove(&camera);
        self.effect.forget_camera(camera);
    }

    /// Dispose the effect if it was ever set up.
    pub fn dispose(&mut self, backend: &mut dyn GraphicsBackend) {
        if self.initialized {
            self.effect.dispose(backend);
            self.initialized = false;
        }
        self.cameras.clear();
    }
}

impl std::fmt::Debug for EffectInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectInstance")
            .field("identifier", &self.identifier)
            .field("injection_points", &self.injection_points)
            .field("share_instance", &self.share_instance)
            .field("cameras", &self.cameras.len())
            .field("initialized", &self.initialized)
            .field("disabled", &self.disabled)
            .finish()
    }
}
