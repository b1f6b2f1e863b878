//! Effect contract and scheduling metadata.

mod context;
mod instance;
mod registry;

pub use context::*;
pub use instance::*;
pub use registry::*;

use bitflags::bitflags;
use std::any::Any;

use crate::backend::{GraphicsBackend, TextureHandle};
use crate::camera::CameraId;
use crate::error::PostFxResult;

/// Fixed positions in the frame where post-processing passes run.
///
/// Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InjectionPoint {
    BeforeGBuffer,
    BeforeDeferredLights,
    AfterSkybox,
    BeforePostProcessing,
    AfterPostProcessing,
}

impl InjectionPoint {
    /// Every injection point, in execution order.
    pub const ALL: [InjectionPoint; 5] = [
        InjectionPoint::BeforeGBuffer,
        InjectionPoint::BeforeDeferredLights,
        InjectionPoint::AfterSkybox,
        InjectionPoint::BeforePostProcessing,
        InjectionPoint::AfterPostProcessing,
    ];

    pub fn flag(self) -> InjectionPoints {
        match self {
            InjectionPoint::BeforeGBuffer => InjectionPoints::BEFORE_GBUFFER,
            InjectionPoint::BeforeDeferredLights => InjectionPoints::BEFORE_DEFERRED_LIGHTS,
            InjectionPoint::AfterSkybox => InjectionPoints::AFTER_SKYBOX,
            InjectionPoint::BeforePostProcessing => InjectionPoints::BEFORE_POST_PROCESSING,
            InjectionPoint::AfterPostProcessing => InjectionPoints::AFTER_POST_PROCESSING,
        }
    }

    /// Position in the frame; lower runs first.
    pub fn priority(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            InjectionPoint::BeforeGBuffer => "before_gbuffer",
            InjectionPoint::BeforeDeferredLights => "before_deferred_lights",
            InjectionPoint::AfterSkybox => "after_skybox",
            InjectionPoint::BeforePostProcessing => "before_post_processing",
            InjectionPoint::AfterPostProcessing => "after_post_processing",
        }
    }
}

bitflags! {
    /// Set of injection points an effect can be configured into.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InjectionPoints: u32 {
        const BEFORE_DEFERRED_LIGHTS = 1 << 0;
        const AFTER_SKYBOX = 1 << 1;
        const BEFORE_POST_PROCESSING = 1 << 2;
        const AFTER_POST_PROCESSING = 1 << 3;
        const BEFORE_GBUFFER = 1 << 4;
    }
}

impl InjectionPoints {
    /// Contained points, in execution order.
    pub fn points(self) -> impl Iterator<Item = InjectionPoint> {
        InjectionPoint::ALL
            .into_iter()
            .filter(move |point| self.contains(point.flag()))
    }
}

bitflags! {
    /// Render paths an effect supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderPaths: u32 {
        const FORWARD = 1 << 0;
        const DEFERRED = 1 << 1;
    }
}

bitflags! {
    /// Upstream buffers an effect reads.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EffectInputs: u32 {
        const DEPTH = 1 << 0;
        const NORMAL = 1 << 1;
        const MOTION = 1 << 2;
    }
}

/// A post-processing effect that can be scheduled at an injection point.
///
/// The scheduler owns all routing: an effect reads `source` and writes
/// `destination`, or its own resources when [`render_to_camera`] is false.
///
/// [`render_to_camera`]: Effect::render_to_camera
pub trait Effect: Send {
    /// Effect name for debugging
    fn name(&self) -> &str;

    /// Whether the effect wants to run this frame.
    ///
    /// Must not have side effects; it may be called more than once per frame.
    fn is_active(&self, frame: &FrameContext<'_>) -> bool;

    fn supported_render_paths(&self) -> RenderPaths {
        RenderPaths::all()
    }

    /// Scene-view cameras skip the effect when false.
    fn visible_in_scene_view(&self) -> bool {
        true
    }

    fn declared_inputs(&self) -> EffectInputs {
        EffectInputs::empty()
    }

    /// Takes part in the ping-pong chain. When false the effect writes only
    /// its own resources and receives no destination.
    fn render_to_camera(&self) -> bool {
        true
    }

    /// The effect handles `source == destination` itself, so the scheduler
    /// may skip the safety copy before the final camera write.
    fn dont_care_source_target_copy(&self) -> bool {
        false
    }

    /// One-time setup, run the first frame the effect is scheduled.
    fn setup(&mut self, _backend: &mut dyn GraphicsBackend) -> PostFxResult<()> {
        Ok(())
    }

    /// Called once per camera frame while the effect is active, before any
    /// of its renders that frame.
    fn prepare_frame(&mut self, _frame: &FrameContext<'_>) {}

    /// Record the effect's work.
    fn render(
        &mut self,
        source: TextureHandle,
        destination: Option<TextureHandle>,
        ctx: &mut RenderContext<'_>,
    ) -> PostFxResult<()>;

    /// Called when the effect's activity for `frame.camera_id` flips
    /// between that camera's frames.
    fn on_activation_edge(&mut self, _frame: &FrameContext<'_>, _became_active: bool) {}

    /// Drop any state kept for a camera that no longer renders.
    fn forget_camera(&mut self, _camera: CameraId) {}

    /// Release resources created in [`setup`](Effect::setup).
    fn dispose(&mut self, _backend: &mut dyn GraphicsBackend) {}

    /// Allow downcasting
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
