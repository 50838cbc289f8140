// Effect plugin contract. A plugin supplies its default options and the hooks it cares about;
// every hook except initialization defaults to a no-op.

use crate::clock::FrameTime;
use crate::config::Options;
use crate::error::HookError;
use crate::scene::{PerspectiveCamera, Scene};
use crate::types::SurfaceSize;

/// Everything a hook may read or mutate for the current instance.
pub struct EffectContext<'a> {
    pub scene: &'a mut Scene,
    pub camera: &'a mut Option<PerspectiveCamera>,
    pub options: &'a Options,
    pub size: SurfaceSize,
    pub time: FrameTime,
}

pub trait Effect {
    /// Name used in log records.
    fn name(&self) -> &'static str;

    /// Plugin defaults, layered over the base defaults and under user overrides.
    fn default_options(&self) -> Options {
        Options::new()
    }

    /// Build scene content. An error aborts construction.
    fn on_init(&mut self, ctx: &mut EffectContext<'_>) -> Result<(), HookError>;

    /// Advance per-frame state; only called while the element is visible or forced.
    fn on_update(&mut self, _ctx: &mut EffectContext<'_>) {}

    /// Runs after each draw call.
    fn on_after_render(&mut self, _ctx: &mut EffectContext<'_>) {}

    fn on_resize(&mut self, _ctx: &mut EffectContext<'_>) {}

    /// Runs after the scene is cleared and before `on_init` runs again.
    fn on_restart(&mut self, _ctx: &mut EffectContext<'_>) {}

    fn on_destroy(&mut self, _ctx: &mut EffectContext<'_>) {}
}
