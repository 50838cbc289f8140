// Rendering engine contract. The lifecycle receives an engine by injection and only ever
// talks to the surface it creates.

use crate::error::EffectError;
use crate::scene::{PerspectiveCamera, Scene};
use crate::types::{Color, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceOptions {
    pub alpha: bool,
    pub antialias: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        SurfaceOptions {
            alpha: true,
            antialias: true,
        }
    }
}

/// Factory for drawable surfaces. `C` is the host's canvas type.
pub trait RenderingEngine<C> {
    /// `None` when the engine has no drawable-surface capability.
    fn create_surface(&self, options: &SurfaceOptions) -> Option<Box<dyn RenderSurface<C>>>;
}

/// A drawable target bound to one canvas.
pub trait RenderSurface<C> {
    fn canvas(&self) -> &C;
    fn set_size(&mut self, width: f64, height: f64);
    fn set_pixel_ratio(&mut self, ratio: f64);
    fn set_clear_color(&mut self, color: Color, alpha: f64);
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), EffectError>;
    /// Free backend memory held for a disposed resource.
    fn release(&mut self, resource: ResourceId);
}
