// Render surface adapter: owns the drawable surface, its overlay styling on the host element,
// and the scene graph drawn into it.

use crate::engine::{RenderSurface, RenderingEngine, SurfaceOptions};
use crate::error::EffectError;
use crate::host::{CanvasStyle, Host};
use crate::scene::{PerspectiveCamera, Scene};
use crate::types::Color;

/// Per-frame inputs for a draw call.
#[derive(Debug, Clone, Copy)]
pub struct FrameState<'a> {
    pub camera: &'a PerspectiveCamera,
    pub background: Option<Color>,
    pub background_alpha: f64,
}

/// Last size pushed to the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
    pub pixel_ratio: f64,
}

pub struct SurfaceAdapter<C> {
    surface: Option<Box<dyn RenderSurface<C>>>,
    scene: Scene,
    size: Option<CanvasSize>,
}

impl<C> SurfaceAdapter<C> {
    /// Adapter with a scene but nothing to draw into.
    pub fn detached() -> Self {
        SurfaceAdapter {
            surface: None,
            scene: Scene::new(),
            size: None,
        }
    }

    /// Create a surface, style it as a background overlay and attach it to `element`.
    pub fn create<H>(
        host: &mut H,
        element: &H::Element,
        engine: &dyn RenderingEngine<C>,
        pixelated: bool,
    ) -> Result<Self, EffectError>
    where
        H: Host<Canvas = C>,
    {
        let surface = engine
            .create_surface(&SurfaceOptions::default())
            .ok_or(EffectError::MissingRenderingCapability)?;
        host.append_canvas(element, surface.canvas());
        host.style_canvas(surface.canvas(), &CanvasStyle::overlay(pixelated));

        Ok(SurfaceAdapter {
            surface: Some(surface),
            scene: Scene::new(),
            size: None,
        })
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    pub fn canvas(&self) -> Option<&C> {
        self.surface.as_ref().map(|s| s.canvas())
    }

    pub fn canvas_size(&self) -> Option<CanvasSize> {
        self.size
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn resize(&mut self, width: f64, height: f64, pixel_ratio: f64) {
        if let Some(surface) = self.surface.as_mut() {
            surface.set_size(width, height);
            surface.set_pixel_ratio(pixel_ratio);
            self.size = Some(CanvasSize {
                width,
                height,
                pixel_ratio,
            });
        }
    }

    pub fn render(&mut self, frame: FrameState<'_>) -> Result<(), EffectError> {
        let Some(surface) = self.surface.as_mut() else {
            return Ok(());
        };
        surface.render(&self.scene, frame.camera)?;
        if let Some(color) = frame.background {
            surface.set_clear_color(color, frame.background_alpha);
        }
        Ok(())
    }

    /// Remove scene content without releasing it or touching the surface.
    pub fn clear_scene(&mut self) {
        self.scene.clear();
    }

    /// Dispose every resource reachable from the scene.
    pub fn dispose_all(&mut self) {
        let surface = &mut self.surface;
        self.scene.dispose_all(&mut |id| {
            if let Some(surface) = surface.as_mut() {
                surface.release(id);
            }
        });
    }

    /// Take the canvas off the host element and drop the surface.
    pub fn detach<H>(&mut self, host: &mut H, element: &H::Element)
    where
        H: Host<Canvas = C>,
    {
        if let Some(surface) = self.surface.take() {
            host.remove_canvas(element, surface.canvas());
        }
        self.size = None;
    }
}
