// waves_core: animated wave-mesh background for Rust/WASM pages.
// The lifecycle and the wave plugin are host-agnostic; `web` and `three` bind them to the
// browser DOM and a three.js build.

mod clock;
mod config;
mod effect;
mod engine;
mod error;
mod host;
mod lifecycle;
mod scene;
mod sizing;
mod surface;
mod three;
mod types;
mod visibility;
mod waves;
mod web;

#[cfg(test)]
mod testing;

use wasm_bindgen::prelude::*;

pub use clock::{FrameClock, FrameTime};
pub use config::{base_defaults, resolve, Options};
pub use effect::{Effect, EffectContext};
pub use engine::{RenderSurface, RenderingEngine, SurfaceOptions};
pub use error::{EffectError, HookError};
pub use host::{CanvasStyle, FrameTask, Host, Target};
pub use lifecycle::{EffectLifecycle, LifecycleState};
pub use scene::{
    Disposable, Geometry, Mesh, Node, NodeKind, PerspectiveCamera, PhongMaterial, Scene, Side,
    Texture,
};
pub use sizing::{is_mobile, SizingPolicy};
pub use surface::{CanvasSize, FrameState, SurfaceAdapter};
pub use three::ThreeEngine;
pub use types::*;
pub use visibility::VisibilityProbe;
pub use waves::{wave_displacement, WaveEffect, WaveError};
pub use web::{start, WavesEffect, WebHost};

/// Install the panic hook and route `log` records to the browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}
