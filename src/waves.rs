// Wave mesh effect: a fixed-topology grid whose heights follow a folded, squared sine.
// Each quad is split along a random diagonal so the surface never looks like a lattice.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::Options;
use crate::effect::{Effect, EffectContext};
use crate::error::HookError;
use crate::scene::{Geometry, Mesh, NodeKind, PerspectiveCamera, PhongMaterial, Side};
use crate::types::{Color, NodeId, Vec3};

pub const COLOR: &str = "color";
pub const SHININESS: &str = "shininess";
pub const WAVE_HEIGHT: &str = "waveHeight";
pub const WAVE_SPEED: &str = "waveSpeed";
pub const GRID_WIDTH: &str = "gridWidth";
pub const GRID_HEIGHT: &str = "gridHeight";
pub const WAVE_NOISE: &str = "waveNoise";

/// World units between neighbouring vertices.
pub const CELL_SIZE: f32 = 18.0;
/// Fraction of the remaining distance the camera covers per frame.
const CAMERA_EASE: f32 = 0.02;
const CAMERA_EPSILON: f32 = 0.01;

#[derive(Error, Debug)]
pub enum WaveError {
    #[error("wave grid needs at least one cell, got {width}x{height}")]
    EmptyGrid { width: f64, height: f64 },
    #[error("wave grid {width}x{height} exceeds the 32-bit vertex index range")]
    GridTooLarge { width: f64, height: f64 },
}

/// Height offset of a vertex at `(x, z)` at scaled time `t`.
///
/// The sine is folded into `[0, 1]` and squared, giving sharp troughs and flat crests.
pub fn wave_displacement(x: f64, z: f64, t: f64, wave_speed: f64, wave_height: f64) -> f64 {
    let s = wave_speed;
    let cross_chop = s.sqrt() * (-x - z * 0.7).cos();
    let delta = (s * t * 0.02 - s * x * 0.025 + s * z * 0.015 + cross_chop).sin();
    let trochoid = (delta + 1.0).powi(2) / 4.0;
    trochoid * wave_height
}

/// Two triangles per cell of a `width x height` grid of `(width + 1) x (height + 1)` vertices.
pub fn triangulate(width: usize, height: usize, rng: &mut impl Rng) -> Vec<u32> {
    let index = |i: usize, j: usize| (i * (height + 1) + j) as u32;
    let mut indices = Vec::with_capacity(width * height * 6);
    // a b
    // c d
    for i in 1..=width {
        for j in 1..=height {
            let d = index(i, j);
            let b = index(i, j - 1);
            let c = index(i - 1, j);
            let a = index(i - 1, j - 1);
            if rng.random_bool(0.5) {
                indices.extend_from_slice(&[a, b, c, b, c, d]);
            } else {
                indices.extend_from_slice(&[a, b, d, a, c, d]);
            }
        }
    }
    indices
}

/// Resting heights of the grid; topology is fixed once built.
#[derive(Debug, Clone)]
pub struct WaveGrid {
    width: usize,
    height: usize,
    resting: Vec<f32>,
}

impl WaveGrid {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn vertex_count(&self) -> usize {
        self.resting.len()
    }

    pub fn resting_height(&self, i: usize, j: usize) -> f32 {
        self.resting[i * (self.height + 1) + j]
    }

    pub fn resting_heights(&self) -> &[f32] {
        &self.resting
    }
}

pub struct WaveEffect {
    rng: SmallRng,
    grid: Option<WaveGrid>,
    plane: Option<NodeId>,
    camera_target: Vec3,
}

impl WaveEffect {
    pub fn new(seed: u64) -> Self {
        WaveEffect {
            rng: SmallRng::seed_from_u64(seed),
            grid: None,
            plane: None,
            camera_target: Vec3::new(150.0 - 10.0, -30.0, 200.0 - 10.0),
        }
    }

    pub fn grid(&self) -> Option<&WaveGrid> {
        self.grid.as_ref()
    }

    pub fn plane(&self) -> Option<NodeId> {
        self.plane
    }

    pub fn camera_target(&self) -> Vec3 {
        self.camera_target
    }

    fn grid_dims(options: &Options) -> Result<(usize, usize), WaveError> {
        let width = options.number_or(GRID_WIDTH, 100.0).floor();
        let height = options.number_or(GRID_HEIGHT, 80.0).floor();
        if width < 1.0 || height < 1.0 {
            return Err(WaveError::EmptyGrid { width, height });
        }
        if (width + 1.0) * (height + 1.0) > u32::MAX as f64 {
            return Err(WaveError::GridTooLarge { width, height });
        }
        Ok((width as usize, height as usize))
    }
}

impl Effect for WaveEffect {
    fn name(&self) -> &'static str {
        "waves"
    }

    fn default_options(&self) -> Options {
        Options::new()
            .with(SHININESS, 30.0)
            .with(WAVE_HEIGHT, 15.0)
            .with(WAVE_SPEED, 1.0)
            .with(COLOR, 0x000000)
    }

    fn on_init(&mut self, ctx: &mut EffectContext<'_>) -> Result<(), HookError> {
        let (width, height) = Self::grid_dims(ctx.options)?;
        let noise = ctx.options.number_or(WAVE_NOISE, 7.0) as f32;

        let mut points = Vec::with_capacity((width + 1) * (height + 1));
        let mut resting = Vec::with_capacity(points.capacity());
        for i in 0..=width {
            for j in 0..=height {
                let y = noise * self.rng.random::<f32>() - 10.0;
                points.push(Vec3::new(
                    (i as f32 - width as f32 * 0.5) * CELL_SIZE,
                    y,
                    (height as f32 * 0.5 - j as f32) * CELL_SIZE,
                ));
                resting.push(y);
            }
        }
        let indices = triangulate(width, height, &mut self.rng);

        let mut material = PhongMaterial::new(
            ctx.options.color(COLOR).unwrap_or(Color::BLACK),
            ctx.options.number_or(SHININESS, 30.0),
        );
        material.flat_shading = true;
        material.side = Side::Double;

        self.plane = Some(ctx.scene.add(NodeKind::Mesh(Mesh {
            geometry: Geometry::new(&points, indices),
            material,
        })));
        ctx.scene.add(NodeKind::AmbientLight {
            color: Color::WHITE,
            intensity: 0.9,
        });
        ctx.scene.add(NodeKind::PointLight {
            color: Color::WHITE,
            intensity: 0.9,
            position: Vec3::new(-100.0, 250.0, -100.0),
        });

        let mut camera = PerspectiveCamera::new(35.0, ctx.size.aspect(), 50.0, 10000.0);
        camera.position = Vec3::new(0.0, 800.0, 0.0);
        camera.look_at = Vec3::ZERO;
        *ctx.camera = Some(camera);

        self.grid = Some(WaveGrid {
            width,
            height,
            resting,
        });
        Ok(())
    }

    fn on_update(&mut self, ctx: &mut EffectContext<'_>) {
        if let Some(camera) = ctx.camera.as_mut() {
            let target = self.camera_target;
            camera.position = Vec3::new(
                glide(camera.position.x, target.x),
                glide(camera.position.y, target.y),
                glide(camera.position.z, target.z),
            );
            camera.look_at = Vec3::ZERO;
        }

        let (Some(plane), Some(grid)) = (self.plane, self.grid.as_ref()) else {
            return;
        };
        let Some(mesh) = ctx.scene.mesh_mut(plane) else {
            return;
        };
        if let Some(color) = ctx.options.color(COLOR) {
            mesh.material.color = color;
        }
        if let Some(shininess) = ctx.options.number(SHININESS) {
            mesh.material.shininess = shininess;
        }

        let speed = ctx.options.number_or(WAVE_SPEED, 1.0);
        let wave_height = ctx.options.number_or(WAVE_HEIGHT, 15.0);
        let geometry = &mut mesh.geometry;
        for (index, rest) in grid.resting.iter().enumerate() {
            let v = geometry.vertex(index);
            let offset =
                wave_displacement(v.x as f64, v.z as f64, ctx.time.t2, speed, wave_height);
            geometry.set_height(index, rest + offset as f32);
        }
        geometry.compute_vertex_normals();
        geometry.mark_dirty();
    }

    fn on_restart(&mut self, _ctx: &mut EffectContext<'_>) {
        self.grid = None;
        self.plane = None;
    }

    fn on_destroy(&mut self, _ctx: &mut EffectContext<'_>) {
        self.grid = None;
        self.plane = None;
    }
}

/// Exponential approach; stops adjusting once within epsilon.
fn glide(current: f32, target: f32) -> f32 {
    let diff = target - current;
    if diff.abs() > CAMERA_EPSILON {
        current + diff * CAMERA_EASE
    } else {
        current
    }
}
