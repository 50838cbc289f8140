// three.js rendering engine, reached through a namespace object so a custom build can be
// injected per instance. The Rust scene graph is mirrored into three.js objects on each draw.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use js_sys::{Array, Float32Array, Function, Object, Reflect, Uint32Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlCanvasElement;

use crate::engine::{RenderSurface, RenderingEngine, SurfaceOptions};
use crate::error::EffectError;
use crate::scene::{Disposable, Mesh, Node, NodeKind, PerspectiveCamera, Scene, Side};
use crate::types::{Color, NodeId, ResourceId};

/// `THREE.DynamicDrawUsage`
const DYNAMIC_DRAW_USAGE: u32 = 35048;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(extends = Object)]
    #[derive(Debug, Clone)]
    type WebGlRenderer;

    #[wasm_bindgen(method, getter, js_name = domElement)]
    fn dom_element(this: &WebGlRenderer) -> HtmlCanvasElement;

    #[wasm_bindgen(method, js_name = setSize)]
    fn set_size(this: &WebGlRenderer, width: f64, height: f64);

    #[wasm_bindgen(method, js_name = setPixelRatio)]
    fn set_pixel_ratio(this: &WebGlRenderer, ratio: f64);

    #[wasm_bindgen(method, js_name = setClearColor)]
    fn set_clear_color(this: &WebGlRenderer, color: u32, alpha: f64);

    #[wasm_bindgen(method, catch)]
    fn render(this: &WebGlRenderer, scene: &Object3D, camera: &Object3D) -> Result<(), JsValue>;

    #[wasm_bindgen(method)]
    fn dispose(this: &WebGlRenderer);

    #[wasm_bindgen(extends = Object)]
    #[derive(Debug, Clone)]
    type Object3D;

    #[wasm_bindgen(method)]
    fn add(this: &Object3D, child: &Object3D);

    #[wasm_bindgen(method)]
    fn remove(this: &Object3D, child: &Object3D);

    #[wasm_bindgen(method, getter)]
    fn position(this: &Object3D) -> Vector3;

    #[wasm_bindgen(method, js_name = lookAt)]
    fn look_at(this: &Object3D, x: f64, y: f64, z: f64);

    #[wasm_bindgen(extends = Object)]
    #[derive(Debug, Clone)]
    type Vector3;

    #[wasm_bindgen(method)]
    fn set(this: &Vector3, x: f64, y: f64, z: f64);

    #[wasm_bindgen(extends = Object3D, extends = Object)]
    #[derive(Debug, Clone)]
    type ThreeCamera;

    #[wasm_bindgen(method, setter)]
    fn set_fov(this: &ThreeCamera, fov: f64);

    #[wasm_bindgen(method, setter)]
    fn set_aspect(this: &ThreeCamera, aspect: f64);

    #[wasm_bindgen(method, setter)]
    fn set_near(this: &ThreeCamera, near: f64);

    #[wasm_bindgen(method, setter)]
    fn set_far(this: &ThreeCamera, far: f64);

    #[wasm_bindgen(method, js_name = updateProjectionMatrix)]
    fn update_projection_matrix(this: &ThreeCamera);

    #[wasm_bindgen(extends = Object)]
    #[derive(Debug, Clone)]
    type BufferGeometry;

    #[wasm_bindgen(method, js_name = setAttribute)]
    fn set_attribute(this: &BufferGeometry, name: &str, attribute: &BufferAttribute);

    #[wasm_bindgen(method, js_name = setIndex)]
    fn set_index(this: &BufferGeometry, index: &BufferAttribute);

    #[wasm_bindgen(extends = Object)]
    #[derive(Debug, Clone)]
    type BufferAttribute;

    #[wasm_bindgen(method, getter)]
    fn array(this: &BufferAttribute) -> Float32Array;

    #[wasm_bindgen(method, setter = needsUpdate)]
    fn set_needs_update(this: &BufferAttribute, value: bool);

    #[wasm_bindgen(method, js_name = setUsage)]
    fn set_usage(this: &BufferAttribute, usage: u32);

    #[wasm_bindgen(extends = Object)]
    #[derive(Debug, Clone)]
    type PhongMaterial3;

    #[wasm_bindgen(method, getter)]
    fn color(this: &PhongMaterial3) -> ThreeColor;

    #[wasm_bindgen(method, setter)]
    fn set_shininess(this: &PhongMaterial3, shininess: f64);

    #[wasm_bindgen(extends = Object)]
    #[derive(Debug, Clone)]
    type ThreeColor;

    #[wasm_bindgen(method, js_name = setHex)]
    fn set_hex(this: &ThreeColor, hex: u32);

    /// Anything exposing `dispose()`.
    #[wasm_bindgen(extends = Object)]
    #[derive(Debug, Clone)]
    type ThreeResource;

    #[wasm_bindgen(method, js_name = dispose)]
    fn dispose_resource(this: &ThreeResource);
}

fn js_error(err: JsValue) -> EffectError {
    EffectError::Backend(err.as_string().unwrap_or_else(|| format!("{:?}", err)))
}

thread_local! {
    static GLOBAL_THREE: RefCell<Option<Object>> = const { RefCell::new(None) };
}

fn lookup_global() -> Option<Object> {
    Reflect::get(&js_sys::global(), &JsValue::from_str("THREE"))
        .ok()
        .filter(|v| v.is_object())
        .map(|v| v.unchecked_into::<Object>())
}

/// three.js namespace handle. Without a namespace no surface can be created.
#[derive(Debug, Clone)]
pub struct ThreeEngine {
    namespace: Option<Object>,
}

impl ThreeEngine {
    pub fn new(namespace: Object) -> Self {
        ThreeEngine {
            namespace: Some(namespace),
        }
    }

    /// Global `THREE`. Cached once found; looked up again while the page has none.
    pub fn global() -> Self {
        let namespace = GLOBAL_THREE.with(|cell| {
            let mut cached = cell.borrow_mut();
            if cached.is_none() {
                *cached = lookup_global();
            }
            cached.clone()
        });
        ThreeEngine { namespace }
    }

    /// Injected build if given, else the global one.
    pub fn resolve(injected: Option<Object>) -> Self {
        injected.map(ThreeEngine::new).unwrap_or_else(ThreeEngine::global)
    }

    fn member(&self, name: &str) -> Option<JsValue> {
        let namespace = self.namespace.as_ref()?;
        Reflect::get(namespace, &JsValue::from_str(name))
            .ok()
            .filter(|v| !v.is_undefined())
    }

    fn construct(&self, name: &str, args: &Array) -> Result<JsValue, EffectError> {
        let ctor = self
            .member(name)
            .and_then(|v| v.dyn_into::<Function>().ok())
            .ok_or_else(|| EffectError::Backend(format!("THREE.{} is missing", name)))?;
        Reflect::construct(&ctor, args).map_err(js_error)
    }
}

impl RenderingEngine<HtmlCanvasElement> for ThreeEngine {
    fn create_surface(
        &self,
        options: &SurfaceOptions,
    ) -> Option<Box<dyn RenderSurface<HtmlCanvasElement>>> {
        self.member("WebGLRenderer")?;
        let params = Object::new();
        Reflect::set(&params, &"alpha".into(), &options.alpha.into()).ok()?;
        Reflect::set(&params, &"antialias".into(), &options.antialias.into()).ok()?;

        let built = self
            .construct("WebGLRenderer", &Array::of1(&params))
            .and_then(|renderer| Ok((renderer, self.construct("Scene", &Array::new())?)));
        let (renderer, scene) = match built {
            Ok(parts) => parts,
            Err(err) => {
                log::warn!("[waves] {}", err);
                return None;
            }
        };
        let renderer: WebGlRenderer = renderer.unchecked_into();
        Some(Box::new(ThreeSurface {
            engine: self.clone(),
            canvas: renderer.dom_element(),
            renderer,
            scene: scene.unchecked_into(),
            mirrors: HashMap::new(),
            resources: HashMap::new(),
            camera: None,
        }))
    }
}

struct MeshMirror {
    position: BufferAttribute,
    normal: BufferAttribute,
    material: PhongMaterial3,
    revision: u64,
}

struct Mirror {
    object: Object3D,
    mesh: Option<MeshMirror>,
    resources: Vec<ResourceId>,
}

struct CameraMirror {
    object: ThreeCamera,
    projection: Option<u64>,
}

struct ThreeSurface {
    engine: ThreeEngine,
    renderer: WebGlRenderer,
    canvas: HtmlCanvasElement,
    scene: Object3D,
    mirrors: HashMap<NodeId, Mirror>,
    resources: HashMap<ResourceId, ThreeResource>,
    camera: Option<CameraMirror>,
}

impl ThreeSurface {
    fn attribute(&self, data: Float32Array) -> Result<BufferAttribute, EffectError> {
        let attribute: BufferAttribute = self
            .engine
            .construct("BufferAttribute", &Array::of2(&data, &JsValue::from(3)))?
            .unchecked_into();
        attribute.set_usage(DYNAMIC_DRAW_USAGE);
        Ok(attribute)
    }

    fn build_mesh(&mut self, mesh: &Mesh) -> Result<Mirror, EffectError> {
        let geometry: BufferGeometry = self
            .engine
            .construct("BufferGeometry", &Array::new())?
            .unchecked_into();
        let position = self.attribute(Float32Array::from(mesh.geometry.positions()))?;
        let normal = self.attribute(Float32Array::from(mesh.geometry.normals()))?;
        let index: BufferAttribute = self
            .engine
            .construct(
                "BufferAttribute",
                &Array::of2(
                    &Uint32Array::from(mesh.geometry.indices()),
                    &JsValue::from(1),
                ),
            )?
            .unchecked_into();
        geometry.set_attribute("position", &position);
        geometry.set_attribute("normal", &normal);
        geometry.set_index(&index);

        let params = Object::new();
        let side = match mesh.material.side {
            Side::Front => "FrontSide",
            Side::Back => "BackSide",
            Side::Double => "DoubleSide",
        };
        let entries: [(&str, JsValue); 4] = [
            ("color", mesh.material.color.hex().into()),
            ("shininess", mesh.material.shininess.into()),
            ("flatShading", mesh.material.flat_shading.into()),
            ("side", self.engine.member(side).unwrap_or(JsValue::UNDEFINED)),
        ];
        for (key, value) in entries {
            Reflect::set(&params, &key.into(), &value).map_err(js_error)?;
        }
        let material: PhongMaterial3 = self
            .engine
            .construct("MeshPhongMaterial", &Array::of1(&params))?
            .unchecked_into();
        let object: Object3D = self
            .engine
            .construct("Mesh", &Array::of2(&geometry, &material))?
            .unchecked_into();

        let geometry_id = mesh.geometry.resource_id();
        let material_id = mesh.material.resource_id();
        self.resources
            .insert(geometry_id, geometry.unchecked_into());
        self.resources
            .insert(material_id, material.clone().unchecked_into());

        Ok(Mirror {
            object,
            mesh: Some(MeshMirror {
                position,
                normal,
                material,
                revision: mesh.geometry.revision(),
            }),
            resources: vec![geometry_id, material_id],
        })
    }

    fn build_light(&self, name: &str, color: Color, intensity: f32) -> Result<Mirror, EffectError> {
        let object: Object3D = self
            .engine
            .construct(
                name,
                &Array::of2(&color.hex().into(), &(intensity as f64).into()),
            )?
            .unchecked_into();
        Ok(Mirror {
            object,
            mesh: None,
            resources: Vec::new(),
        })
    }

    fn build(&mut self, node: &Node) -> Result<Mirror, EffectError> {
        match &node.kind {
            NodeKind::Group => Ok(Mirror {
                object: self
                    .engine
                    .construct("Group", &Array::new())?
                    .unchecked_into(),
                mesh: None,
                resources: Vec::new(),
            }),
            NodeKind::Mesh(mesh) => self.build_mesh(mesh),
            NodeKind::AmbientLight { color, intensity } => {
                self.build_light("AmbientLight", *color, *intensity)
            }
            NodeKind::PointLight {
                color,
                intensity,
                position,
            } => {
                let mirror = self.build_light("PointLight", *color, *intensity)?;
                mirror.object.position().set(
                    position.x as f64,
                    position.y as f64,
                    position.z as f64,
                );
                Ok(mirror)
            }
        }
    }

    /// Bring the three.js scene in line with `scene`. Groups carry no transform, so
    /// mirrors are flattened under the root.
    fn sync(&mut self, scene: &Scene) -> Result<(), EffectError> {
        let mut live = HashSet::new();
        for node in scene.nodes() {
            live.insert(node.id());
            if !self.mirrors.contains_key(&node.id()) {
                let mirror = self.build(node)?;
                self.scene.add(&mirror.object);
                self.mirrors.insert(node.id(), mirror);
            }
            if let (Some(mirror), NodeKind::Mesh(mesh)) =
                (self.mirrors.get_mut(&node.id()), &node.kind)
            {
                if let Some(state) = mirror.mesh.as_mut() {
                    update_mesh(state, mesh);
                }
            }
        }

        let stale: Vec<NodeId> = self
            .mirrors
            .keys()
            .filter(|id| !live.contains(*id))
            .copied()
            .collect();
        for id in stale {
            if let Some(mirror) = self.mirrors.remove(&id) {
                self.scene.remove(&mirror.object);
                // Content dropped by a restart is unreachable from the scene now.
                for resource in mirror.resources {
                    self.release(resource);
                }
            }
        }
        Ok(())
    }

    fn sync_camera(&mut self, camera: &PerspectiveCamera) -> Result<(), EffectError> {
        let mirror = match self.camera.take() {
            Some(mirror) => mirror,
            None => CameraMirror {
                object: self
                    .engine
                    .construct(
                        "PerspectiveCamera",
                        &Array::of4(
                            &camera.fov.into(),
                            &camera.aspect.into(),
                            &camera.near.into(),
                            &camera.far.into(),
                        ),
                    )?
                    .unchecked_into(),
                projection: None,
            },
        };
        let mirror = self.camera.insert(mirror);
        if mirror.projection != Some(camera.projection_revision()) {
            mirror.object.set_fov(camera.fov);
            mirror.object.set_aspect(camera.aspect);
            mirror.object.set_near(camera.near);
            mirror.object.set_far(camera.far);
            mirror.object.update_projection_matrix();
            mirror.projection = Some(camera.projection_revision());
        }
        let p = camera.position;
        mirror
            .object
            .position()
            .set(p.x as f64, p.y as f64, p.z as f64);
        let t = camera.look_at;
        mirror.object.look_at(t.x as f64, t.y as f64, t.z as f64);
        Ok(())
    }
}

fn update_mesh(state: &mut MeshMirror, mesh: &Mesh) {
    state.material.color().set_hex(mesh.material.color.hex());
    state.material.set_shininess(mesh.material.shininess);
    if state.revision == mesh.geometry.revision() {
        return;
    }
    state.position.array().copy_from(mesh.geometry.positions());
    state.position.set_needs_update(true);
    state.normal.array().copy_from(mesh.geometry.normals());
    state.normal.set_needs_update(true);
    state.revision = mesh.geometry.revision();
}

impl RenderSurface<HtmlCanvasElement> for ThreeSurface {
    fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    fn set_size(&mut self, width: f64, height: f64) {
        self.renderer.set_size(width, height);
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.renderer.set_pixel_ratio(ratio);
    }

    fn set_clear_color(&mut self, color: Color, alpha: f64) {
        self.renderer.set_clear_color(color.hex(), alpha);
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), EffectError> {
        self.sync(scene)?;
        self.sync_camera(camera)?;
        let Some(mirror) = self.camera.as_ref() else {
            return Ok(());
        };
        self.renderer
            .render(&self.scene, &mirror.object)
            .map_err(js_error)
    }

    fn release(&mut self, resource: ResourceId) {
        if let Some(handle) = self.resources.remove(&resource) {
            handle.dispose_resource();
        }
    }
}

impl Drop for ThreeSurface {
    fn drop(&mut self) {
        self.renderer.dispose();
    }
}
