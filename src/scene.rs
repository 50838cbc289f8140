// Owned scene graph. Parents own their children; disposal walks the tree depth-first.

use crate::types::{Color, NodeId, ResourceId, Vec3};

/// A graphical resource that holds backend memory until disposed.
pub trait Disposable {
    fn resource_id(&self) -> ResourceId;
    fn dispose(&mut self);
    fn is_disposed(&self) -> bool;
}

/// Indexed triangle geometry. Positions and normals are flat `xyz` triples.
#[derive(Debug, Clone)]
pub struct Geometry {
    id: ResourceId,
    positions: Vec<f32>,
    normals: Vec<f32>,
    indices: Vec<u32>,
    revision: u64,
    disposed: bool,
}

impl Geometry {
    pub fn new(points: &[Vec3], indices: Vec<u32>) -> Self {
        let positions = points.iter().flat_map(|p| [p.x, p.y, p.z]).collect::<Vec<_>>();
        let mut geometry = Geometry {
            id: ResourceId::next(),
            normals: vec![0.0; positions.len()],
            positions,
            indices,
            revision: 0,
            disposed: false,
        };
        geometry.compute_vertex_normals();
        geometry
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex(&self, index: usize) -> Vec3 {
        let base = index * 3;
        Vec3::new(
            self.positions[base],
            self.positions[base + 1],
            self.positions[base + 2],
        )
    }

    pub fn set_height(&mut self, index: usize, y: f32) {
        self.positions[index * 3 + 1] = y;
    }

    /// Bumped whenever vertex data changes, so backends know to re-upload.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn mark_dirty(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Area-weighted smooth normals.
    pub fn compute_vertex_normals(&mut self) {
        self.normals.iter_mut().for_each(|n| *n = 0.0);
        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let (pa, pb, pc) = (self.vertex(a), self.vertex(b), self.vertex(c));
            let face = pc.sub(pb).cross(pa.sub(pb));
            for v in [a, b, c] {
                self.normals[v * 3] += face.x;
                self.normals[v * 3 + 1] += face.y;
                self.normals[v * 3 + 2] += face.z;
            }
        }
        for n in self.normals.chunks_exact_mut(3) {
            let unit = Vec3::new(n[0], n[1], n[2]).normalized();
            n.copy_from_slice(&[unit.x, unit.y, unit.z]);
        }
    }
}

impl Disposable for Geometry {
    fn resource_id(&self) -> ResourceId {
        self.id
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[derive(Debug, Clone)]
pub struct Texture {
    id: ResourceId,
    disposed: bool,
}

impl Texture {
    pub fn new() -> Self {
        Texture {
            id: ResourceId::next(),
            disposed: false,
        }
    }
}

impl Default for Texture {
    fn default() -> Self {
        Self::new()
    }
}

impl Disposable for Texture {
    fn resource_id(&self) -> ResourceId {
        self.id
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
    Double,
}

/// Phong-lit material. `maps` holds any textures the material samples.
#[derive(Debug, Clone)]
pub struct PhongMaterial {
    id: ResourceId,
    pub color: Color,
    pub shininess: f64,
    pub flat_shading: bool,
    pub side: Side,
    pub maps: Vec<Texture>,
    disposed: bool,
}

impl PhongMaterial {
    pub fn new(color: Color, shininess: f64) -> Self {
        PhongMaterial {
            id: ResourceId::next(),
            color,
            shininess,
            flat_shading: false,
            side: Side::Front,
            maps: Vec::new(),
            disposed: false,
        }
    }
}

impl Disposable for PhongMaterial {
    fn resource_id(&self) -> ResourceId {
        self.id
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: PhongMaterial,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    AmbientLight { color: Color, intensity: f32 },
    PointLight { color: Color, intensity: f32, position: Vec3 },
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    pub kind: NodeKind,
    children: Vec<Node>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    fn find(&self, id: NodeId) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a Node>) {
        out.push(self);
        for child in &self.children {
            child.visit(out);
        }
    }

    /// Children first, then this node's own resources.
    fn dispose(&mut self, release: &mut dyn FnMut(ResourceId)) {
        for mut child in self.children.drain(..) {
            child.dispose(release);
        }
        if let NodeKind::Mesh(mesh) = &mut self.kind {
            dispose_one(&mut mesh.geometry, release);
            for map in &mut mesh.material.maps {
                dispose_one(map, release);
            }
            dispose_one(&mut mesh.material, release);
        }
    }
}

fn dispose_one(resource: &mut dyn Disposable, release: &mut dyn FnMut(ResourceId)) {
    if !resource.is_disposed() {
        resource.dispose();
        release(resource.resource_id());
    }
}

/// Root of a scene graph.
#[derive(Debug, Default)]
pub struct Scene {
    children: Vec<Node>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Scene::default()
    }

    fn alloc(&mut self, kind: NodeKind) -> Node {
        self.next_id += 1;
        Node {
            id: NodeId::new(self.next_id),
            kind,
            children: Vec::new(),
        }
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let node = self.alloc(kind);
        let id = node.id;
        self.children.push(node);
        id
    }

    /// Attach under an existing node. Returns `None` when the parent is unknown.
    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind) -> Option<NodeId> {
        let node = self.alloc(kind);
        let id = node.id;
        let parent = self.children.iter_mut().find_map(|c| c.find_mut(parent))?;
        parent.children.push(node);
        Some(id)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    pub fn mesh(&self, id: NodeId) -> Option<&Mesh> {
        match &self.node(id)?.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self, id: NodeId) -> Option<&mut Mesh> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Every node, pre-order.
    pub fn nodes(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        for child in &self.children {
            child.visit(&mut out);
        }
        out
    }

    /// Detach all top-level nodes without disposing their resources.
    pub fn clear(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.children)
    }

    /// Dispose every resource in the tree depth-first and empty the scene.
    pub fn dispose_all(&mut self, release: &mut dyn FnMut(ResourceId)) {
        for mut child in self.children.drain(..) {
            child.dispose(release);
        }
    }
}

/// Perspective projection camera.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub fov: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
    pub position: Vec3,
    pub look_at: Vec3,
    projection_revision: u64,
}

impl PerspectiveCamera {
    pub fn new(fov: f64, aspect: f64, near: f64, far: f64) -> Self {
        PerspectiveCamera {
            fov,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
            look_at: Vec3::ZERO,
            projection_revision: 0,
        }
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
        self.update_projection_matrix();
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection_revision = self.projection_revision.wrapping_add(1);
    }

    pub fn projection_revision(&self) -> u64 {
        self.projection_revision
    }
}
