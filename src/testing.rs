// Recording host and engine used by unit tests. State is shared through Rc so tests keep
// a handle after moving the fakes into a lifecycle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::engine::{RenderSurface, RenderingEngine, SurfaceOptions};
use crate::error::EffectError;
use crate::host::{CanvasStyle, FrameTask, Host};
use crate::scene::{PerspectiveCamera, Scene};
use crate::types::{
    Color, CssPosition, ElementMetrics, FrameHandle, ListenerId, ResourceId, ViewportMetrics,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FakeCanvas(u32);

#[derive(Debug, Clone)]
struct FakeElement {
    position: CssPosition,
    z_index: Option<i32>,
    metrics: ElementMetrics,
    children: Vec<ElementRef>,
    text_nodes: usize,
}

impl FakeElement {
    fn new(position: CssPosition, z_index: Option<i32>) -> Self {
        FakeElement {
            position,
            z_index,
            metrics: ElementMetrics::default(),
            children: Vec::new(),
            text_nodes: 0,
        }
    }
}

#[derive(Debug, Default)]
struct HostState {
    elements: Vec<FakeElement>,
    selectors: HashMap<String, ElementRef>,
    viewport: ViewportMetrics,
    user_agent: Option<String>,
    now: f64,
    canvases: HashMap<ElementRef, Vec<FakeCanvas>>,
    canvas_styles: HashMap<FakeCanvas, CanvasStyle>,
    next_frame: i32,
    pending: Vec<(FrameHandle, FrameTask)>,
    cancelled: Vec<FrameHandle>,
    next_listener: u32,
    listeners: Vec<ListenerId>,
}

#[derive(Debug, Clone)]
pub struct RecordingHost {
    state: Rc<RefCell<HostState>>,
}

impl RecordingHost {
    /// Host with one static `#waves` element, 800x600 at the top of the page.
    pub fn new() -> Self {
        let mut root = FakeElement::new(CssPosition::Static, None);
        root.metrics = ElementMetrics {
            offset_width: 800.0,
            offset_height: 600.0,
            rect_top: 0.0,
        };
        let mut state = HostState {
            elements: vec![root],
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/131.0".to_string()),
            ..Default::default()
        };
        state.selectors.insert("#waves".to_string(), ElementRef(0));
        RecordingHost {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn root(&self) -> ElementRef {
        ElementRef(0)
    }

    pub fn add_child(
        &self,
        parent: ElementRef,
        position: CssPosition,
        z_index: Option<i32>,
    ) -> ElementRef {
        let mut state = self.state.borrow_mut();
        let id = ElementRef(state.elements.len());
        state.elements.push(FakeElement::new(position, z_index));
        state.elements[parent.0].children.push(id);
        id
    }

    pub fn add_text(&self, parent: ElementRef) {
        self.state.borrow_mut().elements[parent.0].text_nodes += 1;
    }

    pub fn text_nodes(&self, element: ElementRef) -> usize {
        self.state.borrow().elements[element.0].text_nodes
    }

    pub fn set_metrics(&self, element: ElementRef, metrics: ElementMetrics) {
        self.state.borrow_mut().elements[element.0].metrics = metrics;
    }

    pub fn set_viewport(&self, viewport: ViewportMetrics) {
        self.state.borrow_mut().viewport = viewport;
    }

    pub fn set_user_agent(&self, agent: Option<&str>) {
        self.state.borrow_mut().user_agent = agent.map(str::to_string);
    }

    pub fn set_now(&self, now: f64) {
        self.state.borrow_mut().now = now;
    }

    pub fn position(&self, element: ElementRef) -> CssPosition {
        self.state.borrow().elements[element.0].position
    }

    pub fn z_index(&self, element: ElementRef) -> Option<i32> {
        self.state.borrow().elements[element.0].z_index
    }

    pub fn attached_canvases(&self, element: ElementRef) -> Vec<FakeCanvas> {
        self.state
            .borrow()
            .canvases
            .get(&element)
            .cloned()
            .unwrap_or_default()
    }

    pub fn canvas_style(&self, canvas: FakeCanvas) -> Option<CanvasStyle> {
        self.state.borrow().canvas_styles.get(&canvas).cloned()
    }

    pub fn pending(&self, task: FrameTask) -> Option<FrameHandle> {
        self.state
            .borrow()
            .pending
            .iter()
            .find(|(_, t)| *t == task)
            .map(|(h, _)| *h)
    }

    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Dequeue a scheduled frame the way a browser does right before invoking it.
    pub fn fire(&self, task: FrameTask) -> Option<FrameHandle> {
        let mut state = self.state.borrow_mut();
        let index = state.pending.iter().position(|(_, t)| *t == task)?;
        Some(state.pending.remove(index).0)
    }

    pub fn cancelled(&self) -> Vec<FrameHandle> {
        self.state.borrow().cancelled.clone()
    }

    pub fn listeners(&self) -> Vec<ListenerId> {
        self.state.borrow().listeners.clone()
    }
}

impl Host for RecordingHost {
    type Element = ElementRef;
    type Canvas = FakeCanvas;

    fn query_selector(&self, selector: &str) -> Option<ElementRef> {
        self.state.borrow().selectors.get(selector).copied()
    }

    fn wrap_text_nodes(&mut self, element: &ElementRef) {
        let count = std::mem::take(&mut self.state.borrow_mut().elements[element.0].text_nodes);
        for _ in 0..count {
            self.add_child(*element, CssPosition::Static, None);
        }
    }

    fn children(&self, element: &ElementRef) -> Vec<ElementRef> {
        self.state.borrow().elements[element.0].children.clone()
    }

    fn computed_position(&self, element: &ElementRef) -> CssPosition {
        self.position(*element)
    }

    fn set_position(&mut self, element: &ElementRef, position: CssPosition) {
        self.state.borrow_mut().elements[element.0].position = position;
    }

    fn computed_z_index(&self, element: &ElementRef) -> Option<i32> {
        self.z_index(*element)
    }

    fn set_z_index(&mut self, element: &ElementRef, z_index: i32) {
        self.state.borrow_mut().elements[element.0].z_index = Some(z_index);
    }

    fn element_metrics(&self, element: &ElementRef) -> ElementMetrics {
        self.state.borrow().elements[element.0].metrics
    }

    fn viewport(&self) -> ViewportMetrics {
        self.state.borrow().viewport
    }

    fn user_agent(&self) -> Option<String> {
        self.state.borrow().user_agent.clone()
    }

    fn append_canvas(&mut self, element: &ElementRef, canvas: &FakeCanvas) {
        self.state
            .borrow_mut()
            .canvases
            .entry(*element)
            .or_default()
            .push(*canvas);
    }

    fn remove_canvas(&mut self, element: &ElementRef, canvas: &FakeCanvas) {
        if let Some(list) = self.state.borrow_mut().canvases.get_mut(element) {
            list.retain(|c| c != canvas);
        }
    }

    fn style_canvas(&mut self, canvas: &FakeCanvas, style: &CanvasStyle) {
        self.state
            .borrow_mut()
            .canvas_styles
            .insert(*canvas, style.clone());
    }

    fn now(&self) -> f64 {
        self.state.borrow().now
    }

    fn request_frame(&mut self, task: FrameTask) -> FrameHandle {
        let mut state = self.state.borrow_mut();
        state.next_frame += 1;
        let handle = FrameHandle::new(state.next_frame);
        state.pending.push((handle, task));
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let mut state = self.state.borrow_mut();
        state.pending.retain(|(h, _)| *h != handle);
        state.cancelled.push(handle);
    }

    fn add_resize_listener(&mut self) -> ListenerId {
        let mut state = self.state.borrow_mut();
        state.next_listener += 1;
        let id = ListenerId::new(state.next_listener);
        state.listeners.push(id);
        id
    }

    fn remove_resize_listener(&mut self, id: ListenerId) {
        self.state.borrow_mut().listeners.retain(|l| *l != id);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetSize(f64, f64),
    PixelRatio(f64),
    ClearColor(u32, f64),
    Render,
}

#[derive(Debug, Default)]
struct EngineState {
    capable: bool,
    next_canvas: u32,
    calls: Vec<Call>,
    released: Vec<ResourceId>,
    rendered_nodes: Vec<usize>,
    fail_render: bool,
}

#[derive(Debug, Clone)]
pub struct RecordingEngine {
    state: Rc<RefCell<EngineState>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        RecordingEngine {
            state: Rc::new(RefCell::new(EngineState {
                capable: true,
                ..Default::default()
            })),
        }
    }

    pub fn without_surfaces() -> Self {
        RecordingEngine {
            state: Rc::new(RefCell::new(EngineState::default())),
        }
    }

    pub fn fail_renders(&self) {
        self.state.borrow_mut().fail_render = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn render_count(&self) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| **c == Call::Render)
            .count()
    }

    /// Node count of the scene seen by each render call.
    pub fn rendered_nodes(&self) -> Vec<usize> {
        self.state.borrow().rendered_nodes.clone()
    }

    pub fn released(&self) -> Vec<ResourceId> {
        self.state.borrow().released.clone()
    }
}

impl RenderingEngine<FakeCanvas> for RecordingEngine {
    fn create_surface(
        &self,
        _options: &SurfaceOptions,
    ) -> Option<Box<dyn RenderSurface<FakeCanvas>>> {
        let mut state = self.state.borrow_mut();
        if !state.capable {
            return None;
        }
        state.next_canvas += 1;
        Some(Box::new(RecordingSurface {
            canvas: FakeCanvas(state.next_canvas),
            state: Rc::clone(&self.state),
        }))
    }
}

struct RecordingSurface {
    canvas: FakeCanvas,
    state: Rc<RefCell<EngineState>>,
}

impl RenderSurface<FakeCanvas> for RecordingSurface {
    fn canvas(&self) -> &FakeCanvas {
        &self.canvas
    }

    fn set_size(&mut self, width: f64, height: f64) {
        self.state.borrow_mut().calls.push(Call::SetSize(width, height));
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.state.borrow_mut().calls.push(Call::PixelRatio(ratio));
    }

    fn set_clear_color(&mut self, color: Color, alpha: f64) {
        self.state
            .borrow_mut()
            .calls
            .push(Call::ClearColor(color.hex(), alpha));
    }

    fn render(&mut self, scene: &Scene, _camera: &PerspectiveCamera) -> Result<(), EffectError> {
        let mut state = self.state.borrow_mut();
        if state.fail_render {
            return Err(EffectError::Backend("context lost".to_string()));
        }
        state.calls.push(Call::Render);
        state.rendered_nodes.push(scene.nodes().len());
        Ok(())
    }

    fn release(&mut self, resource: ResourceId) {
        self.state.borrow_mut().released.push(resource);
    }
}
