// Browser bindings: a web-sys `Host`, the exported `WavesEffect` handle and the `start`
// bootstrap. Browser callbacks reach the instance through a weak slot and do nothing once
// it is gone or borrowed.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlCanvasElement, HtmlElement, Window};

use crate::config::Options;
use crate::error::EffectError;
use crate::host::{CanvasStyle, FrameTask, Host, Target};
use crate::lifecycle::{EffectLifecycle, LifecycleState};
use crate::three::ThreeEngine;
use crate::types::{CssPosition, ElementMetrics, FrameHandle, ListenerId, ViewportMetrics};
use crate::waves::WaveEffect;

type Instance = EffectLifecycle<WaveEffect, WebHost>;
type Slot = Rc<RefCell<Option<Instance>>>;

const DEFAULT_SELECTOR: &str = "#waves";

fn with_instance(slot: &Weak<RefCell<Option<Instance>>>, f: impl FnOnce(&mut Instance)) {
    let Some(cell) = slot.upgrade() else {
        return;
    };
    let Ok(mut guard) = cell.try_borrow_mut() else {
        return;
    };
    if let Some(instance) = guard.as_mut() {
        f(instance);
    }
}

/// Closures handed to the browser. Dropped with the host.
struct Callbacks {
    tick: Closure<dyn FnMut(f64)>,
    settle: Closure<dyn FnMut(f64)>,
    resize: Closure<dyn FnMut()>,
}

impl Callbacks {
    fn new(slot: Weak<RefCell<Option<Instance>>>) -> Self {
        let tick_slot = slot.clone();
        let settle_slot = slot.clone();
        Callbacks {
            tick: Closure::<dyn FnMut(f64)>::new(move |now: f64| {
                with_instance(&tick_slot, |i| i.animation_frame(now))
            }),
            settle: Closure::<dyn FnMut(f64)>::new(move |now: f64| {
                with_instance(&settle_slot, |i| i.resize_frame(now))
            }),
            resize: Closure::<dyn FnMut()>::new(move || {
                with_instance(&slot, |i| i.window_resized())
            }),
        }
    }
}

pub struct WebHost {
    window: Window,
    document: Document,
    callbacks: Callbacks,
    next_listener: u32,
}

impl WebHost {
    fn new(slot: Weak<RefCell<Option<Instance>>>) -> Result<Self, EffectError> {
        let window =
            web_sys::window().ok_or_else(|| EffectError::Backend("no window".to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| EffectError::Backend("no document".to_string()))?;
        Ok(WebHost {
            window,
            document,
            callbacks: Callbacks::new(slot),
            next_listener: 0,
        })
    }

    fn computed(&self, element: &HtmlElement, property: &str) -> Option<String> {
        self.window
            .get_computed_style(element)
            .ok()
            .flatten()
            .and_then(|style| style.get_property_value(property).ok())
    }
}

fn set_style(element: &HtmlElement, property: &str, value: &str) {
    if let Err(err) = element.style().set_property(property, value) {
        log::debug!("[waves] style {}: {:?}", property, err);
    }
}

impl Host for WebHost {
    type Element = HtmlElement;
    type Canvas = HtmlCanvasElement;

    fn query_selector(&self, selector: &str) -> Option<HtmlElement> {
        self.document
            .query_selector(selector)
            .ok()
            .flatten()
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
    }

    fn wrap_text_nodes(&mut self, element: &HtmlElement) {
        let nodes = element.child_nodes();
        let texts: Vec<web_sys::Node> = (0..nodes.length())
            .filter_map(|i| nodes.item(i))
            .filter(|node| node.node_type() == web_sys::Node::TEXT_NODE)
            .collect();
        for text in texts {
            let Ok(span) = self.document.create_element("span") else {
                continue;
            };
            span.set_text_content(text.text_content().as_deref());
            if element.insert_before(&span, Some(&text)).is_ok() {
                let _ = element.remove_child(&text);
            }
        }
    }

    fn children(&self, element: &HtmlElement) -> Vec<HtmlElement> {
        let list = element.children();
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|el| el.dyn_into::<HtmlElement>().ok())
            .collect()
    }

    fn computed_position(&self, element: &HtmlElement) -> CssPosition {
        self.computed(element, "position")
            .map(|value| CssPosition::parse(&value))
            .unwrap_or(CssPosition::Static)
    }

    fn set_position(&mut self, element: &HtmlElement, position: CssPosition) {
        set_style(element, "position", position.as_css());
    }

    fn computed_z_index(&self, element: &HtmlElement) -> Option<i32> {
        let value = self.computed(element, "z-index")?;
        match value.trim() {
            "" | "auto" => None,
            other => Some(other.parse().unwrap_or(0)),
        }
    }

    fn set_z_index(&mut self, element: &HtmlElement, z_index: i32) {
        set_style(element, "z-index", &z_index.to_string());
    }

    fn element_metrics(&self, element: &HtmlElement) -> ElementMetrics {
        ElementMetrics {
            offset_width: element.offset_width() as f64,
            offset_height: element.offset_height() as f64,
            rect_top: element.get_bounding_client_rect().top(),
        }
    }

    fn viewport(&self) -> ViewportMetrics {
        let dimension = |value: Result<JsValue, JsValue>| {
            value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
        };
        ViewportMetrics {
            width: dimension(self.window.inner_width()),
            height: dimension(self.window.inner_height()),
            scroll_top: self.window.scroll_y().unwrap_or(0.0),
            device_pixel_ratio: self.window.device_pixel_ratio(),
        }
    }

    fn user_agent(&self) -> Option<String> {
        self.window.navigator().user_agent().ok()
    }

    fn append_canvas(&mut self, element: &HtmlElement, canvas: &HtmlCanvasElement) {
        if let Err(err) = element.append_child(canvas) {
            log::warn!("[waves] append canvas: {:?}", err);
        }
    }

    fn remove_canvas(&mut self, element: &HtmlElement, canvas: &HtmlCanvasElement) {
        let _ = element.remove_child(canvas);
    }

    fn style_canvas(&mut self, canvas: &HtmlCanvasElement, style: &CanvasStyle) {
        set_style(canvas, "position", style.position.as_css());
        set_style(canvas, "z-index", &style.z_index.to_string());
        set_style(canvas, "top", &format!("{}px", style.top));
        set_style(canvas, "left", &format!("{}px", style.left));
        if style.pixelated {
            set_style(canvas, "image-rendering", "pixelated");
        }
        let _ = canvas.class_list().add_1(style.class_name);
    }

    fn now(&self) -> f64 {
        self.window
            .performance()
            .map(|p| p.now())
            .unwrap_or_else(js_sys::Date::now)
    }

    fn request_frame(&mut self, task: FrameTask) -> FrameHandle {
        let callback = match task {
            FrameTask::Tick => &self.callbacks.tick,
            FrameTask::Resize => &self.callbacks.settle,
        };
        match self
            .window
            .request_animation_frame(callback.as_ref().unchecked_ref())
        {
            Ok(id) => FrameHandle::new(id),
            Err(err) => {
                log::warn!("[waves] requestAnimationFrame: {:?}", err);
                FrameHandle::new(0)
            }
        }
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let _ = self.window.cancel_animation_frame(handle.as_i32());
    }

    fn add_resize_listener(&mut self) -> ListenerId {
        let _ = self.window.add_event_listener_with_callback(
            "resize",
            self.callbacks.resize.as_ref().unchecked_ref(),
        );
        self.next_listener += 1;
        ListenerId::new(self.next_listener)
    }

    fn remove_resize_listener(&mut self, _id: ListenerId) {
        let _ = self.window.remove_event_listener_with_callback(
            "resize",
            self.callbacks.resize.as_ref().unchecked_ref(),
        );
    }
}

/// Wave background bound to one element.
///
/// Construction never throws: a missing element, a missing three.js build or a failed
/// init are logged and leave an inert handle whose methods do nothing.
#[wasm_bindgen]
pub struct WavesEffect {
    inner: Slot,
}

#[wasm_bindgen]
impl WavesEffect {
    /// `el` is a selector string or an element. `three` overrides the global `THREE`.
    #[wasm_bindgen(constructor)]
    pub fn new(el: JsValue, config_json: Option<String>, three: Option<js_sys::Object>) -> WavesEffect {
        let handle = WavesEffect {
            inner: Rc::new(RefCell::new(None)),
        };

        let target = match el.as_string() {
            Some(selector) => Target::Selector(selector),
            None => match el.dyn_into::<HtmlElement>() {
                Ok(element) => Target::Element(element),
                Err(_) => {
                    log::error!("[waves] Instance needs \"el\" param!");
                    return handle;
                }
            },
        };
        let overrides = match Options::from_json(config_json.as_deref().unwrap_or("")) {
            Ok(options) => options,
            Err(err) => {
                log::error!("[waves] ignoring options: {}", err);
                Options::new()
            }
        };
        let host = match WebHost::new(Rc::downgrade(&handle.inner)) {
            Ok(host) => host,
            Err(err) => {
                log::error!("[waves] {}", err);
                return handle;
            }
        };

        let seed = (js_sys::Math::random() * u64::MAX as f64) as u64;
        let engine = ThreeEngine::resolve(three);
        if let Ok(instance) =
            EffectLifecycle::new(WaveEffect::new(seed), host, &engine, target, &overrides)
        {
            *handle.inner.borrow_mut() = Some(instance);
        }
        handle
    }

    /// Merge a JSON object into the live options.
    #[wasm_bindgen(js_name = setOptions)]
    pub fn set_options(&self, json: &str) -> Result<(), JsValue> {
        let partial = Options::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.with(|i| i.set_options(&partial));
        Ok(())
    }

    pub fn resize(&self) {
        self.with(|i| i.resize());
    }

    pub fn restart(&self) {
        self.with(|i| i.restart());
    }

    pub fn destroy(&self) {
        self.with(|i| i.destroy());
    }

    #[wasm_bindgen(getter, js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.inner
            .borrow()
            .as_ref()
            .is_some_and(|i| i.state() == LifecycleState::Running)
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> f64 {
        self.inner.borrow().as_ref().map_or(0.0, |i| i.size().width)
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> f64 {
        self.inner.borrow().as_ref().map_or(0.0, |i| i.size().height)
    }

    /// Scaled animation time.
    #[wasm_bindgen(getter)]
    pub fn time(&self) -> f64 {
        self.inner.borrow().as_ref().map_or(0.0, |i| i.time().t2)
    }
}

impl WavesEffect {
    fn with(&self, f: impl FnOnce(&mut Instance)) {
        with_instance(&Rc::downgrade(&self.inner), f);
    }
}

impl Drop for WavesEffect {
    fn drop(&mut self) {
        // Pending frames would otherwise call into freed closures.
        self.with(|i| i.destroy());
    }
}

/// Attach a wave background to `selector` (default `#waves`), creating a full-viewport
/// `#waves` backdrop when nothing matches.
#[wasm_bindgen]
pub fn start(selector: Option<String>) -> WavesEffect {
    let mut selector = selector.unwrap_or_else(|| DEFAULT_SELECTOR.to_string());
    if let Some(document) = web_sys::window().and_then(|w| w.document()) {
        let missing = document.query_selector(&selector).ok().flatten().is_none();
        if missing {
            match create_backdrop(&document) {
                Ok(()) => selector = DEFAULT_SELECTOR.to_string(),
                Err(err) => log::warn!("[waves] backdrop: {:?}", err),
            }
        }
    }
    WavesEffect::new(JsValue::from_str(&selector), None, None)
}

fn create_backdrop(document: &Document) -> Result<(), JsValue> {
    if document.query_selector(DEFAULT_SELECTOR)?.is_some() {
        return Ok(());
    }
    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("document has no body"))?;
    let element: HtmlElement = document.create_element("div")?.dyn_into()?;
    element.set_id("waves");
    for (property, value) in [
        ("position", "absolute"),
        ("top", "0"),
        ("left", "0"),
        ("width", "100%"),
        ("height", "100%"),
        ("z-index", "-1"),
    ] {
        element.style().set_property(property, value)?;
    }
    body.prepend_with_node_1(&element)
}
