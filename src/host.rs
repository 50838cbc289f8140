// Host environment contract: element lookup, style reads/writes, layout metrics,
// frame scheduling and resize subscription. Implemented over web-sys in `web`.

use crate::types::{CssPosition, ElementMetrics, FrameHandle, ListenerId, ViewportMetrics};

/// Work the lifecycle asks the host to run on the next animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTask {
    /// Advance and draw one frame.
    Tick,
    /// One-shot resize after layout has settled.
    Resize,
}

/// Element handle or selector naming the host element.
#[derive(Debug, Clone)]
pub enum Target<E> {
    Element(E),
    Selector(String),
}

impl<E> From<&str> for Target<E> {
    fn from(selector: &str) -> Self {
        Target::Selector(selector.to_string())
    }
}

/// Inline styles applied to the drawable surface.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasStyle {
    pub position: CssPosition,
    pub z_index: i32,
    pub top: f64,
    pub left: f64,
    pub pixelated: bool,
    pub class_name: &'static str,
}

impl CanvasStyle {
    pub fn overlay(pixelated: bool) -> Self {
        CanvasStyle {
            position: CssPosition::Absolute,
            z_index: 0,
            top: 0.0,
            left: 0.0,
            pixelated,
            class_name: "waves-canvas",
        }
    }
}

pub trait Host {
    type Element: Clone;
    type Canvas;

    fn query_selector(&self, selector: &str) -> Option<Self::Element>;

    /// Replace bare text children with inline elements so they can be stacked.
    fn wrap_text_nodes(&mut self, element: &Self::Element);
    fn children(&self, element: &Self::Element) -> Vec<Self::Element>;
    fn computed_position(&self, element: &Self::Element) -> CssPosition;
    fn set_position(&mut self, element: &Self::Element, position: CssPosition);
    /// `None` when the computed z-index is `auto`.
    fn computed_z_index(&self, element: &Self::Element) -> Option<i32>;
    fn set_z_index(&mut self, element: &Self::Element, z_index: i32);

    fn element_metrics(&self, element: &Self::Element) -> ElementMetrics;
    fn viewport(&self) -> ViewportMetrics;
    fn user_agent(&self) -> Option<String>;

    fn append_canvas(&mut self, element: &Self::Element, canvas: &Self::Canvas);
    fn remove_canvas(&mut self, element: &Self::Element, canvas: &Self::Canvas);
    fn style_canvas(&mut self, canvas: &Self::Canvas, style: &CanvasStyle);

    /// High-resolution timestamp in milliseconds.
    fn now(&self) -> f64;
    fn request_frame(&mut self, task: FrameTask) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
    fn add_resize_listener(&mut self) -> ListenerId;
    fn remove_resize_listener(&mut self, id: ListenerId);
}
