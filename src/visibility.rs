// Viewport intersection test used to skip per-frame work for off-screen elements.

use crate::types::{ElementMetrics, ViewportMetrics};

/// Determines whether a host element currently overlaps the scroll viewport.
pub struct VisibilityProbe;

impl VisibilityProbe {
    pub fn is_on_screen(metrics: &ElementMetrics, viewport: &ViewportMetrics) -> bool {
        is_on_screen(metrics, viewport.scroll_top, viewport.height)
    }
}

/// True when the element's vertical span intersects the viewport.
pub fn is_on_screen(metrics: &ElementMetrics, scroll_top: f64, viewport_height: f64) -> bool {
    let offset_top = metrics.rect_top + scroll_top;
    let min_scroll_top = offset_top - viewport_height;
    let max_scroll_top = offset_top + metrics.offset_height;
    min_scroll_top <= scroll_top && scroll_top <= max_scroll_top
}
