// Surface sizing: element box clamped to configured minimums, plus a mobile-aware resolution scale.

use crate::config::{Options, MIN_HEIGHT, MIN_WIDTH, SCALE, SCALE_MOBILE};
use crate::types::{ElementMetrics, SurfaceSize, ViewportMetrics};

/// Viewports narrower than this are treated as mobile.
pub const MOBILE_MAX_WIDTH: f64 = 600.0;

const MOBILE_AGENTS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

/// Mobile classification from viewport width and user agent.
pub fn is_mobile(viewport_width: f64, user_agent: Option<&str>) -> bool {
    let Some(agent) = user_agent else {
        // No navigator: nothing to classify.
        return false;
    };
    let agent = agent.to_ascii_lowercase();
    MOBILE_AGENTS.iter().any(|needle| agent.contains(needle)) || viewport_width < MOBILE_MAX_WIDTH
}

/// Computes surface dimensions for a host element.
pub struct SizingPolicy;

impl SizingPolicy {
    pub fn compute_size(
        metrics: &ElementMetrics,
        viewport: &ViewportMetrics,
        user_agent: Option<&str>,
        options: &Options,
        previous_scale: Option<f64>,
    ) -> SurfaceSize {
        let mut scale = previous_scale.unwrap_or(1.0);
        match (is_mobile(viewport.width, user_agent), options.nonzero(SCALE_MOBILE)) {
            (true, Some(mobile)) => scale = mobile,
            _ => {
                if let Some(desktop) = options.nonzero(SCALE) {
                    scale = desktop;
                }
            }
        }

        SurfaceSize {
            width: metrics.offset_width.max(options.number_or(MIN_WIDTH, 0.0)),
            height: metrics.offset_height.max(options.number_or(MIN_HEIGHT, 0.0)),
            scale,
        }
    }
}
