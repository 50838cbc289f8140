// Strong typing over raw numbers. Newtypes for handles, colors, and pixel geometry.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// 24-bit RGB color, `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Color(u32);

impl Color {
    pub const BLACK: Color = Color(0x000000);
    pub const WHITE: Color = Color(0xffffff);

    pub fn from_hex(hex: u32) -> Self {
        Color(hex & 0xff_ffff)
    }

    pub fn hex(&self) -> u32 {
        self.0
    }

    /// Parse a configuration value: a number, or a `#rrggbb` / `0xrrggbb` string.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .map(|v| Color::from_hex(v as u32)),
            serde_json::Value::String(s) => {
                let s = s.trim();
                let digits = s
                    .strip_prefix('#')
                    .or_else(|| s.strip_prefix("0x"))
                    .or_else(|| s.strip_prefix("0X"))?;
                u32::from_str_radix(digits, 16).ok().map(Color::from_hex)
            }
            _ => None,
        }
    }
}

/// 3D vector in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vec3 { x, y, z }
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalized(self) -> Vec3 {
        let len = self.length();
        if len > 0.0 {
            Vec3::new(self.x / len, self.y / len, self.z / len)
        } else {
            self
        }
    }
}

/// Target drawing size of a surface, in CSS pixels, plus the resolution divisor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

impl SurfaceSize {
    pub fn aspect(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

impl Default for SurfaceSize {
    fn default() -> Self {
        SurfaceSize {
            width: 0.0,
            height: 0.0,
            scale: 1.0,
        }
    }
}

/// Layout readings of the host element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElementMetrics {
    pub offset_width: f64,
    pub offset_height: f64,
    /// Bounding rect top, relative to the viewport.
    pub rect_top: f64,
}

/// Window-level readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    pub width: f64,
    pub height: f64,
    pub scroll_top: f64,
    pub device_pixel_ratio: f64,
}

impl Default for ViewportMetrics {
    fn default() -> Self {
        ViewportMetrics {
            width: 1280.0,
            height: 800.0,
            scroll_top: 0.0,
            device_pixel_ratio: 1.0,
        }
    }
}

/// Computed CSS `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssPosition {
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

impl CssPosition {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "relative" => CssPosition::Relative,
            "absolute" => CssPosition::Absolute,
            "fixed" => CssPosition::Fixed,
            "sticky" => CssPosition::Sticky,
            _ => CssPosition::Static,
        }
    }

    pub fn as_css(&self) -> &'static str {
        match self {
            CssPosition::Static => "static",
            CssPosition::Relative => "relative",
            CssPosition::Absolute => "absolute",
            CssPosition::Fixed => "fixed",
            CssPosition::Sticky => "sticky",
        }
    }
}

/// Registration returned by the host frame scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(i32);

impl FrameHandle {
    pub fn new(id: i32) -> Self {
        FrameHandle(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

/// Registration of a window resize listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

impl ListenerId {
    pub fn new(id: u32) -> Self {
        ListenerId(id)
    }
}

static NEXT_RESOURCE: AtomicU64 = AtomicU64::new(1);

/// Identity of a disposable graphical resource (geometry, material, texture).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub fn next() -> Self {
        ResourceId(NEXT_RESOURCE.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of a node in a scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(id: u64) -> Self {
        NodeId(id)
    }
}
