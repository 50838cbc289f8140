// Layered effect options: base defaults, then plugin defaults, then user overrides.
// Values are never mutated in place; every merge builds a new mapping.

use serde_json::{Map, Value};

use crate::error::EffectError;
use crate::types::Color;

pub const MIN_WIDTH: &str = "minWidth";
pub const MIN_HEIGHT: &str = "minHeight";
pub const SCALE: &str = "scale";
pub const SCALE_MOBILE: &str = "scaleMobile";
pub const SPEED: &str = "speed";
pub const FORCE_ANIMATE: &str = "forceAnimate";
pub const PIXELATED: &str = "pixelated";
pub const BACKGROUND_COLOR: &str = "backgroundColor";
pub const BACKGROUND_ALPHA: &str = "backgroundAlpha";

/// Option mapping for one effect instance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Options(Map<String, Value>);

impl Options {
    pub fn new() -> Self {
        Options(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Options(map)
    }

    /// Parse overrides from a JSON object string. Empty input means no overrides.
    pub fn from_json(json: &str) -> Result<Self, EffectError> {
        if json.trim().is_empty() {
            return Ok(Options::new());
        }
        match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => Ok(Options(map)),
            Value::Null => Ok(Options::new()),
            other => Err(EffectError::InvalidConfig(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    /// Builder-style insert, for assembling default tables.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// New mapping with `overrides` applied on top of `self`.
    pub fn merged(&self, overrides: &Options) -> Options {
        let mut map = self.0.clone();
        for (key, value) in &overrides.0 {
            map.insert(key.clone(), value.clone());
        }
        Options(map)
    }

    /// Merge layers in precedence order; later layers win.
    pub fn layered(layers: &[&Options]) -> Options {
        layers
            .iter()
            .fold(Options::new(), |acc, layer| acc.merged(layer))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64).filter(|v| v.is_finite())
    }

    /// Number that is present and non-zero.
    pub fn nonzero(&self, key: &str) -> Option<f64> {
        self.number(key).filter(|v| *v != 0.0)
    }

    pub fn number_or(&self, key: &str, fallback: f64) -> f64 {
        self.number(key).unwrap_or(fallback)
    }

    /// JS-style truthiness for boolean switches.
    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_)) | Some(Value::Object(_)) => true,
            Some(Value::Null) | None => false,
        }
    }

    pub fn color(&self, key: &str) -> Option<Color> {
        self.0.get(key).and_then(Color::from_value)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Options every effect starts from.
pub fn base_defaults() -> Options {
    Options::new()
        .with(MIN_HEIGHT, 200.0)
        .with(MIN_WIDTH, 200.0)
        .with(SCALE, 1.0)
        .with(SCALE_MOBILE, 1.0)
}

/// Merge base defaults, plugin defaults, and user overrides, then normalize.
pub fn resolve(plugin_defaults: &Options, overrides: &Options) -> Options {
    let merged = Options::layered(&[&base_defaults(), plugin_defaults, overrides]);
    if merged.number(BACKGROUND_ALPHA).is_none() {
        merged.with(BACKGROUND_ALPHA, 1.0)
    } else {
        merged
    }
}
