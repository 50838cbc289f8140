// Typed errors with thiserror. The lifecycle boundary logs these instead of surfacing them to the page.

use thiserror::Error;

/// Boxed cause carried by a failed plugin hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Effect error types.
#[derive(Error, Debug)]
pub enum EffectError {
    #[error("Cannot find element {0}")]
    MissingElement(String),

    #[error("Rendering engine provides no drawable surface")]
    MissingRenderingCapability,

    #[error("Init error: {0}")]
    InitializationFailure(#[source] HookError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Rendering backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EffectError {
    fn from(err: serde_json::Error) -> Self {
        EffectError::Serialization(err.to_string())
    }
}
