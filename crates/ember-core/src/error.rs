//! Error types for Ember

use thiserror::Error;

/// The main error type for Ember operations
#[derive(Debug, Error)]
pub enum EmberError {
    /// Setup was given an unusable configuration. Never recoverable.
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Particle engine has not been initialized. Call ParticleEngine::initialize() first.")]
    NotInitialized,

    /// Programmer error, raised regardless of the error policy.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A malformed emitter value. Subject to the configured `ErrorPolicy`.
    #[error("Invalid emitter value: {0}")]
    InvalidEmitterValue(String),

    #[error("Index out of range: {index} (active count {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Worker thread faulted: {0}")]
    WorkerFault(String),

    #[error("Emitter not found: {0}")]
    EmitterNotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

/// Result type alias for Ember operations
pub type Result<T> = std::result::Result<T, EmberError>;

impl From<toml::de::Error> for EmberError {
    fn from(err: toml::de::Error) -> Self {
        EmberError::TomlParseError(err.to_string())
    }
}

/// How value-validation failures on emitters are handled.
///
/// Only `InvalidEmitterValue` errors go through the policy; every other
/// error kind always propagates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Clamp to a safe value and continue.
    #[default]
    AutoCorrect,
    /// Surface the error to the caller.
    Throw,
}

impl ErrorPolicy {
    /// Apply the policy to a validated value.
    ///
    /// `Ok` values pass through. An `InvalidEmitterValue` error is replaced by
    /// `fallback()` under `AutoCorrect` and returned under `Throw`. Any other
    /// error is returned unchanged.
    pub fn resolve<T>(self, value: Result<T>, fallback: impl FnOnce() -> T) -> Result<T> {
        match value {
            Ok(v) => Ok(v),
            Err(EmberError::InvalidEmitterValue(msg)) => match self {
                ErrorPolicy::AutoCorrect => Ok(fallback()),
                ErrorPolicy::Throw => Err(EmberError::InvalidEmitterValue(msg)),
            },
            Err(other) => Err(other),
        }
    }
}
