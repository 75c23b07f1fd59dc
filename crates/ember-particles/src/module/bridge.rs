//! Mirror of module configuration for an external (native) execution path

use crate::module::ModuleKey;
use crate::particle::Particle;
use ember_core::{Curve, EmberError, Result};
use serde::{Deserialize, Serialize};

/// Transition parameters in a form an external implementation can rebuild.
///
/// Vectors hold one value per animated channel (1 for scalars, 4 for HSLA).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionDesc {
    Constant { value: Vec<f32> },
    Lerp { start: Vec<f32>, end: Vec<f32> },
    Curve { curves: Vec<Curve> },
    RandomConstant { min: Vec<f32>, max: Vec<f32> },
    RandomLerp { min: Vec<f32>, max: Vec<f32> },
    RandomCurve { curves: Vec<Curve> },
}

/// Sprite sheet playback mode as seen by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnimationDesc {
    OverLifetime,
    Looping { fps: f32 },
}

/// Full configuration of one module, sent on every setter call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    Transition {
        module: String,
        transition: TransitionDesc,
        absolute: bool,
    },
    SpriteSheet {
        columns: u32,
        rows: u32,
        animation: AnimationDesc,
    },
}

impl BridgeMessage {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| EmberError::ParseError(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EmberError::ParseError(e.to_string()))
    }
}

/// External executor for delegated modules.
///
/// `configure` is called whenever the module's configuration changes, whether
/// or not the module is delegated. The other two run in place of the module's
/// own logic while it is delegated.
pub trait NativeBridge: Send + Sync {
    fn configure(&self, module: ModuleKey, message: &BridgeMessage);

    fn on_particles_activated(&self, module: ModuleKey, indices: &[usize], particles: &[Particle]);

    fn on_update(&self, module: ModuleKey, dt: f32, particles: &mut [Particle]);
}
