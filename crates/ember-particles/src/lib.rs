//! Ember Particles - multi-threaded 2D particle simulation
//!
//! Provides fixed-capacity emitters driven by a [`ParticleEngine`] with:
//! - Id-stable slot buffers with swap-compaction on particle death
//! - Rate/curve emission scheduling with a fractional accumulator
//! - Pluggable per-particle modules (color, scale, speed, rotation, sprite sheets)
//! - Area modules that attract or repel the particles of every emitter they overlap
//! - Synchronous, rayon-task and fixed-worker-pool update modes
//! - POD instance packing for instanced draw calls

pub mod area;
pub mod config;
pub mod emitter;
pub mod engine;
pub mod filter;
pub mod module;
pub mod particle;
pub mod pool;
pub mod rand;
pub mod registry;
pub mod render;
pub mod scene;
pub mod scheduler;
pub mod settings;
pub mod shape;

pub use area::{AreaEffect, AreaModule, AreaModuleHandle, ForceMode, ForceModule};
pub use config::{
    ColorConfig, EmissionConfig, EmissionRate, EmitterConfig, LifeConfig, ScaleConfig,
    ScaleSource, SpeedConfig, TextureConfig, TextureMode,
};
pub use emitter::{BlendMode, Emitter, EmitterHandle, RenderKey, Space};
pub use engine::ParticleEngine;
pub use filter::EmitterFilter;
pub use module::{ModuleCore, ModuleKey, NativeBridge, ParticleModule};
pub use particle::{Particle, ParticleInstance};
pub use pool::{ParticleBufferPool, ParticleBuffers};
pub use registry::{EmitterContainer, EmitterRegistry, SearchFlags};
pub use render::{DrawBatch, EmitterObserver};
pub use scene::{AreaDesc, EmitterDesc, ModuleDesc, Scene, SceneDesc};
pub use settings::{AllocationMode, EngineSettings, UpdateMode};
pub use shape::{AreaShape, CircleDirection, EmissionShape};
