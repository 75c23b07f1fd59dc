//! Ember Core - Foundational types for the Ember particle engine
//!
//! This crate provides the core types that the other Ember crates depend on:
//! - `EmitterId`, `AreaModuleId` - Stable identifiers
//! - `Hsla`, `Bounds`, `SourceRect` - Color and spatial types
//! - `Curve`, `Curve2`, `Curve4` - Keyframed curves
//! - Scalar math helpers
//! - Error types, `ErrorPolicy` and Result alias

pub mod curve;
mod error;
mod id;
pub mod math;
mod types;

pub use curve::{Curve, Curve2, Curve4, CurveKey};
pub use error::{EmberError, ErrorPolicy, Result};
pub use glam::Vec2;
pub use id::{AreaModuleId, EmitterId};
pub use types::{Bounds, Hsla, SourceRect};
