//! Stable emitter and area module identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter shared by every id kind so ids never collide across engines
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_raw() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identifier of an emitter. Unique for the lifetime of the process.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmitterId(pub u64);

impl EmitterId {
    /// Create a new unique EmitterId
    pub fn new() -> Self {
        Self(next_raw())
    }

    /// Create an EmitterId from a raw value (for testing)
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EmitterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EmitterId({})", self.0)
    }
}

impl fmt::Display for EmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an area module.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaModuleId(pub u64);

impl AreaModuleId {
    pub fn new() -> Self {
        Self(next_raw())
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for AreaModuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AreaModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AreaModuleId({})", self.0)
    }
}

impl fmt::Display for AreaModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
