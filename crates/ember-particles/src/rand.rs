//! Lightweight xorshift32 PRNG, one per emitter

use ember_core::Vec2;
use std::sync::atomic::{AtomicU32, Ordering};

/// Seeds handed to emitters that don't ask for a specific one
static SEED_COUNTER: AtomicU32 = AtomicU32::new(0x9E37_79B9);

#[derive(Debug, Clone)]
pub struct ParticleRng {
    state: u32,
}

impl ParticleRng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Fresh generator with a process-unique seed
    pub fn from_counter() -> Self {
        let seed = SEED_COUNTER.fetch_add(0x6D2B_79F5, Ordering::Relaxed);
        Self::new(seed)
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Returns a float in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        // 24 high bits keep the result strictly below 1.0
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Returns a float in [min, max)
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Random angle in radians, [0, TAU)
    pub fn angle(&mut self) -> f32 {
        self.range(0.0, std::f32::consts::TAU)
    }

    /// Uniformly distributed unit vector
    pub fn unit_vector(&mut self) -> Vec2 {
        Vec2::from_angle(self.angle())
    }
}

impl Default for ParticleRng {
    fn default() -> Self {
        Self::from_counter()
    }
}
