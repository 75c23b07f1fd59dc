//! Particle buffer pooling
//!
//! Emitters rent their particle and index buffers here and hand them back on
//! finalization. In pooled mode buffers are kept per capacity, bounded, and
//! reused by the next emitter of the same capacity.

use crate::particle::Particle;
use crate::settings::AllocationMode;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Buffers kept per capacity before returns are dropped
pub const DEFAULT_MAX_PER_CAPACITY: usize = 8;

/// Backing storage of one emitter
#[derive(Debug, Default)]
pub struct ParticleBuffers {
    pub particles: Vec<Particle>,
    pub new_indices: Vec<usize>,
}

impl ParticleBuffers {
    pub fn allocate(capacity: usize) -> Self {
        let mut buffers = Self {
            particles: Vec::with_capacity(capacity),
            new_indices: Vec::with_capacity(capacity),
        };
        buffers.reset(capacity);
        buffers
    }

    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    /// Inactive particles with ids `0..capacity`
    fn reset(&mut self, capacity: usize) {
        self.particles.clear();
        self.particles
            .extend((0..capacity).map(|id| Particle::with_id(id as u32)));
        self.new_indices.clear();
    }
}

#[derive(Debug, Default)]
pub struct PoolStatistics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub returns: AtomicU64,
    pub discards: AtomicU64,
}

impl PoolStatistics {
    /// Fraction of rents served from the pool
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
pub struct ParticleBufferPool {
    mode: AllocationMode,
    max_per_capacity: usize,
    free: Mutex<HashMap<usize, VecDeque<ParticleBuffers>>>,
    stats: PoolStatistics,
}

impl ParticleBufferPool {
    pub fn new(mode: AllocationMode) -> Self {
        Self::with_limit(mode, DEFAULT_MAX_PER_CAPACITY)
    }

    pub fn with_limit(mode: AllocationMode, max_per_capacity: usize) -> Self {
        Self {
            mode,
            max_per_capacity,
            free: Mutex::new(HashMap::new()),
            stats: PoolStatistics::default(),
        }
    }

    pub fn mode(&self) -> AllocationMode {
        self.mode
    }

    /// Buffers for an emitter of `capacity`, reset to inactive particles
    pub fn rent(&self, capacity: usize) -> ParticleBuffers {
        if self.mode == AllocationMode::Plain {
            return ParticleBuffers::allocate(capacity);
        }

        let reused = {
            let mut free = self.free.lock();
            free.get_mut(&capacity).and_then(|queue| queue.pop_front())
        };

        match reused {
            Some(mut buffers) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                buffers.reset(capacity);
                buffers
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                ParticleBuffers::allocate(capacity)
            }
        }
    }

    /// Return buffers. Dropped in plain mode or when the pool for that
    /// capacity is full.
    pub fn give_back(&self, buffers: ParticleBuffers) {
        if self.mode == AllocationMode::Plain {
            return;
        }
        self.stats.returns.fetch_add(1, Ordering::Relaxed);

        let capacity = buffers.capacity();
        let mut free = self.free.lock();
        let queue = free.entry(capacity).or_default();
        if queue.len() < self.max_per_capacity {
            queue.push_back(buffers);
        } else {
            self.stats.discards.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Buffers currently pooled for `capacity`
    pub fn pooled(&self, capacity: usize) -> usize {
        self.free.lock().get(&capacity).map_or(0, VecDeque::len)
    }

    pub fn statistics(&self) -> &PoolStatistics {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rented_buffers_have_sequential_ids() {
        let pool = ParticleBufferPool::new(AllocationMode::Pooled);
        let buffers = pool.rent(5);
        let ids: Vec<u32> = buffers.particles.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(buffers.new_indices.is_empty());
    }

    #[test]
    fn pooled_mode_reuses_and_resets() {
        let pool = ParticleBufferPool::new(AllocationMode::Pooled);
        let mut buffers = pool.rent(3);
        buffers.particles.swap(0, 2);
        buffers.particles[0].speed = 9.0;
        buffers.new_indices.push(1);
        pool.give_back(buffers);
        assert_eq!(pool.pooled(3), 1);

        let again = pool.rent(3);
        assert_eq!(pool.pooled(3), 0);
        assert_eq!(again.particles[0].id, 0);
        assert_eq!(again.particles[0].speed, 0.0);
        assert!(again.new_indices.is_empty());
        assert!(pool.statistics().hit_rate() > 0.0);
    }

    #[test]
    fn plain_mode_never_pools() {
        let pool = ParticleBufferPool::new(AllocationMode::Plain);
        pool.give_back(pool.rent(4));
        assert_eq!(pool.pooled(4), 0);
    }

    #[test]
    fn pool_is_bounded() {
        let pool = ParticleBufferPool::with_limit(AllocationMode::Pooled, 1);
        pool.give_back(ParticleBuffers::allocate(2));
        pool.give_back(ParticleBuffers::allocate(2));
        assert_eq!(pool.pooled(2), 1);
        assert_eq!(pool.statistics().discards.load(Ordering::Relaxed), 1);
    }
}
