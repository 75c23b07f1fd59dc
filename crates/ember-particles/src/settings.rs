//! Engine configuration

use ember_core::{ErrorPolicy, Result};
use serde::{Deserialize, Serialize};

pub const MIN_EMISSION_TIME_STEP: f32 = 0.0001;
pub const MAX_EMISSION_TIME_STEP: f32 = 1.0;

/// Where emitter particle buffers come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Fresh allocation per emitter, freed on finalization
    Plain,
    /// Recycled through the engine's buffer pool
    #[default]
    Pooled,
}

/// How `ParticleEngine::update` schedules the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Everything inline on the caller
    Synchronous,
    /// Dispatched to workers; call `wait_for_threads` before reading results
    #[default]
    ParallelAsync,
    /// Dispatched to workers and joined before `update` returns
    ParallelSync,
}

impl UpdateMode {
    pub fn is_parallel(self) -> bool {
        !matches!(self, UpdateMode::Synchronous)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub allocation_mode: AllocationMode,
    pub error_policy: ErrorPolicy,
    pub update_mode: UpdateMode,
    /// Largest `dt` fed to emission scheduling in one update
    pub max_emission_time_step: f32,
    /// Use the fixed worker pool instead of rayon tasks for parallel modes
    pub use_thread_pool: bool,
    /// Worker pool size, 0 = available cores
    pub worker_threads: usize,
}

impl EngineSettings {
    /// Parse an `[engine]` table body
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut settings: Self = toml::from_str(s)?;
        settings.max_emission_time_step = clamp_emission_step(settings.max_emission_time_step);
        Ok(settings)
    }

    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            allocation_mode: AllocationMode::Pooled,
            error_policy: ErrorPolicy::AutoCorrect,
            update_mode: UpdateMode::ParallelAsync,
            max_emission_time_step: 0.1,
            use_thread_pool: false,
            worker_threads: 0,
        }
    }
}

pub fn clamp_emission_step(value: f32) -> f32 {
    if value.is_nan() {
        return MAX_EMISSION_TIME_STEP;
    }
    value.clamp(MIN_EMISSION_TIME_STEP, MAX_EMISSION_TIME_STEP)
}
