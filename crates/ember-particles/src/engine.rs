//! The particle engine: emitter registry, frame scheduling, area-module
//! linking and deferred destruction

use crate::area::AreaModuleHandle;
use crate::config::checked_capacity;
use crate::emitter::{BlendMode, Emitter, EmitterHandle, RenderKey, DEFAULT_BOUNDS_SIZE};
use crate::filter::EmitterFilter;
use crate::pool::{ParticleBufferPool, ParticleBuffers, PoolStatistics};
use crate::registry::{EmitterContainer, EmitterRegistry, SearchFlags};
use crate::render::DrawBatch;
use crate::scene::EmitterDesc;
use crate::scheduler::{link_area_modules, spawn_frame, FaultCell, FrameWork, WorkerPool};
use crate::settings::{clamp_emission_step, AllocationMode, EngineSettings, UpdateMode};
use crate::shape::EmissionShape;
use crossbeam::channel::Receiver;
use ember_core::{AreaModuleId, Bounds, EmberError, EmitterId, ErrorPolicy, Result, Vec2};
use log::{debug, info};

/// Explicit engine context. Several engines may coexist; each owns its
/// emitters, area modules, buffer pool and workers.
///
/// ```ignore
/// let mut engine = ParticleEngine::new(EngineSettings::default());
/// engine.initialize()?;
/// let sparks = engine.create_emitter(512, EmissionShape::circle(8.0))?;
/// sparks.lock().play();
/// loop {
///     engine.update(dt, &[camera_bounds])?;
///     engine.wait_for_threads()?;
///     renderer.draw(&engine.draw_batches());
/// }
/// ```
pub struct ParticleEngine {
    settings: EngineSettings,
    initialized: bool,
    pool: Option<ParticleBufferPool>,
    registry: EmitterRegistry,
    emitters: Vec<EmitterHandle>,
    visible: Vec<EmitterHandle>,
    area_modules: Vec<AreaModuleHandle>,
    pending_destroy: Vec<(EmitterHandle, f32)>,
    workers: Option<WorkerPool>,
    frame: Option<Receiver<()>>,
    faults: FaultCell,
}

impl ParticleEngine {
    pub fn new(mut settings: EngineSettings) -> Self {
        settings.max_emission_time_step = clamp_emission_step(settings.max_emission_time_step);
        Self {
            settings,
            initialized: false,
            pool: None,
            registry: EmitterRegistry::new(),
            emitters: Vec::new(),
            visible: Vec::new(),
            area_modules: Vec::new(),
            pending_destroy: Vec::new(),
            workers: None,
            frame: None,
            faults: FaultCell::default(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(EmberError::NotInitialized)
        }
    }

    fn ensure_not_initialized(&self, what: &str) -> Result<()> {
        if self.initialized {
            Err(EmberError::InvalidOperation(format!(
                "{what} cannot be changed after initialization"
            )))
        } else {
            Ok(())
        }
    }

    // ── Settings ──

    pub fn set_allocation_mode(&mut self, mode: AllocationMode) -> Result<()> {
        self.ensure_not_initialized("allocation mode")?;
        self.settings.allocation_mode = mode;
        Ok(())
    }

    pub fn set_error_policy(&mut self, policy: ErrorPolicy) -> Result<()> {
        self.ensure_not_initialized("error policy")?;
        self.settings.error_policy = policy;
        Ok(())
    }

    pub fn set_use_thread_pool(&mut self, use_thread_pool: bool) -> Result<()> {
        self.ensure_not_initialized("thread pool usage")?;
        self.settings.use_thread_pool = use_thread_pool;
        Ok(())
    }

    /// Takes effect on the next `update`
    pub fn set_update_mode(&mut self, mode: UpdateMode) {
        self.settings.update_mode = mode;
    }

    /// Clamped to `[MIN_EMISSION_TIME_STEP, MAX_EMISSION_TIME_STEP]`
    pub fn set_max_emission_time_step(&mut self, step: f32) {
        self.settings.max_emission_time_step = clamp_emission_step(step);
    }

    // ── Lifecycle ──

    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(EmberError::Initialization(
                "particle engine is already initialized".into(),
            ));
        }
        if self.settings.use_thread_pool {
            let threads = self.settings.resolved_worker_threads();
            self.workers = Some(WorkerPool::new(threads, self.faults.clone())?);
        }
        self.pool = Some(ParticleBufferPool::new(self.settings.allocation_mode));
        self.initialized = true;
        info!(
            "particle engine initialized ({:?}, {:?})",
            self.settings.update_mode, self.settings.allocation_mode
        );
        Ok(())
    }

    /// Join outstanding work, finalize every emitter and stop the workers.
    ///
    /// A fault from the last frame is still returned after teardown.
    pub fn shutdown(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        let joined = self.wait_for_threads();

        for handle in self.emitters.clone() {
            self.finalize_emitter(&handle);
        }
        for area in self.area_modules.drain(..) {
            area.take_coverage();
        }
        self.pending_destroy.clear();
        self.visible.clear();
        self.registry.clear();
        self.workers = None;
        self.pool = None;
        self.initialized = false;
        info!("particle engine shut down");
        joined
    }

    /// Advance one frame.
    ///
    /// Joins the previous frame, runs destruction maintenance, culls against
    /// `views` (empty means everything enabled is visible) and updates the
    /// visible emitters according to the update mode.
    pub fn update(&mut self, dt: f32, views: &[Bounds]) -> Result<()> {
        self.ensure_initialized()?;
        self.wait_for_threads()?;

        self.process_pending_destroy(dt);
        self.cull(views);
        if self.visible.is_empty() {
            return Ok(());
        }

        let step = self.settings.max_emission_time_step;
        match self.settings.update_mode {
            UpdateMode::Synchronous => {
                self.link_area_modules();
                for handle in &self.visible {
                    handle.lock().update(dt, step);
                }
            }
            UpdateMode::ParallelAsync => self.dispatch(dt, step),
            UpdateMode::ParallelSync => {
                self.dispatch(dt, step);
                self.wait_for_threads()?;
            }
        }
        Ok(())
    }

    /// Block until the last dispatched frame is done. Returns the first
    /// worker fault captured since the previous join.
    pub fn wait_for_threads(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.join_frame();
        match self.faults.take() {
            Some(message) => Err(EmberError::WorkerFault(message)),
            None => Ok(()),
        }
    }

    /// Wait for in-flight work. Faults stay queued for `wait_for_threads`.
    fn join_frame(&mut self) {
        if let Some(done) = self.frame.take() {
            // A disconnected channel also means the task has finished
            let _ = done.recv();
        }
        if let Some(workers) = &self.workers {
            workers.join();
        }
    }

    fn dispatch(&mut self, dt: f32, max_emission_step: f32) {
        match &self.workers {
            Some(workers) => {
                link_area_modules(&self.area_modules, &self.emitters);
                workers.dispatch(&self.visible, dt, max_emission_step);
            }
            None => {
                let work = FrameWork {
                    areas: self.area_modules.clone(),
                    emitters: self.emitters.clone(),
                    visible: self.visible.clone(),
                    dt,
                    max_emission_step,
                };
                self.frame = Some(spawn_frame(work, self.faults.clone()));
            }
        }
    }

    fn cull(&mut self, views: &[Bounds]) {
        self.visible.clear();
        for handle in &self.emitters {
            let mut emitter = handle.lock();
            let bounds = emitter.bounds();
            let visible = emitter.is_enabled()
                && (views.is_empty() || views.iter().any(|view| view.intersects(&bounds)));
            if !visible {
                emitter.clear();
            }
            emitter.set_visible(visible);
            if visible {
                self.visible.push(handle.clone());
            }
        }
    }

    /// Run the area-module link pass on the caller
    pub fn link_area_modules(&self) {
        link_area_modules(&self.area_modules, &self.emitters);
    }

    // ── Queries ──

    /// Live particles over every registered emitter
    pub fn particle_count(&self) -> usize {
        self.emitters.iter().map(|h| h.lock().num_active()).sum()
    }

    /// Registered emitters that are enabled
    pub fn emitter_count(&self) -> usize {
        self.emitters.iter().filter(|h| h.lock().is_enabled()).count()
    }

    pub fn emitters(&self) -> &[EmitterHandle] {
        &self.emitters
    }

    /// Emitters that passed culling in the last update
    pub fn visible_emitters(&self) -> &[EmitterHandle] {
        &self.visible
    }

    pub fn emitter(&self, id: EmitterId) -> Option<&EmitterHandle> {
        self.emitters.iter().find(|h| h.id() == id)
    }

    pub fn emitters_by_key(&self, key: RenderKey, flags: SearchFlags) -> Vec<EmitterHandle> {
        self.registry.by_key(key, flags)
    }

    pub fn emitters_by_layer(&self, layer: u8, flags: SearchFlags) -> Vec<EmitterHandle> {
        self.registry.by_layer(layer, flags)
    }

    pub fn emitters_by_blend_mode(&self, mode: BlendMode, flags: SearchFlags) -> Vec<EmitterHandle> {
        self.registry.by_blend_mode(mode, flags)
    }

    pub fn container(&self, key: RenderKey) -> Option<&EmitterContainer> {
        self.registry.container(key)
    }

    pub fn containers(&self) -> impl Iterator<Item = &EmitterContainer> {
        self.registry.containers()
    }

    pub fn filter(&self) -> EmitterFilter {
        EmitterFilter::new(self.emitters.clone())
    }

    /// Instances of the visible emitters, one batch per render key in draw
    /// order. In `ParallelAsync` mode call `wait_for_threads` first.
    pub fn draw_batches(&self) -> Vec<DrawBatch> {
        self.registry
            .containers()
            .filter_map(|container| {
                let mut batch = DrawBatch::new(container.key());
                for handle in container.emitters() {
                    batch.push_emitter(handle);
                }
                (!batch.is_empty()).then_some(batch)
            })
            .collect()
    }

    pub fn pool_statistics(&self) -> Option<&PoolStatistics> {
        self.pool.as_ref().map(ParticleBufferPool::statistics)
    }

    /// Worker threads still running, 0 when not using the pool
    pub fn live_workers(&self) -> usize {
        self.workers.as_ref().map_or(0, WorkerPool::live_workers)
    }

    // ── Emitters ──

    pub fn create_emitter(&mut self, capacity: usize, shape: EmissionShape) -> Result<EmitterHandle> {
        self.create_emitter_with_bounds(capacity, shape, DEFAULT_BOUNDS_SIZE)
    }

    pub fn create_emitter_with_bounds(
        &mut self,
        capacity: usize,
        shape: EmissionShape,
        bounds_size: Vec2,
    ) -> Result<EmitterHandle> {
        let mut emitter = self.new_emitter(capacity, shape)?;
        emitter.set_bounds_size(bounds_size)?;
        Ok(self.register(emitter))
    }

    /// Build and register an emitter from a scene description
    pub fn spawn(&mut self, desc: &EmitterDesc) -> Result<EmitterHandle> {
        let mut emitter = self.new_emitter(desc.capacity, desc.shape.clone())?;
        desc.apply(&mut emitter)?;
        Ok(self.register(emitter))
    }

    /// Register a deep copy of `source`: same configuration and modules,
    /// no particles.
    pub fn duplicate_emitter(&mut self, source: &EmitterHandle) -> Result<EmitterHandle> {
        self.ensure_initialized()?;
        self.ensure_registered(source)?;
        let copy = {
            let emitter = source.lock();
            let buffers = self.rent(emitter.capacity())?;
            emitter.deep_copy_into(buffers)
        };
        Ok(self.register(copy))
    }

    fn new_emitter(&self, capacity: usize, shape: EmissionShape) -> Result<Emitter> {
        self.ensure_initialized()?;
        let buffers = self.rent(capacity)?;
        let mut emitter = Emitter::from_buffers(buffers, shape);
        emitter.set_error_policy(self.settings.error_policy);
        Ok(emitter)
    }

    fn rent(&self, capacity: usize) -> Result<ParticleBuffers> {
        if capacity == 0 {
            return Err(EmberError::InvalidOperation(
                "emitter capacity must be at least 1".into(),
            ));
        }
        let capacity = checked_capacity(capacity, self.settings.error_policy)?;
        let pool = self.pool.as_ref().ok_or(EmberError::NotInitialized)?;
        Ok(pool.rent(capacity))
    }

    fn register(&mut self, emitter: Emitter) -> EmitterHandle {
        let key = emitter.render_key();
        let handle = EmitterHandle::new(emitter);
        self.registry.insert(key, handle.clone());
        self.emitters.push(handle.clone());
        debug!("emitter {} registered under {:?}", handle.id(), key);
        handle
    }

    fn ensure_registered(&self, handle: &EmitterHandle) -> Result<()> {
        if self.emitters.iter().any(|h| h.id() == handle.id()) {
            Ok(())
        } else {
            Err(EmberError::EmitterNotFound(handle.id().to_string()))
        }
    }

    /// Move an emitter to another `(layer, blend mode)` bucket
    pub fn set_render_key(&mut self, handle: &EmitterHandle, key: RenderKey) -> Result<()> {
        self.ensure_registered(handle)?;
        let mut emitter = handle.lock();
        let old = emitter.render_key();
        if !self.registry.rekey(old, key, handle.id()) {
            return Err(EmberError::EmitterNotFound(handle.id().to_string()));
        }
        emitter.set_render_key(key);
        Ok(())
    }

    pub fn set_layer(&mut self, handle: &EmitterHandle, layer: u8) -> Result<()> {
        let blend_mode = handle.lock().blend_mode();
        self.set_render_key(handle, RenderKey::new(layer, blend_mode))
    }

    pub fn set_blend_mode(&mut self, handle: &EmitterHandle, blend_mode: BlendMode) -> Result<()> {
        let layer = handle.lock().layer();
        self.set_render_key(handle, RenderKey::new(layer, blend_mode))
    }

    /// Destroy on the next update
    pub fn dispose_emitter(&mut self, handle: &EmitterHandle) -> Result<()> {
        self.dispose_emitter_after(handle, Some(-1.0))
    }

    /// Stop emission and destroy once `time` seconds have passed. Without a
    /// time the emitter lives as long as its longest possible particle.
    pub fn dispose_emitter_after(&mut self, handle: &EmitterHandle, time: Option<f32>) -> Result<()> {
        self.ensure_registered(handle)?;
        let ttl = {
            let mut emitter = handle.lock();
            emitter.stop();
            time.unwrap_or_else(|| emitter.config().life.max_life())
        };

        match self
            .pending_destroy
            .iter_mut()
            .find(|(pending, _)| pending.id() == handle.id())
        {
            Some((_, existing)) => *existing = ttl,
            None => self.pending_destroy.push((handle.clone(), ttl)),
        }
        debug!("emitter {} queued for destruction in {ttl}s", handle.id());
        Ok(())
    }

    /// Finalize right away
    pub fn destroy_emitter_now(&mut self, handle: &EmitterHandle) -> Result<()> {
        self.ensure_registered(handle)?;
        self.finalize_emitter(handle);
        Ok(())
    }

    /// Emitters waiting for deferred destruction, with their remaining time
    pub fn pending_destruction(&self) -> impl Iterator<Item = (&EmitterHandle, f32)> {
        self.pending_destroy.iter().map(|(h, ttl)| (h, *ttl))
    }

    fn process_pending_destroy(&mut self, dt: f32) {
        let mut expired = Vec::new();
        self.pending_destroy.retain_mut(|(handle, ttl)| {
            *ttl -= dt;
            if *ttl <= 0.0 {
                expired.push(handle.clone());
                false
            } else {
                true
            }
        });
        for handle in expired {
            self.finalize_emitter(&handle);
        }
    }

    /// Unlink from area modules, leave every index and return the buffers
    fn finalize_emitter(&mut self, handle: &EmitterHandle) {
        let id = handle.id();
        let (key, buffers) = {
            let mut emitter = handle.lock();
            for area in emitter.take_area_modules() {
                area.remove_coverage(id);
            }
            (emitter.render_key(), emitter.finalize())
        };
        for area in &self.area_modules {
            area.remove_coverage(id);
        }

        self.registry.remove(key, id);
        self.emitters.retain(|h| h.id() != id);
        self.visible.retain(|h| h.id() != id);
        self.pending_destroy.retain(|(h, _)| h.id() != id);
        if let Some(pool) = &self.pool {
            pool.give_back(buffers);
        }
        debug!("emitter {id} finalized");
    }

    // ── Area modules ──

    /// Register an area module. Emitters it already covers are linked back
    /// right away; the rest follow on the next link pass.
    pub fn add_area_module(&mut self, area: AreaModuleHandle) -> Result<()> {
        self.join_frame();
        if self.area_modules.iter().any(|a| a.id() == area.id()) {
            return Err(EmberError::InvalidOperation(format!(
                "area module {} is already registered",
                area.id()
            )));
        }
        for emitter_id in area.coverage() {
            match self.emitters.iter().find(|h| h.id() == emitter_id) {
                Some(handle) => {
                    handle.lock().link_area(&area);
                }
                None => {
                    area.remove_coverage(emitter_id);
                }
            }
        }
        debug!("area module {} ({}) added", area.id(), area.effect().name());
        self.area_modules.push(area);
        Ok(())
    }

    /// Unregister an area module and unlink it from every emitter it covers.
    ///
    /// An in-flight frame is joined first so its link pass cannot relink
    /// the area afterwards.
    pub fn remove_area_module(&mut self, id: AreaModuleId) -> Option<AreaModuleHandle> {
        self.join_frame();
        let index = self.area_modules.iter().position(|a| a.id() == id)?;
        let area = self.area_modules.remove(index);
        for emitter_id in area.take_coverage() {
            if let Some(handle) = self.emitters.iter().find(|h| h.id() == emitter_id) {
                handle.lock().unlink_area(id);
            }
        }
        debug!("area module {id} removed");
        Some(area)
    }

    pub fn area_modules(&self) -> &[AreaModuleHandle] {
        &self.area_modules
    }
}

impl Drop for ParticleEngine {
    fn drop(&mut self) {
        self.join_frame();
    }
}

impl Default for ParticleEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl std::fmt::Debug for ParticleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleEngine")
            .field("initialized", &self.initialized)
            .field("update_mode", &self.settings.update_mode)
            .field("emitters", &self.emitters.len())
            .field("area_modules", &self.area_modules.len())
            .field("pending_destroy", &self.pending_destroy.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::{AreaModule, ForceModule};
    use crate::shape::AreaShape;
    use std::sync::Arc;

    fn engine(mode: UpdateMode) -> ParticleEngine {
        let mut engine = ParticleEngine::new(EngineSettings {
            update_mode: mode,
            max_emission_time_step: 1.0,
            ..EngineSettings::default()
        });
        engine.initialize().unwrap();
        engine
    }

    #[test]
    fn operations_require_initialization() {
        let mut engine = ParticleEngine::default();
        assert!(matches!(engine.update(0.1, &[]), Err(EmberError::NotInitialized)));
        assert!(matches!(engine.wait_for_threads(), Err(EmberError::NotInitialized)));
        assert!(matches!(
            engine.create_emitter(4, EmissionShape::Point),
            Err(EmberError::NotInitialized)
        ));
    }

    #[test]
    fn settings_locked_after_initialize() {
        let mut engine = ParticleEngine::default();
        engine.set_allocation_mode(AllocationMode::Plain).unwrap();
        engine.initialize().unwrap();
        assert!(matches!(
            engine.set_allocation_mode(AllocationMode::Pooled),
            Err(EmberError::InvalidOperation(_))
        ));
        assert!(engine.set_error_policy(ErrorPolicy::Throw).is_err());
        engine.set_update_mode(UpdateMode::Synchronous);
        engine.set_max_emission_time_step(50.0);
        assert_eq!(engine.settings().max_emission_time_step, 1.0);
        assert!(matches!(engine.initialize(), Err(EmberError::Initialization(_))));
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut engine = engine(UpdateMode::Synchronous);
        assert!(matches!(
            engine.create_emitter(0, EmissionShape::Point),
            Err(EmberError::InvalidOperation(_))
        ));
    }

    #[test]
    fn cull_clears_emitters_outside_views() {
        let mut engine = engine(UpdateMode::Synchronous);
        let inside = engine
            .create_emitter_with_bounds(8, EmissionShape::Point, Vec2::splat(10.0))
            .unwrap();
        let outside = engine
            .create_emitter_with_bounds(8, EmissionShape::Point, Vec2::splat(10.0))
            .unwrap();
        outside.lock().set_position(Vec2::new(1000.0, 0.0));
        inside.lock().emit(3);
        outside.lock().emit(3);

        let view = Bounds::from_center(Vec2::ZERO, Vec2::splat(100.0));
        engine.update(0.1, &[view]).unwrap();

        assert_eq!(engine.visible_emitters().len(), 1);
        assert!(inside.lock().is_visible());
        assert!(!outside.lock().is_visible());
        assert_eq!(outside.lock().num_active(), 0);
        assert_eq!(inside.lock().num_active(), 3);
        assert_eq!(engine.particle_count(), 3);
    }

    #[test]
    fn disabled_emitters_are_never_visible() {
        let mut engine = engine(UpdateMode::Synchronous);
        let e = engine.create_emitter(4, EmissionShape::Point).unwrap();
        e.lock().set_enabled(false);
        engine.update(0.1, &[]).unwrap();
        assert!(engine.visible_emitters().is_empty());
        assert_eq!(engine.emitter_count(), 0);
        assert_eq!(engine.emitters().len(), 1);
    }

    #[test]
    fn rekey_moves_between_containers() {
        let mut engine = engine(UpdateMode::Synchronous);
        let e = engine.create_emitter(4, EmissionShape::Point).unwrap();
        engine.set_layer(&e, 3).unwrap();
        engine.set_blend_mode(&e, BlendMode::Additive).unwrap();
        let key = RenderKey::new(3, BlendMode::Additive);
        assert_eq!(e.lock().render_key(), key);
        assert_eq!(engine.emitters_by_key(key, SearchFlags::empty()), vec![e.clone()]);
        assert_eq!(engine.containers().count(), 1);
        assert_eq!(engine.emitters_by_layer(3, SearchFlags::empty()).len(), 1);
        assert_eq!(
            engine
                .emitters_by_blend_mode(BlendMode::Alpha, SearchFlags::empty())
                .len(),
            0
        );
    }

    #[test]
    fn unknown_emitter_rejected() {
        let mut engine = engine(UpdateMode::Synchronous);
        let stray = EmitterHandle::new(Emitter::new(2, EmissionShape::Point));
        assert!(matches!(
            engine.dispose_emitter(&stray),
            Err(EmberError::EmitterNotFound(_))
        ));
        assert!(engine.set_layer(&stray, 1).is_err());
    }

    #[test]
    fn destroy_now_returns_buffers_to_pool() {
        let mut engine = engine(UpdateMode::Synchronous);
        let e = engine.create_emitter(16, EmissionShape::Point).unwrap();
        engine.destroy_emitter_now(&e).unwrap();
        assert!(e.lock().is_disposed());
        assert!(engine.emitters().is_empty());
        assert!(engine.containers().next().is_none());

        let again = engine.create_emitter(16, EmissionShape::Point).unwrap();
        assert_eq!(again.lock().capacity(), 16);
        let stats = engine.pool_statistics().unwrap();
        assert!(stats.hit_rate() > 0.0);
    }

    #[test]
    fn dispose_finalizes_on_next_update() {
        let mut engine = engine(UpdateMode::Synchronous);
        let e = engine.create_emitter(4, EmissionShape::Point).unwrap();
        engine.dispose_emitter(&e).unwrap();
        assert_eq!(engine.pending_destruction().count(), 1);
        engine.update(0.0, &[]).unwrap();
        assert!(e.lock().is_disposed());
        assert_eq!(engine.pending_destruction().count(), 0);
    }

    #[test]
    fn area_module_add_and_remove() {
        let mut engine = engine(UpdateMode::Synchronous);
        let e = engine
            .create_emitter_with_bounds(4, EmissionShape::Point, Vec2::splat(10.0))
            .unwrap();
        let area = AreaModule::force(
            AreaShape::Circle { radius: 50.0 },
            Vec2::ZERO,
            ForceModule::default(),
        );
        engine.add_area_module(Arc::clone(&area)).unwrap();
        assert!(engine.add_area_module(Arc::clone(&area)).is_err());

        engine.update(0.1, &[]).unwrap();
        assert!(e.lock().influenced_by(area.id()));
        assert!(area.covers(e.id()));

        let removed = engine.remove_area_module(area.id()).unwrap();
        assert_eq!(removed.id(), area.id());
        assert!(!e.lock().influenced_by(area.id()));
        assert!(!area.covers(e.id()));
        assert!(engine.remove_area_module(area.id()).is_none());
    }

    #[test]
    fn re_adding_area_relinks_covered_emitters() {
        let mut engine = engine(UpdateMode::Synchronous);
        let e = engine.create_emitter(4, EmissionShape::Point).unwrap();
        let area = AreaModule::force(AreaShape::Point, Vec2::ZERO, ForceModule::default());
        area.add_coverage(e.id());
        engine.add_area_module(Arc::clone(&area)).unwrap();
        assert!(e.lock().influenced_by(area.id()));
    }

    #[test]
    fn draw_batches_group_by_key() {
        let mut engine = engine(UpdateMode::Synchronous);
        let a = engine.create_emitter(4, EmissionShape::Point).unwrap();
        let b = engine.create_emitter(4, EmissionShape::Point).unwrap();
        engine.set_layer(&b, 2).unwrap();
        for h in [&a, &b] {
            let mut e = h.lock();
            e.config_mut().life.set_normal(5.0);
            e.emit(2);
        }
        engine.update(0.1, &[]).unwrap();
        let batches = engine.draw_batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].key.layer, 0);
        assert_eq!(batches[1].key.layer, 2);
        assert_eq!(batches[1].instances.len(), 2);
    }

    #[test]
    fn shutdown_finalizes_everything() {
        let mut engine = engine(UpdateMode::ParallelAsync);
        let e = engine.create_emitter(4, EmissionShape::Point).unwrap();
        engine.update(0.1, &[]).unwrap();
        engine.shutdown().unwrap();
        assert!(!engine.is_initialized());
        assert!(e.lock().is_disposed());
        assert!(engine.emitters().is_empty());
    }
}
