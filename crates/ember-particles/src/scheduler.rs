//! Frame scheduling: the area-module link pass, rayon frame tasks and the
//! fixed worker pool

use crate::area::AreaModuleHandle;
use crate::emitter::EmitterHandle;
use crossbeam::channel::{bounded, Receiver};
use ember_core::{EmberError, Result};
use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

// ── Link pass ──

/// Bring `area` and every emitter into agreement: linked on both sides when
/// the emitter bounds intersect the area, unlinked on both sides otherwise.
///
/// Lock order is emitter, then coverage.
pub fn link_area(area: &AreaModuleHandle, emitters: &[EmitterHandle]) {
    for handle in emitters {
        let mut emitter = handle.lock();
        if emitter.is_disposed() {
            continue;
        }
        if area.intersects_bounds(&emitter.bounds()) {
            if emitter.link_area(area) {
                debug!("area module {} linked to emitter {}", area.id(), emitter.id());
            }
            area.add_coverage(emitter.id());
        } else {
            emitter.unlink_area(area.id());
            area.remove_coverage(emitter.id());
        }
    }
}

pub fn link_area_modules(areas: &[AreaModuleHandle], emitters: &[EmitterHandle]) {
    for area in areas {
        link_area(area, emitters);
    }
}

// ── Faults ──

/// First worker fault of a frame, re-raised on the next join
#[derive(Debug, Clone, Default)]
pub(crate) struct FaultCell(Arc<Mutex<Option<String>>>);

impl FaultCell {
    pub(crate) fn record(&self, message: String) {
        error!("worker fault: {message}");
        let mut slot = self.0.lock();
        if slot.is_none() {
            *slot = Some(message);
        }
    }

    pub(crate) fn take(&self) -> Option<String> {
        self.0.lock().take()
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

fn update_all(emitters: &[EmitterHandle], dt: f32, max_emission_step: f32) {
    for handle in emitters {
        handle.lock().update(dt, max_emission_step);
    }
}

// ── Rayon frame task ──

/// Work for one parallel frame: the link pass fanned out over area modules,
/// then the visible emitters fanned out over the rayon pool.
pub(crate) struct FrameWork {
    pub areas: Vec<AreaModuleHandle>,
    pub emitters: Vec<EmitterHandle>,
    pub visible: Vec<EmitterHandle>,
    pub dt: f32,
    pub max_emission_step: f32,
}

/// Run `work` in the background. The receiver yields once it is finished,
/// whether or not it faulted.
pub(crate) fn spawn_frame(work: FrameWork, faults: FaultCell) -> Receiver<()> {
    let (done_tx, done_rx) = bounded(1);
    rayon::spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(|| {
            work.areas
                .par_iter()
                .for_each(|area| link_area(area, &work.emitters));
            work.visible
                .par_iter()
                .for_each(|h| h.lock().update(work.dt, work.max_emission_step));
        }));
        if let Err(payload) = result {
            faults.record(panic_message(payload));
        }
        let _ = done_tx.send(());
    });
    done_rx
}

// ── Worker pool ──

#[derive(Default)]
struct SlotState {
    batch: Vec<EmitterHandle>,
    dt: f32,
    max_emission_step: f32,
    pending: bool,
    busy: bool,
    alive: bool,
    shutdown: bool,
}

struct WorkerSlot {
    state: Mutex<SlotState>,
    signal: Condvar,
}

/// Fixed set of pre-spawned threads. Each frame the visible emitters are
/// dealt round-robin to the live workers, which are woken through their
/// condvar. A worker that panics records the fault and exits.
pub struct WorkerPool {
    slots: Vec<Arc<WorkerSlot>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn new(threads: usize, faults: FaultCell) -> Result<Self> {
        let threads = threads.max(1);
        let mut slots = Vec::with_capacity(threads);
        let mut handles = Vec::with_capacity(threads);

        for index in 0..threads {
            let slot = Arc::new(WorkerSlot {
                state: Mutex::new(SlotState {
                    alive: true,
                    ..SlotState::default()
                }),
                signal: Condvar::new(),
            });
            let worker_slot = Arc::clone(&slot);
            let worker_faults = faults.clone();
            let handle = std::thread::Builder::new()
                .name(format!("ember-worker-{index}"))
                .spawn(move || worker_loop(&worker_slot, &worker_faults))
                .map_err(|e| EmberError::Initialization(format!("failed to spawn worker {index}: {e}")))?;
            slots.push(slot);
            handles.push(handle);
        }

        debug!("worker pool started with {threads} threads");
        Ok(Self { slots, handles })
    }

    pub fn threads(&self) -> usize {
        self.slots.len()
    }

    pub fn live_workers(&self) -> usize {
        self.slots.iter().filter(|s| s.state.lock().alive).count()
    }

    /// Hand out `emitters` round-robin. With no live worker left the batch
    /// runs on the caller.
    pub(crate) fn dispatch(&self, emitters: &[EmitterHandle], dt: f32, max_emission_step: f32) {
        let live: Vec<&Arc<WorkerSlot>> = self
            .slots
            .iter()
            .filter(|s| s.state.lock().alive)
            .collect();
        if live.is_empty() {
            warn!("no live workers, updating {} emitters inline", emitters.len());
            update_all(emitters, dt, max_emission_step);
            return;
        }

        let mut batches: Vec<Vec<EmitterHandle>> = vec![Vec::new(); live.len()];
        for (i, handle) in emitters.iter().enumerate() {
            batches[i % live.len()].push(handle.clone());
        }

        for (slot, batch) in live.into_iter().zip(batches) {
            if batch.is_empty() {
                continue;
            }
            let mut state = slot.state.lock();
            state.batch = batch;
            state.dt = dt;
            state.max_emission_step = max_emission_step;
            state.pending = true;
            state.busy = true;
            slot.signal.notify_all();
        }
    }

    /// Block until every worker is idle
    pub(crate) fn join(&self) {
        for slot in &self.slots {
            let mut state = slot.state.lock();
            while state.busy {
                slot.signal.wait(&mut state);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for slot in &self.slots {
            let mut state = slot.state.lock();
            state.shutdown = true;
            slot.signal.notify_all();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        debug!("worker pool stopped");
    }
}

fn worker_loop(slot: &WorkerSlot, faults: &FaultCell) {
    loop {
        let (batch, dt, step) = {
            let mut state = slot.state.lock();
            while !state.pending && !state.shutdown {
                slot.signal.wait(&mut state);
            }
            if state.shutdown {
                state.busy = false;
                slot.signal.notify_all();
                return;
            }
            state.pending = false;
            (std::mem::take(&mut state.batch), state.dt, state.max_emission_step)
        };

        let result = catch_unwind(AssertUnwindSafe(|| update_all(&batch, dt, step)));

        let mut state = slot.state.lock();
        state.busy = false;
        if let Err(payload) = result {
            faults.record(panic_message(payload));
            state.alive = false;
            slot.signal.notify_all();
            return;
        }
        slot.signal.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::{AreaModule, ForceModule};
    use crate::emitter::Emitter;
    use crate::shape::{AreaShape, EmissionShape};
    use ember_core::Vec2;

    fn emitter_at(position: Vec2) -> EmitterHandle {
        let mut e = Emitter::new(16, EmissionShape::Point);
        e.set_bounds_size(Vec2::splat(10.0)).unwrap();
        e.set_position(position);
        e.config_mut().life.set_normal(10.0);
        EmitterHandle::new(e)
    }

    #[test]
    fn link_pass_is_symmetric() {
        let area = AreaModule::force(
            AreaShape::Circle { radius: 20.0 },
            Vec2::ZERO,
            ForceModule::default(),
        );
        let near = emitter_at(Vec2::new(5.0, 0.0));
        let far = emitter_at(Vec2::new(500.0, 0.0));
        let emitters = vec![near.clone(), far.clone()];

        link_area(&area, &emitters);
        assert!(near.lock().influenced_by(area.id()));
        assert!(area.covers(near.id()));
        assert!(!far.lock().influenced_by(area.id()));
        assert!(!area.covers(far.id()));

        near.lock().set_position(Vec2::new(300.0, 0.0));
        link_area(&area, &emitters);
        assert!(!near.lock().influenced_by(area.id()));
        assert!(!area.covers(near.id()));
    }

    #[test]
    fn fault_cell_keeps_first() {
        let cell = FaultCell::default();
        cell.record("first".into());
        cell.record("second".into());
        assert_eq!(cell.take().as_deref(), Some("first"));
        assert!(cell.take().is_none());
    }

    #[test]
    fn pool_updates_every_emitter() {
        let faults = FaultCell::default();
        let pool = WorkerPool::new(3, faults.clone()).unwrap();
        let emitters: Vec<EmitterHandle> = (0..7).map(|_| emitter_at(Vec2::ZERO)).collect();
        for h in &emitters {
            h.lock().emit(2);
        }
        pool.dispatch(&emitters, 0.5, 0.1);
        pool.join();
        for h in &emitters {
            let e = h.lock();
            assert!((e.active_particles()[0].time_alive - 0.5).abs() < 1e-6);
        }
        assert!(faults.take().is_none());
        assert_eq!(pool.live_workers(), 3);
    }

    #[test]
    fn rayon_frame_signals_completion() {
        let emitters: Vec<EmitterHandle> = (0..4).map(|_| emitter_at(Vec2::ZERO)).collect();
        for h in &emitters {
            h.lock().emit(1);
        }
        let work = FrameWork {
            areas: Vec::new(),
            emitters: emitters.clone(),
            visible: emitters.clone(),
            dt: 0.25,
            max_emission_step: 0.1,
        };
        let faults = FaultCell::default();
        spawn_frame(work, faults.clone()).recv().unwrap();
        for h in &emitters {
            assert!((h.lock().active_particles()[0].time_alive - 0.25).abs() < 1e-6);
        }
        assert!(faults.take().is_none());
    }

    #[test]
    fn panic_payloads_become_messages() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7u8)), "worker panicked");
    }
}
