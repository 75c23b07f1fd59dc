use ember_particles::{EmissionShape, Emitter};
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Op {
    Emit(usize),
    Deactivate(usize),
    Update(f32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..12).prop_map(Op::Emit),
        (0usize..40).prop_map(Op::Deactivate),
        (0.0f32..0.6).prop_map(Op::Update),
    ]
}

fn ids_are_permutation(emitter: &Emitter) -> bool {
    let mut ids: Vec<u32> = emitter.slots().iter().map(|p| p.id).collect();
    ids.sort_unstable();
    ids.iter().enumerate().all(|(i, id)| *id as usize == i)
}

/// Initial life of every live particle, by id
fn live_by_id(emitter: &Emitter) -> HashMap<u32, f32> {
    emitter
        .active_particles()
        .iter()
        .map(|p| (p.id, p.initial_life))
        .collect()
}

proptest! {
    #[test]
    fn slot_invariants_hold(capacity in 1usize..32, ops in prop::collection::vec(op(), 1..64)) {
        let mut emitter = Emitter::new(capacity, EmissionShape::Point);
        emitter.seed(7);
        emitter.config_mut().life.set_random_between(0.5, 2.0);

        for op in ops {
            let before = live_by_id(&emitter);
            match op {
                Op::Emit(n) => {
                    let active = emitter.num_active();
                    let emitted = emitter.emit(n);
                    if active < capacity {
                        prop_assert_eq!(emitted, n.clamp(1, capacity - active));
                    } else {
                        prop_assert_eq!(emitted, 0);
                    }
                    // Existing particles stay where they were
                    for (i, p) in emitter.active_particles()[..active].iter().enumerate() {
                        prop_assert_eq!(before.get(&p.id).copied(), Some(p.initial_life), "slot {}", i);
                    }
                }
                Op::Deactivate(index) => {
                    let active = emitter.num_active();
                    let result = emitter.deactivate_particle(index);
                    prop_assert_eq!(result.is_ok(), index < active);
                    if index < active {
                        prop_assert_eq!(emitter.num_active(), active - 1);
                        // Survivors keep their id and data
                        let after = live_by_id(&emitter);
                        for (id, life) in &after {
                            prop_assert_eq!(before.get(id), Some(life));
                        }
                    }
                }
                Op::Update(dt) => {
                    emitter.update(dt, 0.1);
                    let after = live_by_id(&emitter);
                    for (id, life) in &after {
                        prop_assert_eq!(before.get(id), Some(life));
                    }
                    for p in emitter.active_particles() {
                        prop_assert!(p.time_alive < p.initial_life);
                    }
                }
            }
            prop_assert!(emitter.num_active() <= capacity);
            prop_assert!(ids_are_permutation(&emitter));
        }
    }
}
