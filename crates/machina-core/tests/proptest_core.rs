//! Property-based tests for the machina FSM core.
//!
//! Two batteries: a reference-model check of the pending registry's
//! move-to-front/at-most-once discipline, and a shadow-model check that
//! random operation sequences against a full engine preserve the structural
//! invariants at every observation point.

use machina_core::id::EntityId;
use machina_core::scheduler::PendingScheduler;
use machina_core::test_utils::*;
use proptest::prelude::*;
use slotmap::SlotMap;
use std::collections::HashSet;

// ===========================================================================
// Registry vs. reference model
// ===========================================================================

#[derive(Debug, Clone, Copy)]
enum RegOp {
    Register(usize),
    Deregister(usize),
}

fn arb_reg_ops(n_entities: usize, max_len: usize) -> impl Strategy<Value = Vec<RegOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..n_entities).prop_map(RegOp::Register),
            (0..n_entities).prop_map(RegOp::Deregister),
        ],
        0..max_len,
    )
}

fn make_entities(n: usize) -> Vec<EntityId> {
    let mut sm = SlotMap::<EntityId, ()>::with_key();
    (0..n).map(|_| sm.insert(())).collect()
}

proptest! {
    // The registry behaves exactly like a vector with remove-then-push-front
    // registration: membership is at most once, order is recency.
    #[test]
    fn scheduler_matches_reference_model(ops in arb_reg_ops(8, 64)) {
        let entities = make_entities(8);
        let mut sched = PendingScheduler::new();
        let mut model: Vec<EntityId> = Vec::new();

        for op in ops {
            match op {
                RegOp::Register(i) => {
                    let e = entities[i];
                    model.retain(|&x| x != e);
                    model.insert(0, e);
                    sched.register(e);
                }
                RegOp::Deregister(i) => {
                    let e = entities[i];
                    let was_present = model.iter().any(|&x| x == e);
                    model.retain(|&x| x != e);
                    prop_assert_eq!(sched.deregister(e), was_present);
                }
            }
            prop_assert_eq!(sched.snapshot(), model.clone());

            let mut seen = HashSet::new();
            for e in sched.snapshot() {
                prop_assert!(seen.insert(e), "duplicate registry entry: {e:?}");
            }
        }
    }
}

// ===========================================================================
// Engine vs. shadow model
// ===========================================================================
//
// The probe behavior with a very long work duration never transitions on
// its own, so a small shadow record per entity can predict the machine
// exactly: current/previous state, pending registration, and whether the
// Idle event handler is installed (it appears when Idle's routine starts at
// a drain and disappears on any transition).

#[derive(Debug, Clone, Copy)]
enum EngineOp {
    Go(usize),
    Halt(usize),
    Back(usize),
    EventWork(usize),
    EventPark(usize),
    Toggle(usize),
    Step,
}

fn arb_engine_ops(n_entities: usize, max_len: usize) -> impl Strategy<Value = Vec<EngineOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..n_entities).prop_map(EngineOp::Go),
            (0..n_entities).prop_map(EngineOp::Halt),
            (0..n_entities).prop_map(EngineOp::Back),
            (0..n_entities).prop_map(EngineOp::EventWork),
            (0..n_entities).prop_map(EngineOp::EventPark),
            (0..n_entities).prop_map(EngineOp::Toggle),
            Just(EngineOp::Step),
        ],
        0..max_len,
    )
}

#[derive(Debug, Clone, Copy)]
struct Shadow {
    state: ProbeState,
    prev: Option<ProbeState>,
    pending: bool,
    handler: bool,
    active: bool,
}

impl Shadow {
    fn transition(&mut self, next: ProbeState, pending: bool) {
        self.prev = Some(self.state);
        self.state = next;
        self.pending = pending;
        self.handler = false;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn engine_matches_shadow_model(ops in arb_engine_ops(4, 48)) {
        let n = 4;
        let (mut engine, _trace) = probe_engine(1_000);
        let entities: Vec<EntityId> = (0..n)
            .map(|i| engine.spawn(format!("probe-{i}"), ProbeData::default()))
            .collect();
        let mut shadows: Vec<Shadow> = Vec::new();
        for &e in &entities {
            engine.start(e, ProbeState::Idle, None).unwrap();
            shadows.push(Shadow {
                state: ProbeState::Idle,
                prev: None,
                pending: true,
                handler: false,
                active: true,
            });
        }

        for op in ops {
            match op {
                EngineOp::Go(i) => {
                    engine.go(entities[i], ProbeState::Working, Some(7)).unwrap();
                    shadows[i].transition(ProbeState::Working, true);
                }
                EngineOp::Halt(i) => {
                    engine.go_and_stop(entities[i], ProbeState::Parked, None).unwrap();
                    shadows[i].transition(ProbeState::Parked, false);
                }
                EngineOp::Back(i) => {
                    engine.go_back(entities[i]).unwrap();
                    if let Some(prev) = shadows[i].prev {
                        shadows[i].transition(prev, true);
                    }
                }
                EngineOp::EventWork(i) => {
                    let delivered = engine
                        .send_event(entities[i], &ProbeEvent::GoWorking(9))
                        .unwrap();
                    prop_assert_eq!(delivered, shadows[i].handler);
                    if shadows[i].handler {
                        shadows[i].transition(ProbeState::Working, true);
                    }
                }
                EngineOp::EventPark(i) => {
                    let delivered = engine
                        .send_event(entities[i], &ProbeEvent::Park)
                        .unwrap();
                    prop_assert_eq!(delivered, shadows[i].handler);
                    if shadows[i].handler {
                        shadows[i].transition(ProbeState::Parked, false);
                    }
                }
                EngineOp::Toggle(i) => {
                    let now_active = !shadows[i].active;
                    engine.set_active(entities[i], now_active);
                    shadows[i].active = now_active;
                }
                EngineOp::Step => {
                    engine.step();
                    for shadow in shadows.iter_mut() {
                        if !shadow.pending {
                            continue;
                        }
                        // Drained: removed from the registry either way;
                        // only active entities actually start, and only
                        // Idle's routine installs a handler.
                        shadow.pending = false;
                        if shadow.active && shadow.state == ProbeState::Idle {
                            shadow.handler = true;
                        }
                    }
                }
            }

            // Engine state matches the shadow after every operation.
            for (i, shadow) in shadows.iter().enumerate() {
                let e = entities[i];
                prop_assert_eq!(engine.state(e), Some(shadow.state));
                let machine = engine.machine(e).unwrap();
                prop_assert_eq!(machine.previous_state(), shadow.prev);
                prop_assert_eq!(engine.pending(e), shadow.pending);
            }

            // A machine never appears in the registry more than once.
            let snapshot = engine.scheduler().snapshot();
            let unique: HashSet<EntityId> = snapshot.iter().copied().collect();
            prop_assert_eq!(unique.len(), snapshot.len());
        }
    }
}
