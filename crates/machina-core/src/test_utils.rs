//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).
//!
//! The probe behavior records routine starts, resumes, completions and
//! exit-hook firings into a shared trace, so tests can assert on drain
//! order, cancellation and exactly-once semantics without inspecting engine
//! internals.

use crate::behavior::Behavior;
use crate::engine::Engine;
use crate::id::EntityId;
use crate::routine::{Cx, Routine, Step};
use crate::sim::Ticks;
use std::cell::RefCell;
use std::rc::Rc;

// ===========================================================================
// Probe behavior
// ===========================================================================

/// States used by the probe behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeState {
    /// Routine completes immediately after installing the event handler.
    Idle,
    /// Routine yields for `work_ticks` ticks, then transitions to Idle.
    Working,
    /// Terminal state typically entered via `go_and_stop`.
    Parked,
    /// Deliberately has no routine mapping.
    Unmapped,
}

/// One observation recorded by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeNote {
    /// A state's routine ran its first slice (inside a drain).
    Started(ProbeState),
    /// A suspended routine ran a subsequent slice.
    Resumed(ProbeState),
    /// A routine ran to completion on its own.
    Finished(ProbeState),
    /// An exit hook fired.
    ExitFired(ProbeState),
}

/// Shared observation log, keyed by entity.
pub type Trace = Rc<RefCell<Vec<(EntityId, ProbeNote)>>>;

/// Per-entity domain data for probe tests.
#[derive(Debug, Default)]
pub struct ProbeData {
    /// Exit hooks fired for this entity.
    pub exits: u32,
    /// Payload captured by the most recent Working routine.
    pub last_payload: Option<u32>,
}

/// Events understood by the Idle state's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeEvent {
    /// Ask the Idle handler to transition to Working with a payload.
    GoWorking(u32),
    /// Ask the Idle handler to park the machine (`go_and_stop`).
    Park,
}

/// Behavior wiring [`ProbeState`] to recording routines.
pub struct ProbeBehavior {
    pub trace: Trace,
    /// Ticks a Working routine yields before finishing.
    pub work_ticks: Ticks,
    /// When false, nothing is recorded (benchmarks).
    pub record: bool,
}

impl ProbeBehavior {
    fn note(&self, entity: EntityId, note: ProbeNote) {
        if self.record {
            self.trace.borrow_mut().push((entity, note));
        }
    }
}

impl Behavior for ProbeBehavior {
    type State = ProbeState;
    type Data = ProbeData;
    type Value = u32;
    type Event = ProbeEvent;

    fn routine(&self, state: ProbeState) -> Option<Box<dyn Routine<Self>>> {
        match state {
            ProbeState::Idle => Some(Box::new(IdleRoutine {
                trace: self.trace.clone(),
                record: self.record,
            })),
            ProbeState::Working => Some(Box::new(WorkingRoutine {
                trace: self.trace.clone(),
                record: self.record,
                ticks_left: self.work_ticks,
                engaged: false,
            })),
            ProbeState::Parked => Some(Box::new(ParkedRoutine {
                trace: self.trace.clone(),
                record: self.record,
            })),
            ProbeState::Unmapped => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Routines
// ---------------------------------------------------------------------------

struct IdleRoutine {
    trace: Trace,
    record: bool,
}

impl Routine<ProbeBehavior> for IdleRoutine {
    fn resume(&mut self, cx: &mut Cx<'_, ProbeBehavior>) -> Step {
        let entity = cx.entity();
        if self.record {
            self.trace
                .borrow_mut()
                .push((entity, ProbeNote::Started(ProbeState::Idle)));
        }

        let trace = self.trace.clone();
        let record = self.record;
        cx.on_exit(move |data| {
            data.exits += 1;
            if record {
                trace
                    .borrow_mut()
                    .push((entity, ProbeNote::ExitFired(ProbeState::Idle)));
            }
        });

        cx.on_event(|cx, event| match *event {
            ProbeEvent::GoWorking(payload) => cx.go(ProbeState::Working, Some(payload)),
            ProbeEvent::Park => cx.go_and_stop(ProbeState::Parked, None),
        });

        Step::Done
    }
}

struct WorkingRoutine {
    trace: Trace,
    record: bool,
    ticks_left: Ticks,
    engaged: bool,
}

impl Routine<ProbeBehavior> for WorkingRoutine {
    fn resume(&mut self, cx: &mut Cx<'_, ProbeBehavior>) -> Step {
        let entity = cx.entity();
        if !self.engaged {
            self.engaged = true;
            if self.record {
                self.trace
                    .borrow_mut()
                    .push((entity, ProbeNote::Started(ProbeState::Working)));
            }
            let payload = cx.take_value();
            cx.data.last_payload = payload;

            let trace = self.trace.clone();
            let record = self.record;
            cx.on_exit(move |data| {
                data.exits += 1;
                if record {
                    trace
                        .borrow_mut()
                        .push((entity, ProbeNote::ExitFired(ProbeState::Working)));
                }
            });
            cx.set_substate("working");

            if self.ticks_left == 0 {
                cx.go(ProbeState::Idle, None);
                return Step::Done;
            }
            return Step::Yield;
        }

        if self.record {
            self.trace
                .borrow_mut()
                .push((entity, ProbeNote::Resumed(ProbeState::Working)));
        }
        self.ticks_left -= 1;
        if self.ticks_left == 0 {
            if self.record {
                self.trace
                    .borrow_mut()
                    .push((entity, ProbeNote::Finished(ProbeState::Working)));
            }
            cx.go(ProbeState::Idle, None);
            return Step::Done;
        }
        Step::Yield
    }
}

struct ParkedRoutine {
    trace: Trace,
    record: bool,
}

impl Routine<ProbeBehavior> for ParkedRoutine {
    fn resume(&mut self, cx: &mut Cx<'_, ProbeBehavior>) -> Step {
        if self.record {
            self.trace
                .borrow_mut()
                .push((cx.entity(), ProbeNote::Started(ProbeState::Parked)));
        }
        Step::Done
    }
}

// ===========================================================================
// Builders
// ===========================================================================

/// Engine with a recording probe behavior. `work_ticks` is how long the
/// Working routine yields before finishing.
pub fn probe_engine(work_ticks: Ticks) -> (Engine<ProbeBehavior>, Trace) {
    let trace: Trace = Rc::new(RefCell::new(Vec::new()));
    let engine = Engine::new(ProbeBehavior {
        trace: trace.clone(),
        work_ticks,
        record: true,
    });
    (engine, trace)
}

/// Engine with a non-recording probe behavior, for benchmarks.
pub fn quiet_probe_engine(work_ticks: Ticks) -> Engine<ProbeBehavior> {
    Engine::new(ProbeBehavior {
        trace: Rc::new(RefCell::new(Vec::new())),
        work_ticks,
        record: false,
    })
}

/// The `Started` notes from a trace, in recording order.
pub fn started(trace: &Trace) -> Vec<(EntityId, ProbeState)> {
    trace
        .borrow()
        .iter()
        .filter_map(|&(entity, note)| match note {
            ProbeNote::Started(state) => Some((entity, state)),
            _ => None,
        })
        .collect()
}

/// The `ExitFired` notes from a trace, in recording order.
pub fn exits(trace: &Trace) -> Vec<(EntityId, ProbeState)> {
    trace
        .borrow()
        .iter()
        .filter_map(|&(entity, note)| match note {
            ProbeNote::ExitFired(state) => Some((entity, state)),
            _ => None,
        })
        .collect()
}
