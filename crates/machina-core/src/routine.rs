//! Cooperative state routines and the context they run against.
//!
//! A routine is the suspendable body of logic for one state. The engine
//! resumes each live routine once per tick; one [`Routine::resume`] call
//! runs the body from one suspension point to the next. Returning
//! [`Step::Yield`] suspends until the next tick, [`Step::Done`] completes
//! the body (the state itself stays active -- only a transition leaves it).
//!
//! Cancellation is unconditional: any transition bumps the machine's
//! sequence number, and the engine drops the routine the moment the resume
//! call returns. A routine never observes its own cancellation.

use crate::behavior::Behavior;
use crate::id::EntityId;
use crate::machine::{Machine, Transition, TransitionListener, TransitionNotice};
use crate::scheduler::PendingScheduler;
use crate::sim::Ticks;

// ---------------------------------------------------------------------------
// Routine
// ---------------------------------------------------------------------------

/// Outcome of one resume slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Suspend; resume at the next tick unless a transition cancels first.
    Yield,
    /// The body has run to completion. No further resumes.
    Done,
}

/// The cooperative body of logic associated with one state.
pub trait Routine<B: Behavior> {
    /// Run from the current suspension point to the next.
    fn resume(&mut self, cx: &mut Cx<'_, B>) -> Step;
}

// ---------------------------------------------------------------------------
// Cx
// ---------------------------------------------------------------------------

/// Context handed to a routine resume or an event handler.
///
/// Borrows the entity's machine, its domain data, the pending registry, and
/// the global listener slot for the duration of one call. All transition
/// operations requested through it take effect immediately on the machine;
/// only the new state's routine start is deferred to the next drain.
pub struct Cx<'a, B: Behavior> {
    pub(crate) machine: &'a mut Machine<B>,
    /// The entity's domain data.
    pub data: &'a mut B::Data,
    pub(crate) sched: &'a mut PendingScheduler,
    pub(crate) listener: &'a mut Option<TransitionListener<B>>,
    pub(crate) now: Ticks,
}

impl<'a, B: Behavior> Cx<'a, B> {
    pub(crate) fn new(
        machine: &'a mut Machine<B>,
        data: &'a mut B::Data,
        sched: &'a mut PendingScheduler,
        listener: &'a mut Option<TransitionListener<B>>,
        now: Ticks,
    ) -> Self {
        Self {
            machine,
            data,
            sched,
            listener,
            now,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The entity this machine belongs to.
    pub fn entity(&self) -> EntityId {
        self.machine.entity()
    }

    /// The current tick.
    pub fn tick(&self) -> Ticks {
        self.now
    }

    /// The machine's current state.
    pub fn state(&self) -> Option<B::State> {
        self.machine.state()
    }

    /// The state held before the most recent transition.
    pub fn previous_state(&self) -> Option<B::State> {
        self.machine.previous_state()
    }

    /// Ticks elapsed since the transition into the current state was
    /// requested (deferral latency included).
    pub fn state_time(&self) -> Ticks {
        self.machine.state_time(self.now)
    }

    /// The payload attached to the transition into the current state.
    pub fn value(&self) -> Option<&B::Value> {
        self.machine.value()
    }

    /// Take ownership of the transition payload, leaving `None` behind.
    pub fn take_value(&mut self) -> Option<B::Value> {
        self.machine.take_value()
    }

    // -----------------------------------------------------------------------
    // State-owned registrations
    // -----------------------------------------------------------------------

    /// Tag progress within the current state. Cleared on every transition.
    pub fn set_substate(&mut self, tag: impl Into<String>) {
        self.machine.set_substate(tag);
    }

    /// Clear the progress tag.
    pub fn clear_substate(&mut self) {
        self.machine.clear_substate();
    }

    /// Register the hook that runs exactly once when the current state is
    /// left, by any transition variant. Replaces any earlier hook.
    pub fn on_exit(&mut self, hook: impl FnOnce(&mut B::Data) + 'static) {
        self.machine.set_on_exit(hook);
    }

    /// Register the handler for events sent to the current state. Cleared
    /// on every transition; replaces any earlier handler.
    pub fn on_event(&mut self, handler: impl FnMut(&mut Cx<'_, B>, &B::Event) + 'static) {
        self.machine.set_on_event(handler);
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Transition to `next`. The current routine is cancelled as soon as
    /// this resume/handler call returns; `next`'s routine starts at the
    /// next drain.
    pub fn go(&mut self, next: B::State, value: Option<B::Value>) {
        let t = self
            .machine
            .go(self.sched, self.now, self.data, next, value);
        self.notify(t);
    }

    /// Transition to `next` without ever starting its routine: the machine
    /// is withdrawn from the pending registry instead of registered.
    pub fn go_and_stop(&mut self, next: B::State, value: Option<B::Value>) {
        let t = self
            .machine
            .go_and_stop(self.sched, self.now, self.data, next, value);
        self.notify(t);
    }

    /// [`Cx::go`] with an unconditional log line naming the interrupted
    /// state. For out-of-band terminations.
    pub fn interrupt_and_go(&mut self, next: B::State, value: Option<B::Value>) {
        let t = self
            .machine
            .interrupt_and_go(self.sched, self.now, self.data, next, value);
        self.notify(t);
    }

    /// Transition back to the previous state. A no-op (logged) when no
    /// transition has ever occurred.
    pub fn go_back(&mut self) {
        let t = self.machine.go_back(self.sched, self.now, self.data);
        self.notify(t);
    }

    fn notify(&mut self, transition: Option<Transition<B::State>>) {
        let Some(transition) = transition else {
            return;
        };
        if let Some(listener) = self.listener.as_mut() {
            listener(&TransitionNotice {
                entity: self.machine.entity(),
                state: transition.to,
                previous_state: transition.from,
            });
        }
    }
}
