//! The per-entity state machine: state storage, the transition protocol,
//! event delivery, and the state timer.
//!
//! # Transition protocol
//!
//! Every transition variant applies the same ordered effects:
//!
//! 1. Cancel the running routine -- the sequence number bumps, and the
//!    engine drops the routine at the next opportunity, wherever it was
//!    suspended.
//! 2. Fire the exit hook exactly once, then clear it.
//! 3. Replace the state payload.
//! 4. Record the previous state, install the new one.
//! 5. Clear the substate tag and the event handler.
//! 6. Stamp the state timer with the current tick.
//! 7. Register with (or, for [`Machine::go_and_stop`], withdraw from) the
//!    pending registry.
//!
//! The new state's routine never starts inside the transition call; it
//! starts at the next drain. Transitions are therefore safe to request
//! re-entrantly -- from a routine body, from an event handler, or from
//! external code -- without nested routine starts.

use crate::behavior::Behavior;
use crate::id::EntityId;
use crate::routine::Cx;
use crate::scheduler::PendingScheduler;
use crate::sim::Ticks;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Hook and listener types
// ---------------------------------------------------------------------------

/// Exit hook owned by the active state. Fires exactly once when the state
/// is left, including on cancellation mid-routine.
pub type ExitHook<B> = Box<dyn FnOnce(&mut <B as Behavior>::Data)>;

/// Event handler owned by the active state. Receives a context and may
/// request transitions re-entrantly.
pub type EventHandler<B> = Box<dyn FnMut(&mut Cx<'_, B>, &<B as Behavior>::Event)>;

/// Process-wide transition listener. Disabled by default; installed via
/// [`crate::engine::Engine::set_transition_listener`].
pub type TransitionListener<B> = Box<dyn FnMut(&TransitionNotice<<B as Behavior>::State>)>;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Which transition operation produced a [`Transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    /// Plain transition; routine start deferred to the next drain.
    Go,
    /// Terminal transition; the pending registration is withdrawn and the
    /// new state's routine never starts.
    GoAndStop,
    /// Plain transition logged unconditionally as an interruption.
    Interrupt,
    /// Transition back to the previous state.
    Back,
}

/// Lifecycle of a machine instance. There is no path back to `Inert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineStatus {
    /// Constructed but never started; holds no state.
    Inert,
    /// Started; holds exactly one active state until despawned.
    Live,
}

/// Record of one performed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S> {
    pub kind: TransitionKind,
    pub from: S,
    pub to: S,
}

/// Payload delivered to the global transition listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionNotice<S> {
    pub entity: EntityId,
    pub state: S,
    pub previous_state: S,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by machine and engine operations. Valid transitions
/// never fail; these cover misuse of the lifecycle and stale handles.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    /// `start` was called on a machine that is already live.
    #[error("machine for entity {entity:?} has already been started")]
    AlreadyStarted { entity: EntityId },

    /// A transition was requested through the engine for a machine that
    /// was never started.
    #[error("machine for entity {entity:?} has not been started")]
    NotStarted { entity: EntityId },

    /// The entity handle does not resolve to a spawned entity.
    #[error("unknown entity {entity:?}")]
    UnknownEntity { entity: EntityId },
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// One entity's state machine.
///
/// Created inert by [`crate::engine::Engine::spawn`]; becomes live via
/// [`Machine::start`]; mutated only through its own transition operations
/// and event delivery; torn down by the owning entity's despawn, which also
/// withdraws any pending registration.
pub struct Machine<B: Behavior> {
    entity: EntityId,
    label: String,
    status: MachineStatus,
    state: Option<B::State>,
    previous_state: Option<B::State>,
    state_value: Option<B::Value>,
    state_started_at: Ticks,
    substate: Option<String>,
    on_exit: Option<ExitHook<B>>,
    on_event: Option<EventHandler<B>>,
    /// Transition sequence number; bumped by `start` and every transition.
    /// The engine snapshots it around routine resumes and event handlers:
    /// a changed value means the in-flight routine is cancelled.
    seq: u64,
    log_transitions: bool,
}

impl<B: Behavior> Machine<B> {
    /// Create an inert machine for `entity`. `label` identifies the entity
    /// in diagnostics.
    pub fn new(entity: EntityId, label: impl Into<String>) -> Self {
        Self {
            entity,
            label: label.into(),
            status: MachineStatus::Inert,
            state: None,
            previous_state: None,
            state_value: None,
            state_started_at: 0,
            substate: None,
            on_exit: None,
            on_event: None,
            seq: 0,
            log_transitions: false,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    pub fn is_live(&self) -> bool {
        self.status == MachineStatus::Live
    }

    /// The current state, or `None` while inert.
    pub fn state(&self) -> Option<B::State> {
        self.state
    }

    /// The state held before the most recent transition, or `None` if no
    /// transition has ever occurred.
    pub fn previous_state(&self) -> Option<B::State> {
        self.previous_state
    }

    /// The progress tag set by the running state, if any.
    pub fn substate(&self) -> Option<&str> {
        self.substate.as_deref()
    }

    /// The payload attached to the transition into the current state.
    pub fn value(&self) -> Option<&B::Value> {
        self.state_value.as_ref()
    }

    /// Take ownership of the transition payload.
    pub fn take_value(&mut self) -> Option<B::Value> {
        self.state_value.take()
    }

    /// The transition sequence number. See the field documentation.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Ticks since the transition into the current state was requested.
    /// Includes any deferral latency before the routine actually started.
    pub fn state_time(&self, now: Ticks) -> Ticks {
        now.saturating_sub(self.state_started_at)
    }

    /// Enable or disable the per-transition log line for this machine.
    pub fn set_log_transitions(&mut self, on: bool) {
        self.log_transitions = on;
    }

    // -----------------------------------------------------------------------
    // State-owned registrations
    // -----------------------------------------------------------------------

    /// Tag progress within the current state. Cleared on every transition.
    pub fn set_substate(&mut self, tag: impl Into<String>) {
        self.substate = Some(tag.into());
    }

    pub fn clear_substate(&mut self) {
        self.substate = None;
    }

    /// Install the exit hook for the current state, replacing any earlier
    /// one. Fires exactly once on leaving the state.
    pub fn set_on_exit(&mut self, hook: impl FnOnce(&mut B::Data) + 'static) {
        self.on_exit = Some(Box::new(hook));
    }

    /// Install the event handler for the current state, replacing any
    /// earlier one. Cleared on every transition.
    pub fn set_on_event(&mut self, handler: impl FnMut(&mut Cx<'_, B>, &B::Event) + 'static) {
        self.on_event = Some(Box::new(handler));
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Bring an inert machine live in `initial` and register it for a
    /// deferred routine start. Does not run the routine.
    pub fn start(
        &mut self,
        sched: &mut PendingScheduler,
        now: Ticks,
        initial: B::State,
        value: Option<B::Value>,
    ) -> Result<(), MachineError> {
        if self.is_live() {
            return Err(MachineError::AlreadyStarted {
                entity: self.entity,
            });
        }
        self.status = MachineStatus::Live;
        self.state = Some(initial);
        self.state_value = value;
        self.substate = None;
        self.on_event = None;
        self.on_exit = None;
        self.state_started_at = now;
        self.seq += 1;
        if self.log_transitions {
            tracing::debug!(
                entity = ?self.entity,
                label = %self.label,
                state = ?initial,
                "fsm start"
            );
        }
        sched.register(self.entity);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// The primary transition. Applies the full protocol and registers the
    /// machine for a deferred routine start (idempotent if already
    /// registered). Returns `None` (logged) on an inert machine.
    pub fn go(
        &mut self,
        sched: &mut PendingScheduler,
        now: Ticks,
        data: &mut B::Data,
        next: B::State,
        value: Option<B::Value>,
    ) -> Option<Transition<B::State>> {
        self.transition(TransitionKind::Go, sched, now, data, next, value)
    }

    /// Transition into a terminal/passive state: the protocol runs, but the
    /// machine is withdrawn from the pending registry -- including a
    /// registration made by an earlier transition this tick -- so the new
    /// state's routine never starts.
    pub fn go_and_stop(
        &mut self,
        sched: &mut PendingScheduler,
        now: Ticks,
        data: &mut B::Data,
        next: B::State,
        value: Option<B::Value>,
    ) -> Option<Transition<B::State>> {
        self.transition(TransitionKind::GoAndStop, sched, now, data, next, value)
    }

    /// [`Machine::go`] with an unconditional log line naming the state
    /// being interrupted. For out-of-band terminations.
    pub fn interrupt_and_go(
        &mut self,
        sched: &mut PendingScheduler,
        now: Ticks,
        data: &mut B::Data,
        next: B::State,
        value: Option<B::Value>,
    ) -> Option<Transition<B::State>> {
        tracing::info!(
            entity = ?self.entity,
            label = %self.label,
            from = ?self.state,
            to = ?next,
            "fsm interrupted"
        );
        self.transition(TransitionKind::Interrupt, sched, now, data, next, value)
    }

    /// Transition back to the previous state. Logged no-op when no
    /// transition has ever occurred.
    pub fn go_back(
        &mut self,
        sched: &mut PendingScheduler,
        now: Ticks,
        data: &mut B::Data,
    ) -> Option<Transition<B::State>> {
        let Some(prev) = self.previous_state else {
            tracing::warn!(
                entity = ?self.entity,
                label = %self.label,
                "go_back with no previous state; ignoring"
            );
            return None;
        };
        self.transition(TransitionKind::Back, sched, now, data, prev, None)
    }

    fn transition(
        &mut self,
        kind: TransitionKind,
        sched: &mut PendingScheduler,
        now: Ticks,
        data: &mut B::Data,
        next: B::State,
        value: Option<B::Value>,
    ) -> Option<Transition<B::State>> {
        let Some(from) = self.state else {
            tracing::warn!(
                entity = ?self.entity,
                label = %self.label,
                to = ?next,
                "transition on inert machine; ignoring"
            );
            return None;
        };

        // (1) Cancel the running routine. The engine drops it when it sees
        // the changed sequence number.
        self.seq += 1;

        // (2) Exit hook: exactly once, then cleared.
        if let Some(hook) = self.on_exit.take() {
            hook(data);
        }

        // (3)..(6)
        self.state_value = value;
        self.previous_state = Some(from);
        self.state = Some(next);
        self.substate = None;
        self.on_event = None;
        self.state_started_at = now;

        // (7) Deferred-start registration.
        match kind {
            TransitionKind::GoAndStop => {
                sched.deregister(self.entity);
            }
            _ => sched.register(self.entity),
        }

        if self.log_transitions {
            tracing::debug!(
                entity = ?self.entity,
                label = %self.label,
                kind = ?kind,
                from = ?from,
                to = ?next,
                "fsm transition"
            );
        }

        Some(Transition {
            kind,
            from,
            to: next,
        })
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Deliver an event to the current state's handler, synchronously.
    /// With no handler installed the event is silently dropped; returns
    /// whether a handler ran.
    ///
    /// The handler may transition re-entrantly. It is restored afterward
    /// only if the state that installed it is still active (a transition
    /// clears the handler as part of the protocol).
    pub fn send_event(
        &mut self,
        sched: &mut PendingScheduler,
        now: Ticks,
        data: &mut B::Data,
        listener: &mut Option<TransitionListener<B>>,
        event: &B::Event,
    ) -> bool {
        let Some(mut handler) = self.on_event.take() else {
            return false;
        };
        let seq_before = self.seq;
        {
            let mut cx = Cx::new(self, data, sched, listener, now);
            handler(&mut cx, event);
        }
        // Restore unless the installing state was left, or the handler
        // replaced itself.
        if self.seq == seq_before && self.on_event.is_none() {
            self.on_event = Some(handler);
        }
        true
    }
}

impl<B: Behavior> fmt::Debug for Machine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("entity", &self.entity)
            .field("label", &self.label)
            .field("status", &self.status)
            .field("state", &self.state)
            .field("previous_state", &self.previous_state)
            .field("substate", &self.substate)
            .field("state_started_at", &self.state_started_at)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
