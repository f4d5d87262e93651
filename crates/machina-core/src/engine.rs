//! The engine: owns the machines and orchestrates the per-tick pipeline.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - A [`slotmap::SlotMap`] of entities (label + active flag)
//! - Per-entity state: [`Machine`], domain data, and the suspended routine,
//!   each in its own [`SecondaryMap`]
//! - The [`PendingScheduler`] registry of deferred routine starts
//! - A [`SimState`] (tick counter)
//! - The optional process-wide transition listener
//!
//! # Three-Phase Tick Pipeline
//!
//! Each `step()` runs:
//! 1. **Resume** -- every suspended routine of an active entity runs one
//!    slice; routines whose machine transitioned mid-slice are dropped
//!    (cancellation), completed routines are retired.
//! 2. **Deferred start** -- the pending registry is drained: each machine is
//!    removed from the registry *first*, then its new state's routine is
//!    built and its first slice runs. Registrations made during the drain
//!    are collected by the next drain.
//! 3. **Bookkeeping** -- the tick counter increments.
//!
//! The external tick driver calls `step()` exactly once per discrete tick,
//! after its own per-entity update logic, so every transition requested
//! during the tick is visible to the drain before any new-state routine
//! executes.

use crate::behavior::Behavior;
use crate::id::EntityId;
use crate::machine::{Machine, MachineError, TransitionListener, TransitionNotice};
use crate::query::MachineSnapshot;
use crate::routine::{Cx, Routine, Step};
use crate::scheduler::PendingScheduler;
use crate::sim::{SimState, StepResult, Ticks};
use slotmap::{SecondaryMap, SlotMap};
use std::fmt;

// ---------------------------------------------------------------------------
// Entity metadata
// ---------------------------------------------------------------------------

/// Boundary-side record for a hosted entity. Real spawning, templates and
/// prefab instancing live with the host; the core only needs an identity
/// for diagnostics and the active/alive flag consulted before starting or
/// resuming routines.
#[derive(Debug, Clone)]
struct EntityMeta {
    label: String,
    active: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Hosts one family of machines (one [`Behavior`]) and drives them through
/// the tick pipeline.
pub struct Engine<B: Behavior> {
    behavior: B,
    entities: SlotMap<EntityId, EntityMeta>,
    machines: SecondaryMap<EntityId, Machine<B>>,
    data: SecondaryMap<EntityId, B::Data>,
    routines: SecondaryMap<EntityId, Box<dyn Routine<B>>>,
    scheduler: PendingScheduler,
    sim_state: SimState,
    listener: Option<TransitionListener<B>>,
}

impl<B: Behavior> Engine<B> {
    /// Create an engine hosting machines defined by `behavior`.
    pub fn new(behavior: B) -> Self {
        Self {
            behavior,
            entities: SlotMap::with_key(),
            machines: SecondaryMap::new(),
            data: SecondaryMap::new(),
            routines: SecondaryMap::new(),
            scheduler: PendingScheduler::new(),
            sim_state: SimState::new(),
            listener: None,
        }
    }

    /// The behavior this engine dispatches routines through.
    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    /// The current tick.
    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    /// Simulation state (read-only).
    pub fn sim_state(&self) -> &SimState {
        &self.sim_state
    }

    /// The pending registry (read-only).
    pub fn scheduler(&self) -> &PendingScheduler {
        &self.scheduler
    }

    // -----------------------------------------------------------------------
    // Entity lifecycle boundary
    // -----------------------------------------------------------------------

    /// Host an entity: allocate a handle and attach an inert machine plus
    /// its domain data. The machine stays inert until [`Engine::start`].
    pub fn spawn(&mut self, label: impl Into<String>, data: B::Data) -> EntityId {
        let label = label.into();
        let entity = self.entities.insert(EntityMeta {
            label: label.clone(),
            active: true,
        });
        self.machines.insert(entity, Machine::new(entity, label));
        self.data.insert(entity, data);
        entity
    }

    /// Tear an entity down: withdraw any pending registration (so no
    /// dangling start fires later), drop its routine, machine and data.
    /// Returns whether the entity existed.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        if self.entities.remove(entity).is_none() {
            return false;
        }
        self.scheduler.deregister(entity);
        self.routines.remove(entity);
        self.machines.remove(entity);
        self.data.remove(entity);
        true
    }

    /// Flip the active/alive flag. Inactive entities are skipped by both
    /// the resume phase and the deferred-start drain.
    pub fn set_active(&mut self, entity: EntityId, active: bool) -> bool {
        match self.entities.get_mut(entity) {
            Some(meta) => {
                meta.active = active;
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, entity: EntityId) -> bool {
        self.entities.get(entity).is_some_and(|meta| meta.active)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    pub fn machine(&self, entity: EntityId) -> Option<&Machine<B>> {
        self.machines.get(entity)
    }

    pub fn machine_mut(&mut self, entity: EntityId) -> Option<&mut Machine<B>> {
        self.machines.get_mut(entity)
    }

    pub fn data(&self, entity: EntityId) -> Option<&B::Data> {
        self.data.get(entity)
    }

    pub fn data_mut(&mut self, entity: EntityId) -> Option<&mut B::Data> {
        self.data.get_mut(entity)
    }

    /// The machine's current state, if the entity exists and is live.
    pub fn state(&self, entity: EntityId) -> Option<B::State> {
        self.machines.get(entity).and_then(|m| m.state())
    }

    /// Ticks since the machine's last transition call.
    pub fn state_time(&self, entity: EntityId) -> Option<Ticks> {
        self.machines
            .get(entity)
            .map(|m| m.state_time(self.sim_state.tick))
    }

    /// Whether the machine currently awaits a deferred routine start.
    pub fn pending(&self, entity: EntityId) -> bool {
        self.scheduler.contains(entity)
    }

    /// Whether a suspended routine exists for the entity.
    pub fn has_routine(&self, entity: EntityId) -> bool {
        self.routines.contains_key(entity)
    }

    /// Owned, read-only aggregate of one machine for rendering and logs.
    pub fn snapshot(&self, entity: EntityId) -> Option<MachineSnapshot<B::State>> {
        let meta = self.entities.get(entity)?;
        let machine = self.machines.get(entity)?;
        Some(MachineSnapshot {
            entity,
            label: meta.label.clone(),
            status: machine.status(),
            state: machine.state(),
            previous_state: machine.previous_state(),
            substate: machine.substate().map(str::to_owned),
            state_time: machine.state_time(self.sim_state.tick),
            pending_start: self.scheduler.contains(entity),
            suspended: self.routines.contains_key(entity),
        })
    }

    // -----------------------------------------------------------------------
    // Listener
    // -----------------------------------------------------------------------

    /// Install the process-wide transition listener. Disabled by default;
    /// called on every transition with the entity, new state and previous
    /// state.
    pub fn set_transition_listener(
        &mut self,
        listener: impl FnMut(&TransitionNotice<B::State>) + 'static,
    ) {
        self.listener = Some(Box::new(listener));
    }

    /// Remove the transition listener.
    pub fn clear_transition_listener(&mut self) {
        self.listener = None;
    }

    // -----------------------------------------------------------------------
    // Machine operations (external-caller wrappers)
    // -----------------------------------------------------------------------

    /// Bring an inert machine live in `initial`; its routine starts at the
    /// next drain.
    pub fn start(
        &mut self,
        entity: EntityId,
        initial: B::State,
        value: Option<B::Value>,
    ) -> Result<(), MachineError> {
        let machine = self
            .machines
            .get_mut(entity)
            .ok_or(MachineError::UnknownEntity { entity })?;
        machine.start(&mut self.scheduler, self.sim_state.tick, initial, value)
    }

    /// Request the primary transition from external code.
    pub fn go(
        &mut self,
        entity: EntityId,
        next: B::State,
        value: Option<B::Value>,
    ) -> Result<(), MachineError> {
        self.apply(entity, |cx| cx.go(next, value))
    }

    /// Transition into a terminal/passive state; no routine will start.
    pub fn go_and_stop(
        &mut self,
        entity: EntityId,
        next: B::State,
        value: Option<B::Value>,
    ) -> Result<(), MachineError> {
        self.apply(entity, |cx| cx.go_and_stop(next, value))
    }

    /// [`Engine::go`] with an unconditional interruption log line.
    pub fn interrupt_and_go(
        &mut self,
        entity: EntityId,
        next: B::State,
        value: Option<B::Value>,
    ) -> Result<(), MachineError> {
        self.apply(entity, |cx| cx.interrupt_and_go(next, value))
    }

    /// Transition back to the previous state (logged no-op without one).
    pub fn go_back(&mut self, entity: EntityId) -> Result<(), MachineError> {
        self.apply(entity, |cx| cx.go_back())
    }

    /// Deliver an event to the machine's current state, synchronously.
    /// Returns whether a handler ran; no handler installed is not an error.
    pub fn send_event(&mut self, entity: EntityId, event: &B::Event) -> Result<bool, MachineError> {
        let tick = self.sim_state.tick;
        let machine = self
            .machines
            .get_mut(entity)
            .ok_or(MachineError::UnknownEntity { entity })?;
        let data = self
            .data
            .get_mut(entity)
            .ok_or(MachineError::UnknownEntity { entity })?;

        let seq_before = machine.seq();
        let delivered = machine.send_event(&mut self.scheduler, tick, data, &mut self.listener, event);

        // A transition inside the handler cancels the suspended routine.
        if self.machines.get(entity).map(|m| m.seq()) != Some(seq_before) {
            self.routines.remove(entity);
        }
        Ok(delivered)
    }

    /// Shared wrapper for transitions from external code: resolve the
    /// entity, run the operation through a context, and abandon the
    /// suspended routine if a transition was performed.
    fn apply(
        &mut self,
        entity: EntityId,
        op: impl FnOnce(&mut Cx<'_, B>),
    ) -> Result<(), MachineError> {
        let tick = self.sim_state.tick;
        let machine = self
            .machines
            .get_mut(entity)
            .ok_or(MachineError::UnknownEntity { entity })?;
        if !machine.is_live() {
            return Err(MachineError::NotStarted { entity });
        }
        let data = self
            .data
            .get_mut(entity)
            .ok_or(MachineError::UnknownEntity { entity })?;

        let seq_before = machine.seq();
        {
            let mut cx = Cx::new(machine, data, &mut self.scheduler, &mut self.listener, tick);
            op(&mut cx);
        }
        if self.machines.get(entity).map(|m| m.seq()) != Some(seq_before) {
            self.routines.remove(entity);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Advance one tick: resume suspended routines, drain deferred starts,
    /// then increment the tick counter.
    pub fn step(&mut self) -> StepResult {
        let mut result = StepResult::default();
        self.phase_resume(&mut result);
        self.phase_deferred_start(&mut result);
        self.phase_bookkeeping();
        result
    }

    // -----------------------------------------------------------------------
    // Phase 1: Resume
    // -----------------------------------------------------------------------

    fn phase_resume(&mut self, result: &mut StepResult) {
        let tick = self.sim_state.tick;

        // Collect keys to iterate (avoids borrow conflicts while routines
        // mutate engine state through their context).
        let entities: Vec<EntityId> = self.routines.keys().collect();

        for entity in entities {
            if !self.is_active(entity) {
                // Left suspended; resumes again once reactivated.
                continue;
            }
            let Some(mut routine) = self.routines.remove(entity) else {
                continue;
            };
            let Some(machine) = self.machines.get_mut(entity) else {
                continue;
            };
            let Some(data) = self.data.get_mut(entity) else {
                continue;
            };

            let seq_before = machine.seq();
            let step = {
                let mut cx = Cx::new(machine, data, &mut self.scheduler, &mut self.listener, tick);
                routine.resume(&mut cx)
            };
            result.routines_resumed += 1;

            if self.machines.get(entity).map(|m| m.seq()) != Some(seq_before) {
                // The slice transitioned: the routine is cancelled at this
                // very suspension point and never resumes.
                result.routines_cancelled += 1;
                continue;
            }
            match step {
                Step::Yield => {
                    self.routines.insert(entity, routine);
                }
                Step::Done => {
                    result.routines_completed += 1;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase 2: Deferred start
    // -----------------------------------------------------------------------

    fn phase_deferred_start(&mut self, result: &mut StepResult) {
        // Snapshot first: registrations made while the drain runs belong to
        // the next drain, and the loop must never chase freshly re-added
        // entries.
        let snapshot = self.scheduler.snapshot();
        for entity in snapshot {
            // Remove-before-invoke. An entry that is gone by now was halted
            // or despawned while this drain was in progress.
            if !self.scheduler.deregister(entity) {
                continue;
            }
            self.start_routine(entity, result);
        }
    }

    fn start_routine(&mut self, entity: EntityId, result: &mut StepResult) {
        let tick = self.sim_state.tick;

        let Some(meta) = self.entities.get(entity) else {
            return;
        };
        if !meta.active {
            // Reported condition: the machine stays outside the registry
            // and awaits an explicit future transition.
            result.starts_inactive += 1;
            tracing::error!(
                entity = ?entity,
                label = %meta.label,
                "deferred routine start for inactive entity; not started"
            );
            return;
        }

        let Some(machine) = self.machines.get_mut(entity) else {
            return;
        };
        let Some(state) = machine.state() else {
            return;
        };
        let Some(mut routine) = self.behavior.routine(state) else {
            result.starts_unmapped += 1;
            tracing::warn!(
                entity = ?entity,
                state = ?state,
                "no routine mapped for state; nothing started"
            );
            return;
        };
        let Some(data) = self.data.get_mut(entity) else {
            return;
        };

        // The first slice of the new routine runs inside the drain itself.
        // A transition made here re-registers the machine, and the snapshot
        // discipline above carries that registration to the next drain.
        let seq_before = machine.seq();
        let step = {
            let mut cx = Cx::new(machine, data, &mut self.scheduler, &mut self.listener, tick);
            routine.resume(&mut cx)
        };
        result.starts_run += 1;

        if self.machines.get(entity).map(|m| m.seq()) != Some(seq_before) {
            result.routines_cancelled += 1;
            return;
        }
        match step {
            Step::Yield => {
                self.routines.insert(entity, routine);
            }
            Step::Done => {
                result.routines_completed += 1;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase 3: Bookkeeping
    // -----------------------------------------------------------------------

    fn phase_bookkeeping(&mut self) {
        self.sim_state.tick += 1;
    }
}

impl<B: Behavior> fmt::Debug for Engine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("entities", &self.entities.len())
            .field("suspended_routines", &self.routines.len())
            .field("pending_starts", &self.scheduler.len())
            .field("sim_state", &self.sim_state)
            .finish_non_exhaustive()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
