//! Simulation time and per-step reporting types.
//!
//! The engine advances in discrete ticks; one call to
//! [`crate::engine::Engine::step`] is one tick. All durations in the crate
//! (state timers, travel times) are measured in ticks.

use serde::{Deserialize, Serialize};

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable simulation state tracked by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimState {
    /// Current tick counter. Incremented by 1 for each engine step.
    pub tick: Ticks,
}

impl SimState {
    /// Create a new simulation state starting at tick 0.
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Step result
// ---------------------------------------------------------------------------

/// Result of an `Engine::step()` call. Counters only; a step itself never
/// fails.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// Suspended routines resumed during the resume phase.
    pub routines_resumed: u64,

    /// Routines that ran to completion this step (either phase).
    pub routines_completed: u64,

    /// Routines dropped because their machine transitioned while the
    /// routine body was executing.
    pub routines_cancelled: u64,

    /// Deferred routine starts executed during the drain phase.
    pub starts_run: u64,

    /// Deferred starts skipped because the owning entity was inactive.
    /// Each one is also reported through the log.
    pub starts_inactive: u64,

    /// Deferred starts skipped because the behavior maps no routine to
    /// the machine's state.
    pub starts_unmapped: u64,
}
