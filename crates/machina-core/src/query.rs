//! Read-only snapshot view of a machine.
//!
//! An owned aggregate with no references into engine storage, suitable for
//! rendering, UI overlays, or logging. Built via
//! [`crate::engine::Engine::snapshot`].

use crate::id::EntityId;
use crate::machine::MachineStatus;
use crate::sim::Ticks;
use std::fmt;

/// An aggregated, read-only view of one machine.
#[derive(Debug, Clone)]
pub struct MachineSnapshot<S> {
    /// The owning entity.
    pub entity: EntityId,
    /// The entity's diagnostic label.
    pub label: String,
    /// Inert or live.
    pub status: MachineStatus,
    /// Current state, `None` while inert.
    pub state: Option<S>,
    /// State before the most recent transition.
    pub previous_state: Option<S>,
    /// Progress tag set by the running state.
    pub substate: Option<String>,
    /// Ticks since the last transition call.
    pub state_time: Ticks,
    /// Whether a deferred routine start is pending.
    pub pending_start: bool,
    /// Whether a suspended routine is waiting for the next tick.
    pub suspended: bool,
}

impl<S: fmt::Debug> fmt::Display for MachineSnapshot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] state: {:?}", self.label, self.state)?;
        if let Some(tag) = &self.substate {
            write!(f, " ({tag})")?;
        }
        write!(
            f,
            " [{}t] old: {:?}",
            self.state_time, self.previous_state
        )
    }
}
