//! Behavior definitions: the compile-time mapping from states to routines.
//!
//! A [`Behavior`] describes one family of machines: the state identifier
//! type, the per-entity domain data, the payload types, and the factory that
//! builds the cooperative routine for each state. The factory replaces any
//! name-based dispatch: a state with no routine simply returns `None`, which
//! the engine reports at deferred-start time without starting anything.

use crate::routine::Routine;
use std::fmt;
use std::hash::Hash;

/// Requirements on a state identifier: enumerable, comparable, hashable,
/// cheap to copy. Typically a fieldless `enum`.
pub trait StateId: Copy + Eq + Hash + fmt::Debug + 'static {}

impl<T> StateId for T where T: Copy + Eq + Hash + fmt::Debug + 'static {}

/// One family of state machines: states, domain data, payloads, and the
/// state-to-routine dispatch table.
///
/// An [`crate::engine::Engine`] is parameterized by one `Behavior`; every
/// entity it hosts shares these types. Hosts with several unrelated machine
/// families run one engine per family.
pub trait Behavior: Sized + 'static {
    /// The state identifier type.
    type State: StateId;

    /// Per-entity domain data, mutated by routines and hooks.
    type Data;

    /// Opaque payload attached to a transition, readable by the newly
    /// entered state.
    type Value;

    /// Payload delivered to the active state's event handler.
    type Event;

    /// Build the cooperative routine for `state`.
    ///
    /// Returning `None` means the state has no routine; a deferred start
    /// for it logs a warning and starts nothing. The core performs no
    /// up-front validation that every state is mapped.
    fn routine(&self, state: Self::State) -> Option<Box<dyn Routine<Self>>>;
}
