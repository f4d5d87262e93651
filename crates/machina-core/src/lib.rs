//! Machina Core -- a per-entity state machine for tick-driven simulations.
//!
//! Each hosted entity owns exactly one active state. State bodies run as
//! cooperative routines resumed once per tick; transitions are requested
//! synchronously from anywhere (routine bodies, event handlers, external
//! code), but the new state's routine starts only at one controlled point
//! per tick -- the pending-registry drain.
//!
//! # Three-Phase Tick Pipeline
//!
//! Each call to [`engine::Engine::step`] advances the simulation by one
//! tick through the following phases:
//!
//! 1. **Resume** -- Every suspended routine of an active entity runs one
//!    slice; transitions made mid-slice cancel the routine on the spot.
//! 2. **Deferred start** -- All machines registered during the tick have
//!    their new state's routine built and its first slice run. Each entry
//!    is removed from the registry *before* its routine starts, so
//!    transitions made while starting belong to the next drain and the
//!    drain can never loop over freshly re-added entries.
//! 3. **Bookkeeping** -- Increment the tick counter.
//!
//! # Transition Pattern
//!
//! Transitions mutate the machine immediately and defer only the routine
//! start:
//!
//! ```rust,ignore
//! engine.go(cab, ElevatorState::Moving, Some(input))?;
//! // state is Moving right now; Moving's routine starts at the next step()
//! engine.step();
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Hosts one family of machines and drives the
//!   pipeline.
//! - [`machine::Machine`] -- Per-entity state, transition protocol, event
//!   delivery, state timer.
//! - [`scheduler::PendingScheduler`] -- Ordered registry of deferred
//!   routine starts (most-recently-registered drains first).
//! - [`behavior::Behavior`] -- Compile-time mapping from states to routine
//!   factories.
//! - [`routine::Routine`] / [`routine::Cx`] -- The cooperative state body
//!   and the context it runs against.
//! - [`query::MachineSnapshot`] -- Owned read-only view for rendering and
//!   logs.

pub mod behavior;
pub mod engine;
pub mod id;
pub mod machine;
pub mod query;
pub mod routine;
pub mod scheduler;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
