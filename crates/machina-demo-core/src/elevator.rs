//! The elevator machine: states, domain data, and routines.
//!
//! A cab waits on its current level until a button event arrives, then
//! travels one level per press, `ticks_per_level` ticks per level. The
//! Waiting state owns the event handler; the Moving state owns an exit hook
//! that clears the in-motion flag however the state is left.

use crate::template::ElevatorTemplate;
use machina_core::behavior::Behavior;
use machina_core::routine::{Cx, Routine, Step};
use machina_core::sim::Ticks;

// ---------------------------------------------------------------------------
// States, data, events
// ---------------------------------------------------------------------------

/// Elevator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElevatorState {
    /// Idle on a level, listening for button presses.
    Waiting,
    /// Traveling one level in the requested direction.
    Moving,
}

/// A button press, delivered as an event and carried as the transition
/// payload into Moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevatorInput {
    Up,
    Down,
}

/// Per-cab domain data.
#[derive(Debug, Clone, Default)]
pub struct ElevatorData {
    /// Current level of the cab.
    pub level: i32,
    /// Set while the cab travels; cleared by Moving's exit hook.
    pub is_moving: bool,
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Dispatch table for elevator machines. One shared template per bank.
pub struct ElevatorBehavior {
    pub template: ElevatorTemplate,
}

impl Behavior for ElevatorBehavior {
    type State = ElevatorState;
    type Data = ElevatorData;
    type Value = ElevatorInput;
    type Event = ElevatorInput;

    fn routine(&self, state: ElevatorState) -> Option<Box<dyn Routine<Self>>> {
        match state {
            ElevatorState::Waiting => Some(Box::new(WaitingRoutine)),
            ElevatorState::Moving => Some(Box::new(MovingRoutine::new(self.template.clone()))),
        }
    }
}

// ---------------------------------------------------------------------------
// Waiting
// ---------------------------------------------------------------------------

struct WaitingRoutine;

impl Routine<ElevatorBehavior> for WaitingRoutine {
    fn resume(&mut self, cx: &mut Cx<'_, ElevatorBehavior>) -> Step {
        cx.on_event(|cx, input| {
            cx.go(ElevatorState::Moving, Some(*input));
        });
        Step::Done
    }
}

// ---------------------------------------------------------------------------
// Moving
// ---------------------------------------------------------------------------

struct MovingRoutine {
    template: ElevatorTemplate,
    target: i32,
    ticks_left: Ticks,
    engaged: bool,
}

impl MovingRoutine {
    fn new(template: ElevatorTemplate) -> Self {
        Self {
            template,
            target: 0,
            ticks_left: 0,
            engaged: false,
        }
    }
}

impl Routine<ElevatorBehavior> for MovingRoutine {
    fn resume(&mut self, cx: &mut Cx<'_, ElevatorBehavior>) -> Step {
        if !self.engaged {
            // Entered without a direction: nothing to do.
            let Some(input) = cx.take_value() else {
                cx.go(ElevatorState::Waiting, None);
                return Step::Done;
            };

            let here = cx.data.level;
            let target = match input {
                ElevatorInput::Up => self.template.clamp_level(here + 1),
                ElevatorInput::Down => self.template.clamp_level(here - 1),
            };
            if target == here {
                // Already at the end of the shaft; can't move.
                cx.go(ElevatorState::Waiting, None);
                return Step::Done;
            }

            self.engaged = true;
            self.target = target;
            self.ticks_left = self.template.ticks_per_level.max(1);
            cx.data.is_moving = true;
            cx.on_exit(|data| data.is_moving = false);
            cx.set_substate(format!("to level {target}"));
            return Step::Yield;
        }

        self.ticks_left -= 1;
        if self.ticks_left == 0 {
            cx.data.level = self.target;
            cx.go(ElevatorState::Waiting, None);
            return Step::Done;
        }
        Step::Yield
    }
}
