//! The elevator bank: wires a template and an engine together and exposes
//! the boundary API a host (renderer, input layer) talks to.

use crate::elevator::{ElevatorBehavior, ElevatorData, ElevatorInput, ElevatorState};
use crate::error::DemoError;
use crate::template::{ElevatorTemplate, load_template};
use machina_core::engine::Engine;
use machina_core::id::EntityId;
use machina_core::query::MachineSnapshot;
use machina_core::sim::StepResult;
use std::path::Path;

/// A group of elevator cabs sharing one template, driven by one engine.
#[derive(Debug)]
pub struct ElevatorBank {
    engine: Engine<ElevatorBehavior>,
}

impl ElevatorBank {
    /// Build a bank from an already-loaded template.
    pub fn new(template: ElevatorTemplate) -> Result<Self, DemoError> {
        template.validate()?;
        Ok(Self {
            engine: Engine::new(ElevatorBehavior { template }),
        })
    }

    /// Build a bank from a `.ron` template file.
    pub fn from_template_file(path: &Path) -> Result<Self, DemoError> {
        Self::new(load_template(path)?)
    }

    /// The template shared by every cab in this bank.
    pub fn template(&self) -> &ElevatorTemplate {
        &self.engine.behavior().template
    }

    /// Spawn a cab at `initial_level` (clamped to the shaft) and start it
    /// waiting. Its Waiting routine begins at the next tick.
    pub fn add_cab(&mut self, label: impl Into<String>, initial_level: i32) -> Result<EntityId, DemoError> {
        let level = self.template().clamp_level(initial_level);
        let cab = self.engine.spawn(
            label,
            ElevatorData {
                level,
                is_moving: false,
            },
        );
        self.engine.start(cab, ElevatorState::Waiting, None)?;
        Ok(cab)
    }

    /// Tear a cab down, withdrawing any pending routine start.
    pub fn remove_cab(&mut self, cab: EntityId) -> bool {
        self.engine.despawn(cab)
    }

    /// Press a button on a cab. Returns whether the cab reacted (a cab in
    /// motion has no handler installed and ignores presses).
    pub fn press(&mut self, cab: EntityId, input: ElevatorInput) -> Result<bool, DemoError> {
        Ok(self.engine.send_event(cab, &input)?)
    }

    /// Advance the bank by one tick.
    pub fn tick(&mut self) -> StepResult {
        self.engine.step()
    }

    /// Current level of a cab.
    pub fn level(&self, cab: EntityId) -> Result<i32, DemoError> {
        self.engine
            .data(cab)
            .map(|data| data.level)
            .ok_or(DemoError::CabNotFound(cab))
    }

    /// Whether a cab is currently traveling.
    pub fn is_moving(&self, cab: EntityId) -> Result<bool, DemoError> {
        self.engine
            .data(cab)
            .map(|data| data.is_moving)
            .ok_or(DemoError::CabNotFound(cab))
    }

    /// Read-only aggregate of a cab's machine for display.
    pub fn snapshot(&self, cab: EntityId) -> Result<MachineSnapshot<ElevatorState>, DemoError> {
        self.engine.snapshot(cab).ok_or(DemoError::CabNotFound(cab))
    }

    /// The underlying engine, for hosts that need direct machine access.
    pub fn engine(&self) -> &Engine<ElevatorBehavior> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<ElevatorBehavior> {
        &mut self.engine
    }
}
