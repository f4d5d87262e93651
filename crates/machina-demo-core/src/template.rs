//! Elevator templates: shared parameters loaded from RON data files.
//!
//! A template is the data container used to initialize cabs; every cab in a
//! bank shares one template. See `templates/elevator.ron` for the stock
//! definition.

use crate::error::DemoError;
use machina_core::sim::Ticks;
use serde::Deserialize;
use std::path::Path;

/// Shared elevator parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ElevatorTemplate {
    /// Lowest reachable level.
    pub min_level: i32,
    /// Highest reachable level.
    pub max_level: i32,
    /// Travel time for one level, in simulation ticks.
    pub ticks_per_level: Ticks,
}

impl ElevatorTemplate {
    /// Limit a level to the template's reachable range.
    pub fn clamp_level(&self, level: i32) -> i32 {
        level.clamp(self.min_level, self.max_level)
    }

    /// Reject templates whose range can hold no cab.
    pub fn validate(&self) -> Result<(), DemoError> {
        if self.min_level > self.max_level {
            return Err(DemoError::EmptyLevelRange {
                min: self.min_level,
                max: self.max_level,
            });
        }
        Ok(())
    }
}

/// Load a template from a `.ron` file.
pub fn load_template(path: &Path) -> Result<ElevatorTemplate, DemoError> {
    let content = std::fs::read_to_string(path)?;
    let template: ElevatorTemplate = ron::from_str(&content).map_err(|e| DemoError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    template.validate()?;
    Ok(template)
}
