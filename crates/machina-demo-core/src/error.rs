use machina_core::id::EntityId;
use machina_core::machine::MachineError;
use std::path::PathBuf;

/// Errors that can occur in the elevator demo.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    /// The cab handle does not resolve to a hosted elevator.
    #[error("elevator cab {0:?} not found")]
    CabNotFound(EntityId),

    /// Failed to parse a template file.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A template declared an impossible level range.
    #[error("template level range is empty: min {min} > max {max}")]
    EmptyLevelRange { min: i32, max: i32 },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A core machine operation failed.
    #[error(transparent)]
    Machine(#[from] MachineError),
}
