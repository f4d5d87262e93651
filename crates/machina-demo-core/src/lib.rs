//! Elevator demo built on the machina FSM core.
//!
//! A worked example of the cooperative-routine state machine: cabs wait on
//! a level, react to button events, and travel level-by-level over multiple
//! ticks, with the exit hook, substate tag, and transition payload features
//! all exercised.
//!
//! # Usage
//!
//! ```rust,ignore
//! use machina_demo_core::{ElevatorBank, ElevatorInput};
//!
//! let mut bank = ElevatorBank::from_template_file("templates/elevator.ron".as_ref())?;
//! let cab = bank.add_cab("cab-a", 0)?;
//! bank.tick();                            // Waiting's routine starts
//! bank.press(cab, ElevatorInput::Up)?;    // -> Moving at the next tick
//! while bank.is_moving(cab)? || bank.level(cab)? == 0 {
//!     bank.tick();
//! }
//! ```

pub mod bank;
pub mod elevator;
pub mod error;
pub mod template;

pub use bank::ElevatorBank;
pub use elevator::{ElevatorBehavior, ElevatorData, ElevatorInput, ElevatorState};
pub use error::DemoError;
pub use template::{ElevatorTemplate, load_template};
