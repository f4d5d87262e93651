//! Headless elevator runner.
//!
//! Drives a two-cab bank for a fixed number of ticks, pressing buttons at
//! scripted times and printing machine snapshots. Run with
//! `RUST_LOG=machina_core=debug` to see the per-transition log lines.

use machina_demo_core::{ElevatorBank, ElevatorInput};
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let template_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates/elevator.ron");
    let mut bank = ElevatorBank::from_template_file(&template_path)?;

    let cab_a = bank.add_cab("cab-a", 0)?;
    let cab_b = bank.add_cab("cab-b", 3)?;
    for cab in [cab_a, cab_b] {
        if let Some(machine) = bank.engine_mut().machine_mut(cab) {
            machine.set_log_transitions(true);
        }
    }

    for tick in 0..24u64 {
        match tick {
            1 => {
                bank.press(cab_a, ElevatorInput::Up)?;
                bank.press(cab_b, ElevatorInput::Down)?;
            }
            8 => {
                // cab-a is likely still traveling: this press is dropped.
                bank.press(cab_a, ElevatorInput::Up)?;
            }
            12 => {
                bank.press(cab_b, ElevatorInput::Down)?;
            }
            _ => {}
        }

        let result = bank.tick();
        println!(
            "tick {tick:>2}: {} | {} | starts={} resumes={}",
            bank.snapshot(cab_a)?,
            bank.snapshot(cab_b)?,
            result.starts_run,
            result.routines_resumed,
        );
    }

    println!(
        "final: cab-a level {}, cab-b level {}",
        bank.level(cab_a)?,
        bank.level(cab_b)?
    );
    Ok(())
}
