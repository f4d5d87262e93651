//! Criterion benchmarks for the machina FSM core.
//!
//! Two benchmark groups:
//! - `transition_storm`: every machine transitions every tick, so each step
//!   drains a full registry -- measures the transition protocol + drain.
//! - `steady_resume`: machines sit in a long-running state -- measures the
//!   per-tick resume overhead with an idle registry.

use criterion::{Criterion, criterion_group, criterion_main};
use machina_core::engine::Engine;
use machina_core::id::EntityId;
use machina_core::test_utils::{ProbeBehavior, ProbeData, ProbeState, quiet_probe_engine};

// ===========================================================================
// Builders
// ===========================================================================

/// Engine with `n` machines started into Working with a long work duration.
fn build_engine(n: usize, work_ticks: u64) -> (Engine<ProbeBehavior>, Vec<EntityId>) {
    let mut engine = quiet_probe_engine(work_ticks);
    let entities: Vec<EntityId> = (0..n)
        .map(|i| engine.spawn(format!("probe-{i}"), ProbeData::default()))
        .collect();
    for &e in &entities {
        engine
            .start(e, ProbeState::Working, None)
            .expect("fresh machine starts");
    }
    // Settle the initial deferred starts.
    engine.step();
    (engine, entities)
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_transition_storm(c: &mut Criterion) {
    let (mut engine, entities) = build_engine(1_000, u64::MAX);

    c.bench_function("transition_storm_1000", |b| {
        b.iter(|| {
            for &e in &entities {
                let _ = engine.go(e, ProbeState::Working, Some(1));
            }
            engine.step()
        })
    });
}

fn bench_steady_resume(c: &mut Criterion) {
    let (mut engine, _entities) = build_engine(1_000, u64::MAX);

    c.bench_function("steady_resume_1000", |b| {
        b.iter(|| engine.step())
    });
}

criterion_group!(benches, bench_transition_storm, bench_steady_resume);
criterion_main!(benches);
