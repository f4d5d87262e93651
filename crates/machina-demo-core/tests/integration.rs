//! Integration tests for the elevator demo.
//!
//! End-to-end behavior of the cooperative elevator machine: button events,
//! multi-tick travel, exit hooks, substate tags, and shaft limits.

use machina_demo_core::{ElevatorBank, ElevatorInput, ElevatorState, ElevatorTemplate};

fn make_bank() -> ElevatorBank {
    ElevatorBank::new(ElevatorTemplate {
        min_level: 0,
        max_level: 5,
        ticks_per_level: 4,
    })
    .unwrap()
}

// ===========================================================================
// Test 1: a fresh cab waits and listens
// ===========================================================================

#[test]
fn fresh_cab_waits_on_its_level() {
    let mut bank = make_bank();
    let cab = bank.add_cab("cab-a", 2).unwrap();

    assert_eq!(bank.snapshot(cab).unwrap().state, Some(ElevatorState::Waiting));
    bank.tick(); // Waiting's routine installs the button handler.

    assert_eq!(bank.level(cab).unwrap(), 2);
    assert!(!bank.is_moving(cab).unwrap());
}

// ===========================================================================
// Test 2: a button press moves the cab one level over several ticks
// ===========================================================================

#[test]
fn press_up_travels_one_level() {
    let mut bank = make_bank();
    let cab = bank.add_cab("cab-a", 0).unwrap();
    bank.tick();

    assert!(bank.press(cab, ElevatorInput::Up).unwrap());
    // Transition to Moving is synchronous; travel starts at the next tick.
    assert_eq!(bank.snapshot(cab).unwrap().state, Some(ElevatorState::Moving));
    assert_eq!(bank.level(cab).unwrap(), 0);
    assert!(!bank.is_moving(cab).unwrap());

    bank.tick(); // Moving's first slice engages travel.
    assert!(bank.is_moving(cab).unwrap());
    let snap = bank.snapshot(cab).unwrap();
    assert_eq!(snap.substate.as_deref(), Some("to level 1"));

    // ticks_per_level = 4: arrival happens on the 4th travel tick.
    for _ in 0..3 {
        assert_eq!(bank.level(cab).unwrap(), 0);
        bank.tick();
    }
    bank.tick();

    assert_eq!(bank.level(cab).unwrap(), 1);
    assert!(!bank.is_moving(cab).unwrap(), "exit hook clears the flag");
    assert_eq!(bank.snapshot(cab).unwrap().state, Some(ElevatorState::Waiting));
}

// ===========================================================================
// Test 3: presses while moving are dropped
// ===========================================================================

#[test]
fn press_while_moving_is_ignored() {
    let mut bank = make_bank();
    let cab = bank.add_cab("cab-a", 0).unwrap();
    bank.tick();

    assert!(bank.press(cab, ElevatorInput::Up).unwrap());
    bank.tick();
    assert!(bank.is_moving(cab).unwrap());

    // Moving installs no event handler: the press is silently dropped.
    assert!(!bank.press(cab, ElevatorInput::Up).unwrap());

    // Travel completes unaffected, one level only.
    for _ in 0..8 {
        bank.tick();
    }
    assert_eq!(bank.level(cab).unwrap(), 1);
}

// ===========================================================================
// Test 4: presses at the end of the shaft bounce back to waiting
// ===========================================================================

#[test]
fn press_at_shaft_limit_returns_to_waiting() {
    let mut bank = make_bank();
    let cab = bank.add_cab("cab-a", 0).unwrap();
    bank.tick();

    assert!(bank.press(cab, ElevatorInput::Down).unwrap());
    assert_eq!(bank.snapshot(cab).unwrap().state, Some(ElevatorState::Moving));

    // Moving's first slice detects there is nowhere to go and bounces back;
    // the Waiting routine starts at the following drain.
    bank.tick();
    assert_eq!(bank.snapshot(cab).unwrap().state, Some(ElevatorState::Waiting));
    assert!(!bank.is_moving(cab).unwrap());
    assert_eq!(bank.level(cab).unwrap(), 0);

    // After the bounce the cab listens again.
    bank.tick();
    assert!(bank.press(cab, ElevatorInput::Up).unwrap());
}

// ===========================================================================
// Test 5: an external halt mid-travel fires the exit hook once
// ===========================================================================

#[test]
fn halt_mid_travel_clears_motion_flag() {
    let mut bank = make_bank();
    let cab = bank.add_cab("cab-a", 0).unwrap();
    bank.tick();
    bank.press(cab, ElevatorInput::Up).unwrap();
    bank.tick();
    assert!(bank.is_moving(cab).unwrap());

    // Out-of-band stop: park the cab without ever starting Waiting.
    bank.engine_mut()
        .go_and_stop(cab, ElevatorState::Waiting, None)
        .unwrap();

    assert!(!bank.is_moving(cab).unwrap(), "exit hook ran exactly once");
    assert_eq!(bank.level(cab).unwrap(), 0, "travel never completed");
    let snap = bank.snapshot(cab).unwrap();
    assert_eq!(snap.state, Some(ElevatorState::Waiting));
    assert!(!snap.pending_start);

    // Parked this way the cab has no handler; presses are dropped.
    bank.tick();
    assert!(!bank.press(cab, ElevatorInput::Up).unwrap());
}

// ===========================================================================
// Test 6: initial level is clamped to the shaft
// ===========================================================================

#[test]
fn initial_level_is_clamped() {
    let mut bank = make_bank();
    let cab = bank.add_cab("cab-a", 99).unwrap();
    assert_eq!(bank.level(cab).unwrap(), 5);
}

// ===========================================================================
// Test 7: removing a cab withdraws its pending start
// ===========================================================================

#[test]
fn removed_cab_never_starts() {
    let mut bank = make_bank();
    let cab = bank.add_cab("cab-a", 0).unwrap();
    assert!(bank.remove_cab(cab));

    let result = bank.tick();
    assert_eq!(result.starts_run, 0);
    assert!(bank.level(cab).is_err());
}

// ===========================================================================
// Test 8: two cabs travel independently
// ===========================================================================

#[test]
fn two_cabs_travel_independently() {
    let mut bank = make_bank();
    let a = bank.add_cab("cab-a", 0).unwrap();
    let b = bank.add_cab("cab-b", 3).unwrap();
    bank.tick();

    bank.press(a, ElevatorInput::Up).unwrap();
    bank.press(b, ElevatorInput::Down).unwrap();
    for _ in 0..8 {
        bank.tick();
    }

    assert_eq!(bank.level(a).unwrap(), 1);
    assert_eq!(bank.level(b).unwrap(), 2);
    assert!(!bank.is_moving(a).unwrap());
    assert!(!bank.is_moving(b).unwrap());
}

// ===========================================================================
// Test 9: the state timer spans the whole stay in a state
// ===========================================================================

#[test]
fn state_time_tracks_the_stay() {
    let mut bank = make_bank();
    let cab = bank.add_cab("cab-a", 0).unwrap();
    bank.tick();
    bank.tick();

    let waited = bank.snapshot(cab).unwrap().state_time;
    assert_eq!(waited, 2);

    bank.press(cab, ElevatorInput::Up).unwrap();
    // The timer restarts at the transition call, before Moving's routine
    // has even started.
    assert_eq!(bank.snapshot(cab).unwrap().state_time, 0);
    bank.tick();
    assert_eq!(bank.snapshot(cab).unwrap().state_time, 1);
}
