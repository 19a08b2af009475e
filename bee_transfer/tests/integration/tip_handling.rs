//! Tip press and wash cycles, and the recovery each firmware status asks for.

use super::{Rig, deck_with_tips, protocol_toml};
use bee_common::axis::Axis;
use bee_transfer::TransferStateMachine;
use bee_transfer::escalation::AutoRetry;
use bee_transfer::state::State;

fn dual_rig(handling: &str) -> Rig {
    let rig = Rig::with_deck(
        &deck_with_tips(handling),
        &protocol_toml(
            "plate96",
            "plate96",
            &[("SRC", "A1", "DST", "A1"), ("SRC", "A2", "DST", "A2")],
        ),
    );
    rig.seat_plates();
    rig
}

fn calls(rig: &Rig, function: &str) -> usize {
    ["ch1.w", "ch2.w"]
        .iter()
        .map(|axis| rig.axes[*axis].function_calls(function))
        .sum()
}

#[test]
fn change_presses_fresh_tips_once_per_transfer() {
    let rig = Rig::with_deck(
        &deck_with_tips("change"),
        &protocol_toml(
            "plate96",
            "plate96",
            &[
                ("SRC", "A1", "DST", "A1"),
                ("SRC", "A2", "DST", "A2"),
                ("SRC", "D7", "DST", "D7"),
            ],
        ),
    );
    let escalation = AutoRetry::new();
    let report = rig.run(&escalation).unwrap();

    assert_eq!(report.transfers_done(), 3);
    assert_eq!(calls(&rig, "press_tip"), 3);
    assert_eq!(calls(&rig, "change_tip"), 3);
    assert_eq!(calls(&rig, "wash_tip"), 0);
    assert_eq!(escalation.count(), 0);
}

#[test]
fn wash_never_presses_tips() {
    let rig = dual_rig("wash");
    let escalation = AutoRetry::new();
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    machine.run().unwrap();

    assert_eq!(calls(&rig, "press_tip"), 0);
    assert_eq!(calls(&rig, "wash_tip"), 2);
}

#[test]
fn failed_press_is_retried_from_tips_on() {
    let rig = dual_rig("change");
    rig.axes["ch1.w"].script_function("press_tip", [-1]);
    let escalation = AutoRetry::new();
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    machine.run().unwrap();

    assert_eq!(machine.state(), State::Done);
    assert_eq!(machine.entries(State::TipsOnError), 1);
    assert_eq!(machine.entries(State::TipsOn), 2);
    assert_eq!(escalation.count(), 1);
    assert_eq!(rig.axes["ch1.w"].function_calls("press_tip"), 2);
    assert_eq!(machine.dispensed_wells().len(), 2);
}

#[test]
fn open_door_is_reclosed_before_the_retry() {
    let rig = dual_rig("wash");
    rig.axes["ch1.w"].script_function("wash_tip", [-4]);
    let escalation = AutoRetry::new();
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    machine.run().unwrap();

    assert_eq!(machine.state(), State::Done);
    assert_eq!(machine.entries(State::RunTipHandlingError), 1);
    assert_eq!(escalation.count(), 1);
    assert_eq!(calls(&rig, "close_door"), 2);
    assert_eq!(rig.axes["ch1.w"].function_calls("wash_tip"), 2);
}

#[test]
fn door_that_stays_open_is_put_to_the_operator_again() {
    let rig = dual_rig("wash");
    rig.axes["ch1.w"].script_function("wash_tip", [-4]);
    rig.axes["ch1.w"].script_function("close_door", [-4]);
    let escalation = AutoRetry::new();
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    machine.run().unwrap();

    assert_eq!(machine.entries(State::RunTipHandlingError), 1);
    assert_eq!(escalation.count(), 2);
    assert_eq!(rig.axes["ch1.w"].function_calls("close_door"), 2);
}

#[test]
fn imbalance_waits_for_spin_down_without_touching_the_door() {
    let rig = dual_rig("wash");
    rig.axes["ch2.w"].script_function("wash_tip", [-5]);
    let escalation = AutoRetry::new();
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    machine.run().unwrap();

    assert_eq!(machine.state(), State::Done);
    assert_eq!(machine.entries(State::RunTipHandlingError), 1);
    assert_eq!(escalation.count(), 1);
    assert_eq!(calls(&rig, "close_door"), 0);
    assert!(rig.axes["ch2.w"].motion_complete());
}

#[test]
fn still_moving_past_the_retry_limit_escalates_once() {
    let rig = dual_rig("wash");
    // first call plus five automatic retries
    rig.axes["ch1.w"].script_function("wash_tip", [-3; 6]);
    let escalation = AutoRetry::new();
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    machine.run().unwrap();

    assert_eq!(machine.entries(State::RunTipHandlingError), 1);
    assert_eq!(escalation.count(), 1);
    assert_eq!(rig.axes["ch1.w"].function_calls("wash_tip"), 7);
    assert_eq!(calls(&rig, "close_door"), 0);
}

#[test]
fn not_homed_is_a_plain_retry() {
    let rig = dual_rig("wash");
    rig.axes["ch1.w"].script_function("wash_tip", [-1]);
    let escalation = AutoRetry::new();
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    machine.run().unwrap();

    assert_eq!(machine.entries(State::RunTipHandlingError), 1);
    assert_eq!(escalation.count(), 1);
    assert_eq!(calls(&rig, "close_door"), 0);
}
