//! Faults on a move: operator retries, short-circuit retries and reissues.

use super::{Rig, W_ASPIRATE_END_50UL, Z_INTO_SOURCE_STAGE2, protocol_toml};
use bee_transfer::TransferStateMachine;
use bee_transfer::escalation::AutoRetry;
use bee_transfer::state::State;

fn dual_rig() -> Rig {
    let rig = Rig::new(&protocol_toml(
        "plate96",
        "plate96",
        &[("SRC", "A1", "DST", "A1"), ("SRC", "A2", "DST", "A2")],
    ));
    rig.seat_plates();
    rig
}

#[test]
fn aspirate_converges_after_two_retries() {
    let rig = dual_rig();
    rig.axes["ch1.w"].fail_moves_to(W_ASPIRATE_END_50UL, 2, "following error");
    let escalation = AutoRetry::new();
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    machine.run().unwrap();

    assert_eq!(machine.state(), State::Done);
    assert_eq!(machine.entries(State::Aspirate), 3);
    assert_eq!(machine.entries(State::AspirateError), 2);
    assert_eq!(escalation.count(), 2);
    assert_eq!(rig.axes["ch1.w"].fault(), None);
    assert_eq!(machine.dispensed_wells().len(), 2);
}

#[test]
fn short_circuit_retries_without_the_operator() {
    let rig = dual_rig();
    rig.axes["ch1.w"].fail_moves_to(W_ASPIRATE_END_50UL, 1, "Short-circuit on plunger");
    let escalation = AutoRetry::new();
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    machine.run().unwrap();

    assert_eq!(machine.entries(State::Aspirate), 2);
    assert_eq!(machine.entries(State::AspirateError), 1);
    assert_eq!(escalation.count(), 0);
}

#[test]
fn short_circuit_on_z_entry_is_reissued_in_place() {
    let rig = dual_rig();
    rig.axes["ch1.z"].fail_moves_to(Z_INTO_SOURCE_STAGE2, 1, "Short-circuit on Z");
    let escalation = AutoRetry::new();
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    machine.run().unwrap();

    assert_eq!(machine.entries(State::MoveIntoSource), 1);
    assert_eq!(machine.entries(State::MoveIntoSourceError), 0);
    assert_eq!(escalation.count(), 0);
}

#[test]
fn retry_limit_turns_into_abort() {
    let rig = dual_rig();
    rig.axes["ch2.w"].fail_moves_to(W_ASPIRATE_END_50UL, 5, "following error");
    let escalation = AutoRetry::with_limit(1);
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    let err = machine.run().unwrap_err();

    assert!(matches!(
        err,
        bee_transfer::TransferError::Aborted(State::AspirateError)
    ));
    assert_eq!(machine.state(), State::Aborted);
    assert_eq!(escalation.count(), 2);
    assert!(machine.dispensed_wells().is_empty());
}
