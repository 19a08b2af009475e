//! Full protocol runs through the schedulers and a single state machine.

use super::{Rig, protocol_toml};
use bee_common::plate::WellUsage;
use bee_common::wells::Well;
use bee_transfer::arbiter::StageStatus;
use bee_transfer::escalation::AutoRetry;
use bee_transfer::plate_handler::PlateEvent;
use bee_transfer::state::State;
use bee_transfer::TransferStateMachine;

fn well(name: &str) -> Well {
    name.parse().unwrap()
}

#[test]
fn adjacent_wells_run_as_one_dual_transfer() {
    let rig = Rig::new(&protocol_toml(
        "plate96",
        "plate96",
        &[("SRC", "A1", "DST", "A1"), ("SRC", "A2", "DST", "A2")],
    ));
    let escalation = AutoRetry::new();
    let report = rig.run(&escalation).unwrap();

    assert_eq!(report.assignments.len(), 1);
    let run = &report.assignments[0];
    assert!(run.is_dual());
    assert_eq!(run.channels, vec![1, 2]);
    assert_eq!(run.transfer_ids, vec![0, 1]);
    assert!((run.source_angle + 90.0).abs() < 1e-3);
    assert_eq!(run.dispensed, vec![well("A1"), well("A2")]);
    assert_eq!(report.transfers_done(), 2);
    assert_eq!(escalation.count(), 0);

    let dest = report.destination("DST").unwrap();
    for name in ["A1", "A2"] {
        assert_eq!(
            dest.history_of(&well(name)),
            vec![WellUsage::Unused, WellUsage::Reserved, WellUsage::Used]
        );
    }
    assert_eq!(dest.usage(&well("A3")), WellUsage::Unused);
}

#[test]
fn plates_are_delivered_and_retrieved_in_order() {
    let rig = Rig::new(&protocol_toml(
        "plate96",
        "plate96",
        &[("SRC", "A1", "DST", "A1"), ("SRC", "A2", "DST", "A2")],
    ));
    rig.run(&AutoRetry::new()).unwrap();

    let events = rig.handler.events();
    assert_eq!(
        events,
        vec![
            PlateEvent::Delivered { barcode: "DST".into(), stage: 1 },
            PlateEvent::Delivered { barcode: "SRC".into(), stage: 2 },
            PlateEvent::Retrieved { barcode: "SRC".into(), stage: 2 },
            PlateEvent::Retrieved { barcode: "DST".into(), stage: 1 },
        ]
    );
    for stage in [1, 2] {
        assert_eq!(rig.arbiter.stage_status(stage), Some(StageStatus::Free));
        assert_eq!(rig.arbiter.loaded_plate(stage), None);
        assert_eq!(rig.arbiter.holders(stage), 0);
    }
    assert!(rig.arbiter.busy_channels().is_empty());

    // channels parked after the destination
    for id in [1, 2] {
        let channel = rig.deck.channel(id).unwrap();
        assert_eq!(channel.z().position(), 0.0);
        assert_eq!(channel.x().position(), 5.0);
    }
}

#[test]
fn any_wells_are_filled_first_available() {
    let rig = Rig::new(&protocol_toml(
        "plate96",
        "plate96",
        &[
            ("SRC", "A1", "DST", "any"),
            ("SRC", "A2", "DST", "any"),
            ("SRC", "A3", "DST", "any"),
        ],
    ));
    let report = rig.run(&AutoRetry::new()).unwrap();

    assert_eq!(report.transfers_done(), 3);
    let dest = report.destination("DST").unwrap();
    for name in ["A1", "A2", "A3"] {
        assert_eq!(dest.usage(&well(name)), WellUsage::Used);
    }
    assert_eq!(dest.first_available_well(), Some(well("A4")));
}

#[test]
fn state_machine_walks_the_happy_path() {
    let rig = Rig::new(&protocol_toml(
        "plate96",
        "plate96",
        &[("SRC", "A1", "DST", "A1"), ("SRC", "A2", "DST", "A2")],
    ));
    rig.seat_plates();
    let escalation = AutoRetry::new();
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();
    machine.run().unwrap();

    use State::*;
    assert_eq!(
        machine.history(),
        &[
            Initialize,
            TipsOn,
            MoveToSourceYR,
            MoveToSource,
            MoveIntoSource,
            Aspirate,
            MoveOutOfSource,
            MoveFromSource,
            LockDestPlate,
            MoveToDestYR,
            MoveToDest,
            MoveIntoDest,
            Dispense,
            MoveOutOfDest,
            MoveFromDest,
            UnlockDestPlate,
            RunTipHandling,
            Done,
        ]
    );
    assert_eq!(machine.state(), Done);
    assert_eq!(machine.dispensed_wells(), &[well("A1"), well("A2")]);
    assert!(rig.arbiter.is_stage_available(1));
    assert!(rig.arbiter.is_stage_available(2));
    for id in [1, 2] {
        let channel = rig.deck.channel(id).unwrap();
        assert_eq!(channel.z().position(), 0.0);
        // 5 µl pre-stroke, nothing taken back after dispense
        assert_eq!(channel.w().position(), 5.0);
    }
}
