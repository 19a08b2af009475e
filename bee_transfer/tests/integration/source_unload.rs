//! Source plates stay loaded while any worker holds them.

use super::{Rig, protocol_toml};
use bee_transfer::escalation::AutoRetry;
use bee_transfer::plate_handler::PlateEvent;

fn position(events: &[PlateEvent], wanted: &PlateEvent) -> usize {
    events
        .iter()
        .position(|e| e == wanted)
        .unwrap_or_else(|| panic!("missing {wanted:?} in {events:?}"))
}

#[test]
fn single_source_is_unloaded_once() {
    let rig = Rig::new(&protocol_toml(
        "plate96",
        "plate96",
        &[
            ("SRC", "A1", "DST", "A1"),
            ("SRC", "A2", "DST", "A2"),
            ("SRC", "B1", "DST", "B1"),
            ("SRC", "B2", "DST", "B2"),
            ("SRC", "C1", "DST", "C1"),
        ],
    ));
    let report = rig.run(&AutoRetry::new()).unwrap();
    assert_eq!(report.transfers_done(), 5);

    let events = rig.handler.events();
    let retrieved = events
        .iter()
        .filter(|e| matches!(e, PlateEvent::Retrieved { barcode, .. } if barcode == "SRC"))
        .count();
    assert_eq!(retrieved, 1);
    assert_eq!(rig.arbiter.holders(2), 0);
}

#[test]
fn sources_share_the_free_stage_in_turn() {
    let rig = Rig::new(&protocol_toml(
        "plate96",
        "plate96",
        &[
            ("SRC1", "A1", "DST", "A1"),
            ("SRC1", "A2", "DST", "A2"),
            ("SRC2", "A1", "DST", "B1"),
            ("SRC2", "A2", "DST", "B2"),
        ],
    ));
    let report = rig.run(&AutoRetry::new()).unwrap();
    assert_eq!(report.transfers_done(), 4);

    let events = rig.handler.events();
    let span = |barcode: &str| {
        let delivered = position(
            &events,
            &PlateEvent::Delivered {
                barcode: barcode.into(),
                stage: 2,
            },
        );
        let retrieved = position(
            &events,
            &PlateEvent::Retrieved {
                barcode: barcode.into(),
                stage: 2,
            },
        );
        assert!(delivered < retrieved);
        (delivered, retrieved)
    };
    let (first, second) = (span("SRC1"), span("SRC2"));
    // one free stage: the second source waits for the first to leave
    assert!(first.1 < second.0 || second.1 < first.0);

    let dest_retrieved = position(
        &events,
        &PlateEvent::Retrieved {
            barcode: "DST".into(),
            stage: 1,
        },
    );
    assert_eq!(dest_retrieved, events.len() - 1);
}
