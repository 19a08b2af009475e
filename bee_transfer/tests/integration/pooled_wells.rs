//! Several transfers pooling into one destination well, and transfers
//! naming more than one destination well.

use super::{Rig, protocol_toml};
use bee_common::plate::WellUsage;
use bee_common::wells::Well;
use bee_transfer::escalation::AutoRetry;

fn well(name: &str) -> Well {
    name.parse().unwrap()
}

#[test]
fn pooled_well_takes_a_later_transfer() {
    let rig = Rig::new(&protocol_toml(
        "plate96",
        "plate96",
        &[
            ("SRC", "A1", "DST", "C3"),
            ("SRC", "A2", "DST", "C4"),
            ("SRC", "A3", "DST", "C3"),
        ],
    ));
    let escalation = AutoRetry::new();
    let report = rig.run(&escalation).unwrap();

    assert_eq!(report.transfers_done(), 3);
    assert_eq!(escalation.count(), 0);
    let dest = report.destination("DST").unwrap();
    assert_eq!(
        dest.history_of(&well("C3")),
        vec![WellUsage::Unused, WellUsage::Reserved, WellUsage::Used]
    );
    assert_eq!(dest.usage(&well("C4")), WellUsage::Used);
    let into_c3 = report
        .assignments
        .iter()
        .flat_map(|a| &a.dispensed)
        .filter(|&&w| w == well("C3"))
        .count();
    assert_eq!(into_c3, 2);
}

#[test]
fn pooled_transfers_wait_for_each_other() {
    let rig = Rig::new(&protocol_toml(
        "plate96",
        "plate96",
        &[("SRC", "A1", "DST", "C3"), ("SRC", "H12", "DST", "C3")],
    ));
    let report = rig.run(&AutoRetry::new()).unwrap();

    assert_eq!(report.transfers_done(), 2);
    assert_eq!(report.assignments.len(), 2);
    assert!(report.assignments.iter().all(|a| !a.is_dual()));
    let dest = report.destination("DST").unwrap();
    assert_eq!(dest.usage(&well("C3")), WellUsage::Used);
}

#[test]
fn every_named_destination_well_is_used() {
    let protocol = protocol_toml("plate96", "plate96", &[("SRC", "A1", "DST", "B1")])
        .replace(r#"destination_wells = ["B1"]"#, r#"destination_wells = ["B1", "B2"]"#);
    let rig = Rig::new(&protocol);
    let report = rig.run(&AutoRetry::new()).unwrap();

    assert_eq!(report.transfers_done(), 1);
    assert_eq!(report.assignments[0].dispensed, vec![well("B1"), well("B2")]);
    let dest = report.destination("DST").unwrap();
    for name in ["B1", "B2"] {
        assert_eq!(
            dest.history_of(&well(name)),
            vec![WellUsage::Unused, WellUsage::Reserved, WellUsage::Used]
        );
    }
    assert_eq!(dest.usage(&well("B3")), WellUsage::Unused);
}
