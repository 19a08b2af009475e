//! Wells closer than the tip spacing go out one tip at a time.

use super::{Rig, protocol_toml};
use bee_common::plate::WellUsage;
use bee_common::wells::Well;
use bee_transfer::escalation::AutoRetry;

#[test]
fn close_384_wells_run_single_tip() {
    let rig = Rig::new(&protocol_toml(
        "plate384",
        "plate384",
        &[
            ("SRC", "A1", "DST", "A1"),
            ("SRC", "A2", "DST", "A2"),
            ("SRC", "B1", "DST", "B1"),
        ],
    ));
    let report = rig.run(&AutoRetry::new()).unwrap();

    assert_eq!(report.assignments.len(), 3);
    assert!(report.assignments.iter().all(|a| !a.is_dual()));
    assert!(
        report
            .assignments
            .iter()
            .all(|a| a.source_angle == 0.0 && a.dest_angle == 0.0)
    );
    let mut ids: Vec<usize> = report
        .assignments
        .iter()
        .flat_map(|a| a.transfer_ids.clone())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2]);

    let dest = report.destination("DST").unwrap();
    for name in ["A1", "A2", "B1"] {
        let well: Well = name.parse().unwrap();
        assert_eq!(dest.usage(&well), WellUsage::Used);
    }
}

#[test]
fn wells_one_tip_spacing_apart_pair_up() {
    // A1 and A3 on a 384 plate are exactly 9 mm apart
    let rig = Rig::new(&protocol_toml(
        "plate384",
        "plate384",
        &[("SRC", "A1", "DST", "A1"), ("SRC", "A3", "DST", "A3")],
    ));
    let report = rig.run(&AutoRetry::new()).unwrap();

    assert_eq!(report.assignments.len(), 1);
    assert!(report.assignments[0].is_dual());
    assert_eq!(report.transfers_done(), 2);
}
