//! Property test: destination well usage only ever moves forward.

use bee_common::plate::{DestinationPlate, PlateRef, WellUsage};
use bee_common::wells::{LabwareFormat, Well};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Reserve(u32),
    MarkUsed(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..12).prop_map(Op::Reserve),
        (0u32..12).prop_map(Op::MarkUsed),
    ]
}

proptest! {
    #[test]
    fn usage_sequence_is_a_subsequence_of_unused_reserved_used(
        ops in proptest::collection::vec(op(), 0..64)
    ) {
        let format = LabwareFormat::Wells96;
        let mut plate = DestinationPlate::new(
            PlateRef { barcode: "DST".into(), labware: "96".into() },
            format,
        );
        for op in ops {
            // rejected transitions leave the journal untouched
            let _ = match op {
                Op::Reserve(i) => plate.reserve(Well::from_index(format, i).unwrap()),
                Op::MarkUsed(i) => plate.mark_used(Well::from_index(format, i).unwrap()),
            };
        }

        for i in 0..12 {
            let well = Well::from_index(format, i).unwrap();
            let seen = plate.history_of(&well);
            let allowed = [
                vec![WellUsage::Unused],
                vec![WellUsage::Unused, WellUsage::Reserved],
                vec![WellUsage::Unused, WellUsage::Reserved, WellUsage::Used],
            ];
            prop_assert!(allowed.contains(&seen), "well {} saw {:?}", well, seen);
            prop_assert_eq!(*seen.last().unwrap(), plate.usage(&well));
        }
    }
}
