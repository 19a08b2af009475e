//! Property tests: well naming and plate rotation.

use bee_common::wells::{LabwareFormat, Well, angle_for_two_tips, xy_after_rotation};
use proptest::prelude::*;

fn any_format() -> impl Strategy<Value = LabwareFormat> {
    prop_oneof![
        Just(LabwareFormat::Wells48),
        Just(LabwareFormat::Wells96),
        Just(LabwareFormat::Wells384),
        Just(LabwareFormat::Wells1536),
    ]
}

proptest! {
    #[test]
    fn well_names_round_trip(format in any_format(), seed in any::<u32>()) {
        let well = Well::from_index(format, seed % format.well_count()).unwrap();
        let parsed: Well = well.to_string().parse().unwrap();
        prop_assert_eq!(parsed, well);
        prop_assert_eq!(parsed.index(format), seed % format.well_count());
    }

    #[test]
    fn rotation_preserves_distance_from_center(
        x in -60.0f64..60.0,
        y in -40.0f64..40.0,
        degrees in -180.0f64..180.0,
        clockwise in any::<bool>(),
    ) {
        let (xr, yr) = xy_after_rotation(x, y, degrees, clockwise);
        prop_assert!((x.hypot(y) - xr.hypot(yr)).abs() < 1e-9);
    }

    #[test]
    fn two_tip_solution_exists_iff_wells_are_far_enough(
        format in any_format(),
        i in any::<u32>(),
        j in any::<u32>(),
        spacing in 4.0f64..20.0,
    ) {
        let count = format.well_count();
        let w1 = Well::from_index(format, i % count).unwrap();
        let w2 = Well::from_index(format, j % count).unwrap();
        let distance = w1.distance_to(&w2, format);
        // stay clear of the tangent case where rounding decides
        prop_assume!((distance - spacing).abs() > 1e-3);

        let angle = angle_for_two_tips(format, &w1, &w2, 1, 2, spacing);
        prop_assert_eq!(angle.is_some(), distance > spacing);
    }
}
