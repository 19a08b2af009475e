//! Property tests: set points computed from sane labware and profiles
//! always pass the ordering checks.

use bee_common::labware::{Calibration, Labware, LiquidProfile};
use bee_common::plate::{PlateRef, Transfer, VolumeUnits};
use bee_common::wells::{LabwareFormat, WellSpec};
use bee_transfer::state::{ChannelGeometry, GeometryInput};
use proptest::prelude::*;

fn labware(thickness: f64, depth_fraction: f64) -> Labware {
    Labware {
        name: "plate".to_string(),
        format: LabwareFormat::Wells96,
        thickness,
        well_depth: thickness * depth_fraction,
    }
}

fn profile(pre: f64, post_fraction: f64, z_asp: f64, z_disp: f64) -> LiquidProfile {
    LiquidProfile {
        name: "water".to_string(),
        rate_to_aspirate: 100.0,
        rate_to_dispense: 150.0,
        max_accel_during_aspirate: 100.0,
        max_accel_during_dispense: 100.0,
        post_aspirate_delay_s: 0.0,
        post_dispense_delay_s: 0.0,
        pre_aspirate_volume: pre,
        post_dispense_volume: pre * post_fraction,
        z_move_during_aspirating: z_asp,
        z_move_during_dispensing: z_disp,
        time_to_enter_liquid: 0.5,
        time_to_exit_liquid: 0.5,
        calibration: Calibration::default(),
    }
}

fn transfer(volume: f64, asp_fraction: f64, disp_fraction: f64, source: &Labware, dest: &Labware) -> Transfer {
    let plate = PlateRef {
        barcode: "P".to_string(),
        labware: "plate".to_string(),
    };
    Transfer {
        id: 0,
        source: plate.clone(),
        source_well: "A1".parse().unwrap(),
        destination: plate,
        destination_wells: vec![WellSpec::Any],
        volume,
        units: VolumeUnits::Ul,
        liquid_profile: "water".to_string(),
        aspirate_distance_mm: source.well_depth * asp_fraction,
        dispense_distance_mm: dest.well_depth * disp_fraction,
    }
}

proptest! {
    #[test]
    fn sane_inputs_give_ordered_set_points(
        source_thickness in 5.0f64..25.0,
        dest_thickness in 5.0f64..25.0,
        source_depth in 0.1f64..0.95,
        dest_depth in 0.1f64..0.95,
        asp in 0.0f64..1.0,
        disp in 0.0f64..1.0,
        volume in 0.5f64..200.0,
        pre in 0.0f64..20.0,
        post in 0.0f64..1.0,
        z_asp in 0.0f64..5.0,
        z_disp in 0.0f64..5.0,
    ) {
        let source = labware(source_thickness, source_depth);
        let dest = labware(dest_thickness, dest_depth);
        let profile = profile(pre, post, z_asp, z_disp);
        let transfer = transfer(volume, asp, disp, &source, &dest);

        let g = ChannelGeometry::compute(GeometryInput {
            channel: 1,
            transfer: &transfer,
            source: &source,
            destination: &dest,
            profile: &profile,
            z_source_teachpoint: 60.0,
            z_dest_teachpoint: 61.0,
        })
        .unwrap();

        prop_assert!(g.z_source_clearance >= g.z_aspirate_begin);
        prop_assert!(g.z_aspirate_begin >= g.z_aspirate_end);
        prop_assert!(g.z_dest_clearance >= g.z_dispense_end);
        prop_assert!(g.z_dispense_end >= g.z_dispense_begin);
        prop_assert!(g.z_clear_between >= g.z_source_clearance.min(g.z_dest_clearance));
        prop_assert!(g.w_dispense_end >= 0.0);
        prop_assert!((g.w_aspirate_end - g.w_aspirate_begin - volume).abs() < 1e-9);
    }

    #[test]
    fn z_follows_the_plunger_during_aspirate(
        volume in 0.5f64..200.0,
        z_asp in 0.01f64..5.0,
    ) {
        let source = labware(14.4, 0.75);
        let profile = profile(5.0, 0.0, z_asp, 0.0);
        let transfer = transfer(volume, 0.1, 0.1, &source, &source);

        let g = ChannelGeometry::compute(GeometryInput {
            channel: 1,
            transfer: &transfer,
            source: &source,
            destination: &source,
            profile: &profile,
            z_source_teachpoint: 60.0,
            z_dest_teachpoint: 60.0,
        })
        .unwrap();

        // the Z travel takes exactly as long as the plunger stroke
        let stroke_time = volume / profile.rate_to_aspirate;
        let z_velocity = g.z_aspirate_velocity.unwrap();
        prop_assert!((z_velocity * stroke_time - z_asp).abs() < 1e-6);
        prop_assert_eq!(g.z_dispense_velocity, None);
    }
}
