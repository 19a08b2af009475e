//! Shared simulated deck and protocol builders.

mod abort_path;
mod arbiter_exclusion;
mod end_to_end;
mod geometry_properties;
mod pooled_wells;
mod retry_convergence;
mod single_tip_fallback;
mod source_unload;
mod stage_contention;
mod tip_handling;

use bee_common::config::ConfigLoader;
use bee_common::deck::DeckConfig;
use bee_hal::deck::SimulatedAxes;
use bee_hal::Deck;
use bee_transfer::config::Protocol;
use bee_transfer::escalation::ErrorEscalation;
use bee_transfer::state::TipAssignment;
use bee_transfer::{
    AbortSignal, ResourceArbiter, RunReport, Scheduler, SchedulerError, SimulatedPlateHandler,
    TransferContext, load_protocol_from_str,
};
use std::fmt::Write;

/// Two channels 9 mm apart over two stages. Stage 2 sits 1 mm lower.
pub const DECK_TOML: &str = r#"
[shared]
service_name = "bumblebee-test"

[deck]
z_safe = 0.0
poll_interval_ms = 1

[[channels]]
id = 1
x_home = 5.0

[[channels]]
id = 2
x_home = 5.0

[[stages]]
id = 1
robot_teachpoint_y = 250.0

[[stages]]
id = 2
robot_teachpoint_y = 250.0

[[teachpoints]]
channel = 1
stage = 1
upper_left = { x = 100.0, y = 80.0, z = 60.0 }
lower_right = { x = 220.0, y = 160.0, z = 60.0 }

[[teachpoints]]
channel = 2
stage = 1
upper_left = { x = 100.0, y = 89.0, z = 60.0 }
lower_right = { x = 220.0, y = 169.0, z = 60.0 }

[[teachpoints]]
channel = 1
stage = 2
upper_left = { x = 300.0, y = 80.0, z = 61.0 }
lower_right = { x = 420.0, y = 160.0, z = 61.0 }

[[teachpoints]]
channel = 2
stage = 2
upper_left = { x = 300.0, y = 89.0, z = 61.0 }
lower_right = { x = 420.0, y = 169.0, z = 61.0 }
"#;

/// `DECK_TOML` with `handling` after every transfer and a tip station at x = 20.
pub fn deck_with_tips(handling: &str) -> String {
    let mut toml = DECK_TOML.replace(
        "poll_interval_ms = 1",
        &format!("poll_interval_ms = 1\ntip_handling = \"{handling}\""),
    );
    toml.push_str("\n[tip_station]\nx = 20.0\nz_wash = 30.0\nz_shuck = 35.0\nz_press = 38.0\n");
    toml
}

const CATALOG_TOML: &str = r#"
[[labware]]
name = "plate96"
wells = 96
thickness = 14.4
well_depth = 10.9

[[labware]]
name = "plate384"
wells = 384
thickness = 14.4
well_depth = 10.9

[[liquid_profiles]]
name = "water"
rate_to_aspirate = 100.0
rate_to_dispense = 200.0
pre_aspirate_volume = 5.0
time_to_enter_liquid = 0.5
time_to_exit_liquid = 0.5
"#;

/// Plunger target at the end of a 50 µl aspirate with the 5 µl pre-stroke.
pub const W_ASPIRATE_END_50UL: f64 = 55.0;

/// Z target of `MoveIntoSource` over stage 2: 61 - (3.5 well bottom + 1.0).
pub const Z_INTO_SOURCE_STAGE2: f64 = 56.5;

/// Protocol text with one `[[transfers]]` per `(source, source_well, destination, destination_well)`.
///
/// Source plates use `source_labware`, destination plates `dest_labware`.
pub fn protocol_toml(
    source_labware: &str,
    dest_labware: &str,
    transfers: &[(&str, &str, &str, &str)],
) -> String {
    let mut toml = CATALOG_TOML.to_string();
    let mut sources: Vec<&str> = Vec::new();
    let mut destinations: Vec<&str> = Vec::new();
    for (source, _, destination, _) in transfers {
        if !sources.contains(source) {
            sources.push(source);
        }
        if !destinations.contains(destination) {
            destinations.push(destination);
        }
    }
    for barcode in sources {
        writeln!(toml, "[[source_plates]]\nbarcode = \"{barcode}\"\nlabware = \"{source_labware}\"\n").unwrap();
    }
    for barcode in destinations {
        writeln!(toml, "[[destination_plates]]\nbarcode = \"{barcode}\"\nlabware = \"{dest_labware}\"\n").unwrap();
    }
    for (source, source_well, destination, destination_well) in transfers {
        writeln!(
            toml,
            "[[transfers]]\nsource = \"{source}\"\nsource_well = \"{source_well}\"\n\
             destination = \"{destination}\"\ndestination_wells = [\"{destination_well}\"]\n\
             volume = 50.0\nliquid_profile = \"water\"\n"
        )
        .unwrap();
    }
    toml
}

/// Simulated deck, arbiter, plate handler and a parsed protocol.
pub struct Rig {
    pub deck: Deck,
    pub axes: SimulatedAxes,
    pub arbiter: ResourceArbiter,
    pub handler: SimulatedPlateHandler,
    pub protocol: Protocol,
}

impl Rig {
    pub fn new(protocol: &str) -> Self {
        Self::with_deck(DECK_TOML, protocol)
    }

    pub fn with_deck(deck: &str, protocol: &str) -> Self {
        let config = DeckConfig::load_str(deck).unwrap();
        let (deck, axes) = Deck::simulated(&config).unwrap();
        let arbiter = ResourceArbiter::for_deck(&deck, AbortSignal::new());
        Self {
            deck,
            axes,
            arbiter,
            handler: SimulatedPlateHandler::new(),
            protocol: load_protocol_from_str(protocol).unwrap(),
        }
    }

    pub fn ctx<'a>(&'a self, escalation: &'a dyn ErrorEscalation) -> TransferContext<'a> {
        TransferContext {
            deck: &self.deck,
            arbiter: &self.arbiter,
            labware: &self.protocol.catalog,
            profiles: &self.protocol.catalog,
            escalation,
        }
    }

    pub fn run(&self, escalation: &dyn ErrorEscalation) -> Result<RunReport, SchedulerError> {
        Scheduler::new(self.ctx(escalation), &self.handler, &self.protocol).run()
    }

    /// Put every protocol plate on a stage directly: sources on stage 2,
    /// destinations on stage 1. For driving a state machine without the
    /// schedulers.
    pub fn seat_plates(&self) {
        let source = self.protocol.source_plates[0].clone();
        let dest = self.protocol.destination_plates[0].plate().clone();
        self.arbiter.set_loaded(2, Some(source)).unwrap();
        self.arbiter.set_loaded(1, Some(dest)).unwrap();
    }

    /// Every protocol transfer on consecutive channels, source stage 2,
    /// destination stage 1. Destination wells must be explicit.
    pub fn assignment(&self, angle: f64) -> TipAssignment {
        let transfers = self
            .protocol
            .transfers
            .iter()
            .map(|t| t.with_destination(t.primary_destination().well().unwrap()))
            .collect::<Vec<_>>();
        TipAssignment {
            channels: (1..=transfers.len() as u8).collect(),
            transfers,
            source_stage: 2,
            dest_stage: 1,
            source_angle: angle,
            dest_angle: angle,
        }
    }
}
