//! Plates, destination well usage and transfer requests.
//!
//! A destination well moves `Unused → Reserved → Used` and never back.
//! `DestinationPlate` keeps every accepted transition in an append-only
//! history so callers can audit the sequence.

use crate::wells::{LabwareFormat, Well, WellSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Well usage on a destination plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WellUsage {
    Unused,
    Reserved,
    Used,
}

impl fmt::Display for WellUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlateError {
    #[error("plate {barcode}: well {well} cannot go from {from} to {to}")]
    IllegalTransition {
        barcode: String,
        well: Well,
        from: WellUsage,
        to: WellUsage,
    },

    #[error("plate {0} has no available well")]
    NoAvailableWell(String),

    #[error("plate {barcode}: {source}")]
    Well {
        barcode: String,
        #[source]
        source: crate::wells::WellError,
    },
}

/// Identity of a plate: barcode plus labware name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlateRef {
    pub barcode: String,
    pub labware: String,
}

impl fmt::Display for PlateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.barcode, self.labware)
    }
}

/// Source plates carry no per-well state.
pub type SourcePlate = PlateRef;

/// Destination plate with its well usage journal.
#[derive(Debug, Clone)]
pub struct DestinationPlate {
    plate: PlateRef,
    format: LabwareFormat,
    usage: HashMap<Well, WellUsage>,
    history: Vec<(Well, WellUsage)>,
}

impl DestinationPlate {
    pub fn new(plate: PlateRef, format: LabwareFormat) -> Self {
        Self {
            plate,
            format,
            usage: HashMap::new(),
            history: Vec::new(),
        }
    }

    pub fn plate(&self) -> &PlateRef {
        &self.plate
    }

    pub fn barcode(&self) -> &str {
        &self.plate.barcode
    }

    pub fn format(&self) -> LabwareFormat {
        self.format
    }

    /// Current usage of a well.
    pub fn usage(&self, well: &Well) -> WellUsage {
        self.usage.get(well).copied().unwrap_or(WellUsage::Unused)
    }

    /// Reserve a well for a transfer.
    ///
    /// Reserving an already reserved well is a no-op. Reserving a used well
    /// is an error.
    pub fn reserve(&mut self, well: Well) -> Result<(), PlateError> {
        self.ensure_on_plate(&well)?;
        match self.usage(&well) {
            WellUsage::Unused => {
                self.record(well, WellUsage::Reserved);
                Ok(())
            }
            WellUsage::Reserved => Ok(()),
            WellUsage::Used => Err(self.illegal(well, WellUsage::Used, WellUsage::Reserved)),
        }
    }

    /// Mark a reserved well as used once its dispense completed.
    pub fn mark_used(&mut self, well: Well) -> Result<(), PlateError> {
        self.ensure_on_plate(&well)?;
        match self.usage(&well) {
            WellUsage::Reserved => {
                self.record(well, WellUsage::Used);
                Ok(())
            }
            WellUsage::Used => Ok(()),
            WellUsage::Unused => Err(self.illegal(well, WellUsage::Unused, WellUsage::Used)),
        }
    }

    /// First unused well in row-major order.
    pub fn first_available_well(&self) -> Option<Well> {
        (0..self.format.well_count())
            .filter_map(|index| Well::from_index(self.format, index).ok())
            .find(|well| self.usage(well) == WellUsage::Unused)
    }

    /// Every accepted transition, oldest first.
    pub fn history(&self) -> &[(Well, WellUsage)] {
        &self.history
    }

    /// States a single well went through, starting from `Unused`.
    pub fn history_of(&self, well: &Well) -> Vec<WellUsage> {
        std::iter::once(WellUsage::Unused)
            .chain(
                self.history
                    .iter()
                    .filter(|(w, _)| w == well)
                    .map(|(_, usage)| *usage),
            )
            .collect()
    }

    fn record(&mut self, well: Well, usage: WellUsage) {
        self.usage.insert(well, usage);
        self.history.push((well, usage));
    }

    fn ensure_on_plate(&self, well: &Well) -> Result<(), PlateError> {
        well.ensure_fits(self.format).map_err(|source| PlateError::Well {
            barcode: self.plate.barcode.clone(),
            source,
        })
    }

    fn illegal(&self, well: Well, from: WellUsage, to: WellUsage) -> PlateError {
        PlateError::IllegalTransition {
            barcode: self.plate.barcode.clone(),
            well,
            from,
            to,
        }
    }
}

/// Unit of a transfer volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeUnits {
    #[default]
    Ul,
    Ml,
}

/// One source-well to destination-well liquid movement request.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    /// Position in the protocol, used for log correlation.
    pub id: usize,
    pub source: PlateRef,
    pub source_well: Well,
    pub destination: PlateRef,
    /// First entry is the well the tip dispenses into.
    pub destination_wells: Vec<WellSpec>,
    pub volume: f64,
    pub units: VolumeUnits,
    pub liquid_profile: String,
    /// Aspirate height above the source well bottom (mm).
    pub aspirate_distance_mm: f64,
    /// Dispense height above the destination well bottom (mm).
    pub dispense_distance_mm: f64,
}

impl Transfer {
    /// Volume in µl.
    pub fn volume_ul(&self) -> f64 {
        match self.units {
            VolumeUnits::Ul => self.volume,
            VolumeUnits::Ml => self.volume * 1000.0,
        }
    }

    /// Destination well spec the tip dispenses into.
    pub fn primary_destination(&self) -> WellSpec {
        self.destination_wells
            .first()
            .copied()
            .unwrap_or(WellSpec::Any)
    }

    /// Resolved destination well, `None` while it is still `any`.
    pub fn destination_well(&self) -> Option<Well> {
        self.primary_destination().well()
    }

    /// Copy of this transfer with the primary destination fixed to `well`.
    pub fn with_destination(&self, well: Well) -> Self {
        let mut resolved = self.clone();
        match resolved.destination_wells.first_mut() {
            Some(first) => *first = WellSpec::At(well),
            None => resolved.destination_wells.push(WellSpec::At(well)),
        }
        resolved
    }

    /// Every resolved destination well, primary first.
    pub fn resolved_destinations(&self) -> impl Iterator<Item = Well> + '_ {
        self.destination_wells.iter().filter_map(WellSpec::well)
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {}:{} -> {}:{} {}µl",
            self.id,
            self.source.barcode,
            self.source_well,
            self.destination.barcode,
            self.primary_destination(),
            self.volume_ul()
        )
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
