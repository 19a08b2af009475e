//! Labware definitions, liquid profiles and their read-only lookups.

use crate::wells::LabwareFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Lookup errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LabwareError {
    #[error("unknown labware '{0}'")]
    UnknownLabware(String),

    #[error("unknown liquid profile '{0}'")]
    UnknownLiquidProfile(String),

    /// Requested volume lies outside the calibration table.
    #[error("volume {volume} is outside the calibrated range [{min}, {max}]")]
    CalibrationOutOfRange { volume: f64, min: f64, max: f64 },
}

/// Physical plate definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labware {
    pub name: String,
    /// Number of wells, deserialized from the well count.
    #[serde(rename = "wells")]
    pub format: LabwareFormat,
    /// Height of the plate above the stage (mm).
    pub thickness: f64,
    /// Depth of each well from the plate top (mm).
    pub well_depth: f64,
}

impl Labware {
    /// Height of the well bottom above the stage (mm).
    pub fn well_bottom(&self) -> f64 {
        self.thickness - self.well_depth
    }
}

/// Piecewise-linear map from requested to commanded volume.
///
/// Points are kept sorted by requested volume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct Calibration {
    points: Vec<(f64, f64)>,
}

impl Calibration {
    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points.dedup_by(|a, b| a.0 == b.0);
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Output for `input`, interpolating between neighbouring points.
    ///
    /// The boolean is `true` when the value was interpolated rather than
    /// found in the table.
    pub fn output(&self, input: f64) -> Result<(f64, bool), LabwareError> {
        let out_of_range = || LabwareError::CalibrationOutOfRange {
            volume: input,
            min: self.points.first().map_or(f64::NAN, |p| p.0),
            max: self.points.last().map_or(f64::NAN, |p| p.0),
        };
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(out_of_range()),
        };
        if input < first.0 || input > last.0 {
            return Err(out_of_range());
        }

        let hi = self.points.partition_point(|p| p.0 < input);
        let (hi_in, hi_out) = self.points[hi];
        if hi_in == input {
            return Ok((hi_out, false));
        }
        let (lo_in, lo_out) = self.points[hi - 1];
        let ratio = (input - lo_in) / (hi_in - lo_in);
        Ok((lo_out + ratio * (hi_out - lo_out), true))
    }
}

impl From<Vec<(f64, f64)>> for Calibration {
    fn from(points: Vec<(f64, f64)>) -> Self {
        Self::new(points)
    }
}

impl From<Calibration> for Vec<(f64, f64)> {
    fn from(calibration: Calibration) -> Self {
        calibration.points
    }
}

/// Named parameter set governing aspirate and dispense for one liquid type.
///
/// Rates are µl/s, accelerations are a percentage of the plunger maximum,
/// delays and liquid entry/exit times are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidProfile {
    pub name: String,
    pub rate_to_aspirate: f64,
    pub rate_to_dispense: f64,
    #[serde(default = "full_accel")]
    pub max_accel_during_aspirate: f64,
    #[serde(default = "full_accel")]
    pub max_accel_during_dispense: f64,
    #[serde(default)]
    pub post_aspirate_delay_s: f64,
    #[serde(default)]
    pub post_dispense_delay_s: f64,
    #[serde(default)]
    pub pre_aspirate_volume: f64,
    #[serde(default)]
    pub post_dispense_volume: f64,
    #[serde(default)]
    pub z_move_during_aspirating: f64,
    #[serde(default)]
    pub z_move_during_dispensing: f64,
    pub time_to_enter_liquid: f64,
    pub time_to_exit_liquid: f64,
    #[serde(default)]
    pub calibration: Calibration,
}

fn full_accel() -> f64 {
    100.0
}

impl LiquidProfile {
    /// Commanded plunger volume for a requested transfer volume.
    ///
    /// An empty calibration table passes the volume through unchanged.
    pub fn adjusted_volume(&self, requested: f64) -> Result<f64, LabwareError> {
        if self.calibration.is_empty() {
            return Ok(requested);
        }
        self.calibration.output(requested).map(|(volume, _)| volume)
    }
}

/// Read-only labware lookup by name.
pub trait LabwareDatabase: Send + Sync {
    fn labware(&self, name: &str) -> Result<Labware, LabwareError>;
}

/// Read-only liquid profile lookup by name.
pub trait LiquidProfileLibrary: Send + Sync {
    fn liquid_profile(&self, name: &str) -> Result<LiquidProfile, LabwareError>;
}

/// In-memory catalog backing both lookups.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    labware: HashMap<String, Labware>,
    profiles: HashMap<String, LiquidProfile>,
}

impl Catalog {
    pub fn new(
        labware: impl IntoIterator<Item = Labware>,
        profiles: impl IntoIterator<Item = LiquidProfile>,
    ) -> Self {
        Self {
            labware: labware.into_iter().map(|l| (l.name.clone(), l)).collect(),
            profiles: profiles.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }
}

impl LabwareDatabase for Catalog {
    fn labware(&self, name: &str) -> Result<Labware, LabwareError> {
        self.labware
            .get(name)
            .cloned()
            .ok_or_else(|| LabwareError::UnknownLabware(name.to_string()))
    }
}

impl LiquidProfileLibrary for Catalog {
    fn liquid_profile(&self, name: &str) -> Result<LiquidProfile, LabwareError> {
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| LabwareError::UnknownLiquidProfile(name.to_string()))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
