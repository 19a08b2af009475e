//! Well naming and plate geometry.
//!
//! Wells are addressed by row letters followed by a 1-based column (`A1`,
//! `P24`, `AF48`). Geometry is expressed as the offset of a well centre from
//! the plate centre, X to the right and Y towards row A, in mm.

use crate::consts::ANGLE_SOLVER_EPSILON;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Well addressing and format errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WellError {
    /// Name is not of the form `<letters><digits>`.
    #[error("invalid well name '{0}'")]
    InvalidName(String),

    /// Well lies outside the plate format.
    #[error("well {well} does not exist on a {wells}-well plate")]
    OutOfRange { well: String, wells: u32 },

    /// Well count does not match a known format.
    #[error("unsupported labware format: {0} wells")]
    UnsupportedFormat(u32),
}

/// Standard SBS plate formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum LabwareFormat {
    Wells48,
    Wells96,
    Wells384,
    Wells1536,
}

impl LabwareFormat {
    /// Format for a given number of wells.
    pub const fn from_well_count(wells: u32) -> Result<Self, WellError> {
        match wells {
            48 => Ok(Self::Wells48),
            96 => Ok(Self::Wells96),
            384 => Ok(Self::Wells384),
            1536 => Ok(Self::Wells1536),
            other => Err(WellError::UnsupportedFormat(other)),
        }
    }

    pub const fn well_count(self) -> u32 {
        self.rows() as u32 * self.columns() as u32
    }

    pub const fn rows(self) -> u16 {
        match self {
            Self::Wells48 => 6,
            Self::Wells96 => 8,
            Self::Wells384 => 16,
            Self::Wells1536 => 32,
        }
    }

    pub const fn columns(self) -> u16 {
        match self {
            Self::Wells48 => 8,
            Self::Wells96 => 12,
            Self::Wells384 => 24,
            Self::Wells1536 => 48,
        }
    }

    /// Centre-to-centre well pitch (mm).
    pub const fn pitch(self) -> f64 {
        match self {
            Self::Wells48 => 13.0,
            Self::Wells96 => 9.0,
            Self::Wells384 => 4.5,
            Self::Wells1536 => 2.25,
        }
    }

    /// Offset of well A1 from the plate centre (mm).
    pub const fn a1_offset(self) -> (f64, f64) {
        match self {
            Self::Wells48 => (-45.0, 32.2),
            Self::Wells96 => (-49.5, 31.5),
            Self::Wells384 => (-51.75, 33.75),
            Self::Wells1536 => (-52.875, 34.875),
        }
    }
}

impl TryFrom<u32> for LabwareFormat {
    type Error = WellError;

    fn try_from(wells: u32) -> Result<Self, Self::Error> {
        Self::from_well_count(wells)
    }
}

impl From<LabwareFormat> for u32 {
    fn from(format: LabwareFormat) -> Self {
        format.well_count()
    }
}

/// A concrete well, zero-based row and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Well {
    pub row: u16,
    pub column: u16,
}

impl Well {
    pub const fn new(row: u16, column: u16) -> Self {
        Self { row, column }
    }

    /// Well at a row-major index.
    pub fn from_index(format: LabwareFormat, index: u32) -> Result<Self, WellError> {
        if index >= format.well_count() {
            return Err(WellError::OutOfRange {
                well: format!("#{index}"),
                wells: format.well_count(),
            });
        }
        let columns = u32::from(format.columns());
        Ok(Self {
            row: (index / columns) as u16,
            column: (index % columns) as u16,
        })
    }

    /// Row-major index.
    pub fn index(&self, format: LabwareFormat) -> u32 {
        u32::from(self.row) * u32::from(format.columns()) + u32::from(self.column)
    }

    /// Check that the well exists on `format`.
    pub fn ensure_fits(&self, format: LabwareFormat) -> Result<(), WellError> {
        if self.row < format.rows() && self.column < format.columns() {
            Ok(())
        } else {
            Err(WellError::OutOfRange {
                well: self.to_string(),
                wells: format.well_count(),
            })
        }
    }

    /// Offset of the well centre from the plate centre at 0°.
    pub fn offset_from_center(&self, format: LabwareFormat) -> (f64, f64) {
        let (a1x, a1y) = format.a1_offset();
        let pitch = format.pitch();
        (
            a1x + f64::from(self.column) * pitch,
            a1y - f64::from(self.row) * pitch,
        )
    }

    /// Centre-to-centre distance to another well.
    pub fn distance_to(&self, other: &Well, format: LabwareFormat) -> f64 {
        let (x1, y1) = self.offset_from_center(format);
        let (x2, y2) = other.offset_from_center(format);
        (x2 - x1).hypot(y2 - y1)
    }
}

fn row_letters(mut row: u32) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (row % 26) as u8);
        if row < 26 {
            break;
        }
        row = row / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

impl fmt::Display for Well {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", row_letters(u32::from(self.row)), self.column + 1)
    }
}

impl FromStr for Well {
    type Err = WellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let split = name
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| WellError::InvalidName(s.to_string()))?;
        let (letters, digits) = name.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(WellError::InvalidName(s.to_string()));
        }

        // Bijective base-26: A=0 .. Z=25, AA=26.
        let mut row: u32 = 0;
        for c in letters.chars() {
            let value = u32::from(c.to_ascii_uppercase() as u8 - b'A') + 1;
            row = row
                .checked_mul(26)
                .and_then(|r| r.checked_add(value))
                .ok_or_else(|| WellError::InvalidName(s.to_string()))?;
        }
        let column: u32 = digits
            .parse()
            .map_err(|_| WellError::InvalidName(s.to_string()))?;
        if column == 0 || row - 1 > u32::from(u16::MAX) || column > u32::from(u16::MAX) {
            return Err(WellError::InvalidName(s.to_string()));
        }
        Ok(Self {
            row: (row - 1) as u16,
            column: (column - 1) as u16,
        })
    }
}

impl TryFrom<String> for Well {
    type Error = WellError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Well> for String {
    fn from(well: Well) -> Self {
        well.to_string()
    }
}

/// Destination well as written in a protocol: a specific well or `any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WellSpec {
    /// Resolved by the scheduler to the first available well.
    Any,
    At(Well),
}

impl WellSpec {
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub const fn well(&self) -> Option<Well> {
        match self {
            Self::Any => None,
            Self::At(well) => Some(*well),
        }
    }
}

impl fmt::Display for WellSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::At(well) => well.fmt(f),
        }
    }
}

impl FromStr for WellSpec {
    type Err = WellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("any") {
            Ok(Self::Any)
        } else {
            s.parse().map(Self::At)
        }
    }
}

impl TryFrom<String> for WellSpec {
    type Error = WellError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WellSpec> for String {
    fn from(spec: WellSpec) -> Self {
        spec.to_string()
    }
}

/// Rotate a point about the plate centre by `degrees`.
pub fn xy_after_rotation(x: f64, y: f64, degrees: f64, clockwise: bool) -> (f64, f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    if clockwise {
        (cos * x + sin * y, -sin * x + cos * y)
    } else {
        (cos * x - sin * y, sin * x + cos * y)
    }
}

/// Plate angle (degrees) that places `channel1` over `well1` and `channel2`
/// over `well2`, given the Y spacing between the two channels.
///
/// Channels move independently in X, so a solution exists whenever the wells
/// are at least `channel_spacing` apart. Returns `None` otherwise.
pub fn angle_for_two_tips(
    format: LabwareFormat,
    well1: &Well,
    well2: &Well,
    channel1: u8,
    channel2: u8,
    channel_spacing: f64,
) -> Option<f64> {
    let (c, d) = well1.offset_from_center(format);
    let (a, b) = well2.offset_from_center(format);
    // sign depends on which channel sits above the other
    let e = if channel1 < channel2 {
        -channel_spacing
    } else {
        channel_spacing
    };

    let mut radicand = a * a - 2.0 * a * c + b * b - 2.0 * b * d + c * c + d * d - e * e;
    if radicand < 0.0 && radicand > -ANGLE_SOLVER_EPSILON {
        radicand = 0.0;
    }
    let root = radicand.sqrt();
    let lower = d - b - e;
    let solution1 = (2.0 * ((a - c + root) / lower).atan()).to_degrees();
    let solution2 = (-2.0 * ((c - a + root) / lower).atan()).to_degrees();

    // solutions assume clockwise rotation, the stage convention is the reverse
    match (solution1.is_nan(), solution2.is_nan()) {
        (true, true) => None,
        (true, false) => Some(-solution2),
        (false, _) => Some(-solution1),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
