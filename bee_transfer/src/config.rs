//! Protocol file: labware, liquid profiles, plates and transfers.
//!
//! # TOML Example
//!
//! ```toml
//! [[labware]]
//! name = "greiner 96"
//! wells = 96
//! thickness = 14.4
//! well_depth = 10.9
//!
//! [[liquid_profiles]]
//! name = "water"
//! rate_to_aspirate = 100.0
//! rate_to_dispense = 200.0
//! time_to_enter_liquid = 0.5
//! time_to_exit_liquid = 0.5
//!
//! [[source_plates]]
//! barcode = "SRC001"
//! labware = "greiner 96"
//!
//! [[destination_plates]]
//! barcode = "DST001"
//! labware = "greiner 96"
//!
//! [[transfers]]
//! source = "SRC001"
//! source_well = "A1"
//! destination = "DST001"
//! destination_wells = ["any"]
//! volume = 50.0
//! liquid_profile = "water"
//! ```

use bee_common::config::{ConfigError, ConfigLoader};
use bee_common::labware::{Catalog, Labware, LiquidProfile};
use bee_common::plate::{DestinationPlate, PlateRef, SourcePlate, Transfer, VolumeUnits};
use bee_common::wells::{LabwareFormat, Well, WellSpec};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

/// Default aspirate/dispense height above the well bottom (mm).
const DEFAULT_WELL_DISTANCE_MM: f64 = 1.0;

fn default_well_distance() -> f64 {
    DEFAULT_WELL_DISTANCE_MM
}

fn default_destination_wells() -> Vec<WellSpec> {
    vec![WellSpec::Any]
}

/// One `[[transfers]]` entry as written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEntry {
    /// Source plate barcode.
    pub source: String,
    pub source_well: Well,
    /// Destination plate barcode.
    pub destination: String,
    #[serde(default = "default_destination_wells")]
    pub destination_wells: Vec<WellSpec>,
    pub volume: f64,
    #[serde(default)]
    pub units: VolumeUnits,
    pub liquid_profile: String,
    #[serde(default = "default_well_distance")]
    pub aspirate_distance_mm: f64,
    #[serde(default = "default_well_distance")]
    pub dispense_distance_mm: f64,
}

/// Protocol file as written, before cross-reference checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolFile {
    #[serde(default)]
    pub labware: Vec<Labware>,
    #[serde(default)]
    pub liquid_profiles: Vec<LiquidProfile>,
    #[serde(default)]
    pub source_plates: Vec<SourcePlate>,
    #[serde(default)]
    pub destination_plates: Vec<PlateRef>,
    #[serde(default)]
    pub transfers: Vec<TransferEntry>,
}

/// Validated protocol, ready to schedule.
#[derive(Debug, Clone)]
pub struct Protocol {
    pub catalog: Catalog,
    pub source_plates: Vec<SourcePlate>,
    pub destination_plates: Vec<DestinationPlate>,
    /// Transfers in file order; `id` is the position in the file.
    pub transfers: Vec<Transfer>,
}

impl Protocol {
    pub fn source_plate(&self, barcode: &str) -> Option<&SourcePlate> {
        self.source_plates.iter().find(|p| p.barcode == barcode)
    }
}

/// Load and validate a protocol file.
pub fn load_protocol(path: &Path) -> Result<Protocol, ConfigError> {
    let file = ProtocolFile::load(path)?;
    let protocol = file.into_protocol()?;
    info!(
        "Loaded protocol {}: {} transfers, {} source and {} destination plates",
        path.display(),
        protocol.transfers.len(),
        protocol.source_plates.len(),
        protocol.destination_plates.len()
    );
    Ok(protocol)
}

/// Parse and validate protocol TOML held in memory.
pub fn load_protocol_from_str(content: &str) -> Result<Protocol, ConfigError> {
    ProtocolFile::load_str(content)?.into_protocol()
}

impl ProtocolFile {
    /// Check every cross reference and build the [`Protocol`].
    pub fn into_protocol(self) -> Result<Protocol, ConfigError> {
        let mut labware: HashMap<&str, &Labware> = HashMap::new();
        for l in &self.labware {
            if l.thickness <= 0.0 || l.well_depth <= 0.0 || l.well_depth > l.thickness {
                return Err(invalid(format!(
                    "labware '{}': need 0 < well_depth <= thickness",
                    l.name
                )));
            }
            if labware.insert(l.name.as_str(), l).is_some() {
                return Err(invalid(format!("duplicate labware '{}'", l.name)));
            }
        }

        let mut profiles = HashSet::new();
        for p in &self.liquid_profiles {
            if p.rate_to_aspirate <= 0.0 || p.rate_to_dispense <= 0.0 {
                return Err(invalid(format!(
                    "liquid profile '{}': rates must be positive",
                    p.name
                )));
            }
            if !profiles.insert(p.name.as_str()) {
                return Err(invalid(format!("duplicate liquid profile '{}'", p.name)));
            }
        }

        let mut formats: HashMap<&str, LabwareFormat> = HashMap::new();
        let mut sources = HashSet::new();
        let mut destinations = HashSet::new();
        for (plate, is_source) in self
            .source_plates
            .iter()
            .map(|p| (p, true))
            .chain(self.destination_plates.iter().map(|p| (p, false)))
        {
            let l = labware.get(plate.labware.as_str()).ok_or_else(|| {
                invalid(format!(
                    "plate {}: unknown labware '{}'",
                    plate.barcode, plate.labware
                ))
            })?;
            if formats.insert(plate.barcode.as_str(), l.format).is_some() {
                return Err(invalid(format!("duplicate plate barcode {}", plate.barcode)));
            }
            if is_source {
                sources.insert(plate.barcode.as_str());
            } else {
                destinations.insert(plate.barcode.as_str());
            }
        }

        if self.transfers.is_empty() {
            return Err(invalid("protocol has no transfers"));
        }
        let mut transfers = Vec::with_capacity(self.transfers.len());
        for (id, entry) in self.transfers.iter().enumerate() {
            let context = |message: String| invalid(format!("transfer #{id}: {message}"));
            if !sources.contains(entry.source.as_str()) {
                return Err(context(format!("unknown source plate {}", entry.source)));
            }
            if !destinations.contains(entry.destination.as_str()) {
                return Err(context(format!(
                    "unknown destination plate {}",
                    entry.destination
                )));
            }
            if !profiles.contains(entry.liquid_profile.as_str()) {
                return Err(context(format!(
                    "unknown liquid profile '{}'",
                    entry.liquid_profile
                )));
            }
            if entry.volume.is_nan() || entry.volume <= 0.0 {
                return Err(context(format!("volume must be positive, got {}", entry.volume)));
            }
            if entry.destination_wells.is_empty() {
                return Err(context("no destination well".to_string()));
            }
            let source_format = formats[entry.source.as_str()];
            entry
                .source_well
                .ensure_fits(source_format)
                .map_err(|e| context(e.to_string()))?;
            let dest_format = formats[entry.destination.as_str()];
            for well in entry.destination_wells.iter().filter_map(WellSpec::well) {
                well.ensure_fits(dest_format)
                    .map_err(|e| context(e.to_string()))?;
            }

            transfers.push(Transfer {
                id,
                source: plate_ref(&self.source_plates, &entry.source),
                source_well: entry.source_well,
                destination: plate_ref(&self.destination_plates, &entry.destination),
                destination_wells: entry.destination_wells.clone(),
                volume: entry.volume,
                units: entry.units,
                liquid_profile: entry.liquid_profile.clone(),
                aspirate_distance_mm: entry.aspirate_distance_mm,
                dispense_distance_mm: entry.dispense_distance_mm,
            });
        }

        let destination_plates = self
            .destination_plates
            .iter()
            .map(|p| DestinationPlate::new(p.clone(), formats[p.barcode.as_str()]))
            .collect();

        Ok(Protocol {
            catalog: Catalog::new(self.labware, self.liquid_profiles),
            source_plates: self.source_plates,
            destination_plates,
            transfers,
        })
    }
}

fn plate_ref(plates: &[PlateRef], barcode: &str) -> PlateRef {
    plates
        .iter()
        .find(|p| p.barcode == barcode)
        .cloned()
        .unwrap_or_else(|| PlateRef {
            barcode: barcode.to_string(),
            labware: String::new(),
        })
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

// ─── Tests ──────────────────────────────────────────────────────────
