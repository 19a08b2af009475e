//! Prelude module for common re-exports.
//!
//! ```rust
//! use bee_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::deck::{DeckConfig, StageTeachpoint, TipHandling};

// ─── Hardware ───────────────────────────────────────────────────────
pub use crate::axis::{Axis, AxisFault, FirmwareError, FirmwareRecovery, FirmwareStatus};

// ─── Labware & plates ───────────────────────────────────────────────
pub use crate::labware::{Catalog, Labware, LabwareDatabase, LiquidProfile, LiquidProfileLibrary};
pub use crate::plate::{DestinationPlate, PlateRef, SourcePlate, Transfer, WellUsage};
pub use crate::wells::{LabwareFormat, Well, WellSpec};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{LABWARE_CLEARANCE_MM, POLL_INTERVAL_MS};
