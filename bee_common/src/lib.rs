//! Bumblebee Common Library
//!
//! Shared types for the Bumblebee liquid-handling workspace.
//!
//! # Module Structure
//!
//! - [`axis`] - Axis capability trait, axis faults and firmware status codes
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Instrument-wide constants
//! - [`deck`] - Channels, stages and teachpoints
//! - [`labware`] - Labware, liquid profiles and their lookups
//! - [`plate`] - Plates, well usage journal and transfers
//! - [`wells`] - Well names and plate geometry
//! - [`prelude`] - Common re-exports for convenience

pub mod axis;
pub mod config;
pub mod consts;
pub mod deck;
pub mod labware;
pub mod plate;
pub mod prelude;
pub mod wells;
