//! # Bumblebee HAL Library
//!
//! Axis drivers and deck devices for the Bumblebee dual-tip pipettor.
//!
//! # Module Structure
//!
//! - [`deck`] - Deck assembly from a [`DeckConfig`](bee_common::deck::DeckConfig)
//! - [`devices`] - Channels (X/Z/W) and stages (Y/R)
//! - [`driver_registry`] - Axis driver factory registration
//! - [`sim_axis`] - Simulated axis with scripted faults
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                         bee_hal                           │
//! │  ┌──────────────┐    ┌──────────┐    ┌─────────────────┐  │
//! │  │  DeckConfig  │───►│   Deck   │◄───│ DriverRegistry  │  │
//! │  │ (bee_common) │    │          │    │                 │  │
//! │  └──────────────┘    └────┬─────┘    └─────────────────┘  │
//! │                           │                               │
//! │              ┌────────────┴────────────┐                  │
//! │              ▼                         ▼                  │
//! │     ┌────────────────┐        ┌────────────────┐          │
//! │     │ Channel x,z,w  │        │  Stage y,r     │          │
//! │     └───────┬────────┘        └───────┬────────┘          │
//! │             └──────────┬──────────────┘                   │
//! │                        ▼                                  │
//! │               ┌────────────────┐                          │
//! │               │  dyn Axis      │ (trait object)           │
//! │               └────────────────┘                          │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod deck;
pub mod devices;
pub mod driver_registry;
pub mod sim_axis;

use bee_common::axis::AxisFault;
use bee_common::config::ConfigError;
use thiserror::Error;

pub use crate::deck::Deck;
pub use crate::devices::{Channel, LiquidState, Stage};
pub use crate::driver_registry::DriverRegistry;
pub use crate::sim_axis::SimulatedAxis;

/// Errors raised while building or driving deck hardware.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Driver not found in the registry.
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Driver name registered twice.
    #[error("Driver already registered: {0}")]
    DuplicateDriver(String),

    /// Deck configuration rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Axis fault during a hardware operation.
    #[error("Axis fault: {0}")]
    Axis(#[from] AxisFault),
}
