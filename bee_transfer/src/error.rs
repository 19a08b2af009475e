//! Error types for arbitration, transfers and scheduling.
//!
//! A waiting resource is not an error. `ArbiterError` only reports a wait
//! that was cancelled, timed out, or named a resource that does not exist.

use crate::plate_handler::PlateHandlerError;
use crate::state::machine::State;
use bee_common::axis::{AxisFault, FirmwareError};
use bee_common::config::ConfigError;
use bee_common::labware::LabwareError;
use bee_common::plate::PlateError;
use bee_hal::HalError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArbiterError {
    /// The abort signal was raised while waiting.
    #[error("wait for {0} cancelled")]
    Cancelled(String),

    #[error("timed out after {waited:?} waiting for {resource}")]
    TimedOut { resource: String, waited: Duration },

    #[error("unknown stage {0}")]
    UnknownStage(u8),

    #[error("unknown channel {0}")]
    UnknownChannel(u8),

    #[error("requested {requested} channels, deck has {available}")]
    NotEnoughChannels { requested: usize, available: usize },

    /// Transfers may only lock a stage once a plate is on it.
    #[error("stage {0} has no plate loaded")]
    NotLoaded(u8),
}

/// Labware or liquid profile data that breaks the Z/W ordering.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("channel {channel}: {message}")]
pub struct GeometryError {
    pub channel: u8,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Arbiter(#[from] ArbiterError),

    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Axis(#[from] AxisFault),

    #[error(transparent)]
    Firmware(#[from] FirmwareError),

    #[error(transparent)]
    Labware(#[from] LabwareError),

    #[error(transparent)]
    Plate(#[from] PlateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no teachpoint for channel {channel} on stage {stage}")]
    MissingTeachpoint { channel: u8, stage: u8 },

    #[error("no channel {0} on the deck")]
    UnknownChannel(u8),

    #[error("no stage {0} on the deck")]
    UnknownStage(u8),

    #[error("tip assignment has no transfers")]
    EmptyAssignment,

    #[error("{channels} channel(s) assigned to {transfers} transfer(s)")]
    ChannelMismatch { channels: usize, transfers: usize },

    #[error("transfer #{0} has no resolved destination well")]
    UnresolvedDestination(usize),

    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    #[error("transfer aborted in {0:?}")]
    Aborted(State),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Arbiter(#[from] ArbiterError),

    #[error(transparent)]
    Plate(#[from] PlateError),

    #[error(transparent)]
    Labware(#[from] LabwareError),

    #[error(transparent)]
    Axis(#[from] AxisFault),

    #[error(transparent)]
    Hal(#[from] HalError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("plate handler: {0}")]
    PlateHandler(#[from] PlateHandlerError),

    #[error("unknown plate '{0}'")]
    UnknownPlate(String),

    #[error("worker for plate {0} panicked")]
    WorkerPanicked(String),

    #[error("run aborted")]
    Aborted,
}

impl SchedulerError {
    /// The run stopped because the abort signal was raised.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Self::Aborted
                | Self::Arbiter(ArbiterError::Cancelled(_))
                | Self::Transfer(TransferError::Aborted(_))
                | Self::Transfer(TransferError::Arbiter(ArbiterError::Cancelled(_)))
        )
    }
}
