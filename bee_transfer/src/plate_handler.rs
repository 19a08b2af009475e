//! Plate robot / storage interface.
//!
//! Schedulers call [`PlateHandler::deliver`] once a stage is reserved and
//! parked at its robot teachpoint, and [`PlateHandler::retrieve`] once the
//! last holder of the plate has let go.

use bee_common::plate::PlateRef;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("plate {barcode} on stage {stage}: {message}")]
pub struct PlateHandlerError {
    pub barcode: String,
    pub stage: u8,
    pub message: String,
}

/// One plate movement performed by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlateEvent {
    Delivered { barcode: String, stage: u8 },
    Retrieved { barcode: String, stage: u8 },
}

impl PlateEvent {
    pub fn barcode(&self) -> &str {
        match self {
            Self::Delivered { barcode, .. } | Self::Retrieved { barcode, .. } => barcode,
        }
    }

    pub fn stage(&self) -> u8 {
        match self {
            Self::Delivered { stage, .. } | Self::Retrieved { stage, .. } => *stage,
        }
    }
}

/// Moves plates between storage and the stages.
pub trait PlateHandler: Send + Sync {
    /// Put `plate` on `stage`. Returns once the plate is seated.
    fn deliver(&self, plate: &PlateRef, stage: u8) -> Result<(), PlateHandlerError>;

    /// Take `plate` off `stage`. Returns once the stage is empty.
    fn retrieve(&self, plate: &PlateRef, stage: u8) -> Result<(), PlateHandlerError>;
}

/// Handler that moves nothing and records every request.
#[derive(Debug, Default)]
pub struct SimulatedPlateHandler {
    events: Mutex<Vec<PlateEvent>>,
}

impl SimulatedPlateHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivery and retrieval, oldest first.
    pub fn events(&self) -> Vec<PlateEvent> {
        self.events.lock().clone()
    }

    /// Stage a plate was delivered to, if it ever was.
    pub fn delivered_to(&self, barcode: &str) -> Option<u8> {
        self.events.lock().iter().find_map(|event| match event {
            PlateEvent::Delivered { barcode: b, stage } if b == barcode => Some(*stage),
            _ => None,
        })
    }
}

impl PlateHandler for SimulatedPlateHandler {
    fn deliver(&self, plate: &PlateRef, stage: u8) -> Result<(), PlateHandlerError> {
        info!("Delivering {} to stage {}", plate, stage);
        self.events.lock().push(PlateEvent::Delivered {
            barcode: plate.barcode.clone(),
            stage,
        });
        Ok(())
    }

    fn retrieve(&self, plate: &PlateRef, stage: u8) -> Result<(), PlateHandlerError> {
        info!("Retrieving {} from stage {}", plate, stage);
        self.events.lock().push(PlateEvent::Retrieved {
            barcode: plate.barcode.clone(),
            stage,
        });
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
