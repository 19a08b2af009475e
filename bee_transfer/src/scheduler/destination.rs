//! Destination plate flow.
//!
//! Load the plate, let the source workers fill it, then park the channels
//! and hand the plate back. A failed or aborted run leaves the plate on its
//! stage.

use super::Scheduler;
use crate::arbiter::StageMode;
use crate::error::SchedulerError;
use tracing::{error, info};

impl Scheduler<'_> {
    pub(super) fn run_destination(&self, barcode: &str) -> Result<(), SchedulerError> {
        let plate = self
            .state
            .lock()
            .destinations
            .get(barcode)
            .map(|d| d.plate().clone())
            .ok_or_else(|| SchedulerError::UnknownPlate(barcode.to_string()))?;

        let stage = self.load(&plate, StageMode::Destination)?.stage();

        if let Err(e) = self.run_sources(&plate, stage) {
            error!("Destination {} stopped: {}", plate, e);
            return Err(e);
        }

        self.ctx.deck.return_channels_home()?;
        self.unload(&plate, stage)?;
        info!("Destination {} complete", plate);
        Ok(())
    }
}
