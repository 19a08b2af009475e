//! Plate schedulers.
//!
//! Destination plates are processed one at a time in protocol order. For
//! each destination, source plates are loaded onto free stages and worked by
//! one thread per source (two threads when there is a single source, so both
//! tips stay busy). Each worker repeatedly takes channels from the arbiter,
//! picks an assignment from the shared pending list and runs a
//! [`TransferStateMachine`](crate::state::TransferStateMachine).
//!
//! The pending list and the destination well journals live behind one
//! mutex; choosing transfers, resolving `any` wells and reserving them happen
//! under a single lock, as does marking dispensed wells used.
//!
//! - [`assign`] - tip pairing and stage angles
//! - [`destination`] - destination plate flow
//! - [`source`] - source plate workers and load balancing

pub mod assign;
pub mod destination;
pub mod source;

use crate::arbiter::{StageLease, StageMode};
use crate::config::Protocol;
use crate::error::{ArbiterError, SchedulerError};
use crate::plate_handler::PlateHandler;
use crate::state::TransferContext;
use bee_common::plate::{DestinationPlate, PlateRef, SourcePlate, Transfer};
use bee_common::wells::Well;
use bee_hal::Stage;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::thread;
use tracing::info;

pub use assign::{Assignment, TipPair, take_assignment};

/// Transfers not yet assigned and the well journals they reserve into.
#[derive(Debug, Default)]
pub struct SchedulerState {
    pub pending: Vec<Transfer>,
    pub destinations: HashMap<String, DestinationPlate>,
}

impl SchedulerState {
    fn pending_count(&self, source: &str, dest: &str) -> usize {
        self.pending
            .iter()
            .filter(|t| t.source.barcode == source && t.destination.barcode == dest)
            .count()
    }

    fn has_pending(&self, source: &str, dest: &str) -> bool {
        self.pending_count(source, dest) > 0
    }

    /// Source plates with pending transfers into `dest`, in protocol order.
    fn sources_for(&self, dest: &str) -> Vec<PlateRef> {
        let mut sources: Vec<PlateRef> = Vec::new();
        for t in self.pending.iter().filter(|t| t.destination.barcode == dest) {
            if !sources.iter().any(|s| s.barcode == t.source.barcode) {
                sources.push(t.source.clone());
            }
        }
        sources
    }
}

/// One completed or failed state machine run.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRecord {
    pub channels: Vec<u8>,
    pub transfer_ids: Vec<usize>,
    pub source: String,
    pub destination: String,
    pub source_angle: f64,
    pub dest_angle: f64,
    pub dispensed: Vec<Well>,
}

impl AssignmentRecord {
    pub fn is_dual(&self) -> bool {
        self.channels.len() > 1
    }
}

/// Outcome of a full protocol run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Runs in completion order.
    pub assignments: Vec<AssignmentRecord>,
    /// Final well journals.
    pub destination_plates: Vec<DestinationPlate>,
}

impl RunReport {
    pub fn destination(&self, barcode: &str) -> Option<&DestinationPlate> {
        self.destination_plates
            .iter()
            .find(|p| p.barcode() == barcode)
    }

    pub fn transfers_done(&self) -> usize {
        self.assignments
            .iter()
            .filter(|a| !a.dispensed.is_empty())
            .map(|a| a.transfer_ids.len())
            .sum()
    }
}

pub struct Scheduler<'a> {
    ctx: TransferContext<'a>,
    plate_handler: &'a dyn PlateHandler,
    source_plates: Vec<SourcePlate>,
    destination_order: Vec<String>,
    state: Mutex<SchedulerState>,
    records: Mutex<Vec<AssignmentRecord>>,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        ctx: TransferContext<'a>,
        plate_handler: &'a dyn PlateHandler,
        protocol: &Protocol,
    ) -> Self {
        let mut destination_order: Vec<String> = Vec::new();
        for t in &protocol.transfers {
            if !destination_order.contains(&t.destination.barcode) {
                destination_order.push(t.destination.barcode.clone());
            }
        }
        let destinations = protocol
            .destination_plates
            .iter()
            .map(|p| (p.barcode().to_string(), p.clone()))
            .collect();

        Self {
            ctx,
            plate_handler,
            source_plates: protocol.source_plates.clone(),
            destination_order,
            state: Mutex::new(SchedulerState {
                pending: protocol.transfers.clone(),
                destinations,
            }),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Run every destination plate in protocol order.
    pub fn run(self) -> Result<RunReport, SchedulerError> {
        let total = self.state.lock().pending.len();
        info!(
            "Scheduling {} transfers into {} destination plate(s)",
            total,
            self.destination_order.len()
        );

        for barcode in &self.destination_order {
            if self.ctx.arbiter.abort_signal().is_aborted() {
                return Err(SchedulerError::Aborted);
            }
            thread::scope(|s| {
                s.spawn(|| self.run_destination(barcode))
                    .join()
                    .map_err(|_| SchedulerError::WorkerPanicked(barcode.clone()))?
            })?;
        }

        let state = self.state.into_inner();
        let destination_plates = self
            .destination_order
            .iter()
            .filter_map(|b| state.destinations.get(b).cloned())
            .collect();
        let assignments = self.records.into_inner();
        info!("Run complete: {} state machine runs", assignments.len());
        Ok(RunReport {
            assignments,
            destination_plates,
        })
    }

    fn abort_requested(&self) -> bool {
        self.ctx.arbiter.abort_signal().is_aborted()
    }

    fn stage(&self, id: u8) -> Result<&'a Stage, SchedulerError> {
        let deck = self.ctx.deck;
        deck.stage(id)
            .map(|s| s.as_ref())
            .ok_or(SchedulerError::Arbiter(ArbiterError::UnknownStage(id)))
    }

    /// Reserve an empty stage, park it at the robot teachpoint and have the
    /// plate handler put `plate` on it. The lease stays with the caller.
    fn load(&self, plate: &PlateRef, mode: StageMode) -> Result<StageLease<'a>, SchedulerError> {
        let arbiter = self.ctx.arbiter;
        let lease = arbiter.request_stage(mode)?;
        let id = lease.stage();
        self.stage(id)?.move_to_robot_teachpoint()?;
        self.plate_handler.deliver(plate, id)?;
        arbiter.set_loaded(id, Some(plate.clone()))?;
        info!("{:?} plate {} loaded on stage {}", mode, plate, id);
        Ok(lease)
    }

    /// Park the stage at the robot teachpoint and have the plate taken away.
    fn unload(&self, plate: &PlateRef, stage: u8) -> Result<(), SchedulerError> {
        self.stage(stage)?.move_to_robot_teachpoint()?;
        self.plate_handler.retrieve(plate, stage)?;
        self.ctx.arbiter.set_loaded(stage, None)?;
        info!("Plate {} unloaded from stage {}", plate, stage);
        Ok(())
    }
}
