//! Source plate workers.
//!
//! Every source plate with transfers into the current destination gets a
//! loader thread. The loader waits for an empty stage, loads the plate,
//! registers itself as a holder and starts working. Whenever a worker
//! finishes or a plate lands, idle channel capacity is handed to a loaded
//! source that still has pending transfers: a helper joins that stage as an
//! extra holder. The last holder to leave unloads the plate.
//!
//! The first worker error raises the abort signal so the remaining workers
//! wind down, and is returned once every thread has exited.

use super::{AssignmentRecord, Scheduler, SchedulerState, TipPair, take_assignment};
use crate::arbiter::{StageMode, StageRetain};
use crate::error::SchedulerError;
use crate::state::{TipAssignment, TransferStateMachine};
use bee_common::plate::PlateRef;
use std::sync::mpsc::{self, Sender};
use std::thread;
use tracing::{debug, error, info, warn};

enum WorkerEvent {
    /// A source plate is on its stage with one holder.
    Loaded(String),
    Finished {
        source: String,
        result: Result<(), SchedulerError>,
    },
}

/// Reports a worker's result when dropped, including on unwind.
struct FinishReport {
    tx: Sender<WorkerEvent>,
    source: String,
    result: Option<Result<(), SchedulerError>>,
}

impl FinishReport {
    fn new(tx: Sender<WorkerEvent>, source: &str) -> Self {
        Self {
            tx,
            source: source.to_string(),
            result: None,
        }
    }
}

impl Drop for FinishReport {
    fn drop(&mut self) {
        let result = self
            .result
            .take()
            .unwrap_or_else(|| Err(SchedulerError::WorkerPanicked(self.source.clone())));
        let _ = self.tx.send(WorkerEvent::Finished {
            source: std::mem::take(&mut self.source),
            result,
        });
    }
}

impl Scheduler<'_> {
    /// Work every source plate of `dest` until nothing is pending for it.
    pub(super) fn run_sources(&self, dest: &PlateRef, dest_stage: u8) -> Result<(), SchedulerError> {
        let sources = self
            .state
            .lock()
            .sources_for(&dest.barcode)
            .into_iter()
            .map(|s| {
                self.source_plates
                    .iter()
                    .find(|p| p.barcode == s.barcode)
                    .cloned()
                    .ok_or(SchedulerError::UnknownPlate(s.barcode))
            })
            .collect::<Result<Vec<PlateRef>, _>>()?;
        if sources.is_empty() {
            warn!("No transfers pending for destination {}", dest);
            return Ok(());
        }
        let slots = self.ctx.deck.channels().len().max(1);
        info!(
            "Destination {}: {} source plate(s), {} worker slot(s)",
            dest,
            sources.len(),
            slots
        );

        let (tx, rx) = mpsc::channel::<WorkerEvent>();
        thread::scope(|s| {
            let mut running = 0usize;
            let mut first_error: Option<SchedulerError> = None;

            for source in &sources {
                let tx = tx.clone();
                running += 1;
                s.spawn(move || {
                    let mut report = FinishReport::new(tx.clone(), &source.barcode);
                    report.result = Some(self.load_and_work(source, dest, dest_stage, &tx));
                });
            }

            while running > 0 {
                let Ok(event) = rx.recv() else {
                    break;
                };
                match event {
                    WorkerEvent::Loaded(barcode) => debug!("Source {} ready", barcode),
                    WorkerEvent::Finished { source, result } => {
                        running -= 1;
                        debug!("Worker on {} finished, {} running", source, running);
                        if let Err(e) = result {
                            if first_error.is_none() {
                                if !e.is_abort() {
                                    error!("Worker on {} failed: {}", source, e);
                                }
                                self.ctx.arbiter.abort_signal().abort();
                                first_error = Some(e);
                            }
                        }
                    }
                }
                if first_error.is_some() || self.abort_requested() {
                    continue;
                }

                for source in &sources {
                    if running >= slots {
                        break;
                    }
                    if !self.state.lock().has_pending(&source.barcode, &dest.barcode) {
                        continue;
                    }
                    let Some(retain) = self.ctx.arbiter.retain_loaded(&source.barcode) else {
                        continue;
                    };
                    debug!("Helper joins source {} on stage {}", source, retain.stage());
                    running += 1;
                    let tx = tx.clone();
                    s.spawn(move || {
                        let mut report = FinishReport::new(tx, &source.barcode);
                        report.result = Some(self.work_and_release(source, retain, dest, dest_stage));
                    });
                }
            }

            match first_error {
                Some(e) if e.is_abort() => Err(SchedulerError::Aborted),
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }

    fn load_and_work(
        &self,
        source: &PlateRef,
        dest: &PlateRef,
        dest_stage: u8,
        tx: &Sender<WorkerEvent>,
    ) -> Result<(), SchedulerError> {
        let retain = {
            let lease = self.load(source, StageMode::Source)?;
            self.ctx.arbiter.retain(lease.stage())?
        };
        let _ = tx.send(WorkerEvent::Loaded(source.barcode.clone()));
        self.work_and_release(source, retain, dest, dest_stage)
    }

    /// Work the source, then let go of it. The last holder unloads the
    /// plate unless the run is failing.
    fn work_and_release(
        &self,
        source: &PlateRef,
        retain: StageRetain<'_>,
        dest: &PlateRef,
        dest_stage: u8,
    ) -> Result<(), SchedulerError> {
        let stage = retain.stage();
        let result = self.work(source, stage, dest, dest_stage);
        if retain.release() && result.is_ok() && !self.abort_requested() {
            self.unload(source, stage)?;
        }
        result
    }

    /// Take assignments for `source` → `dest` and run them until none are
    /// left.
    fn work(
        &self,
        source: &PlateRef,
        source_stage: u8,
        dest: &PlateRef,
        dest_stage: u8,
    ) -> Result<(), SchedulerError> {
        let deck = self.ctx.deck;
        let arbiter = self.ctx.arbiter;
        let source_format = self.ctx.labware.labware(&source.labware)?.format;
        let channel_count = deck.channels().len();

        loop {
            if self.abort_requested() {
                return Err(SchedulerError::Aborted);
            }
            let pending = self.state.lock().pending_count(&source.barcode, &dest.barcode);
            if pending == 0 {
                return Ok(());
            }

            let wanted = if pending >= 2 && channel_count >= 2 { 2 } else { 1 };
            let mut lease = arbiter.request_channels(wanted)?;
            let pair = match *lease.ids() {
                [first, second] => Some(TipPair {
                    channels: (first, second),
                    source_spacing: deck.tip_spacing(first, second, source_stage)?,
                    dest_spacing: deck.tip_spacing(first, second, dest_stage)?,
                }),
                _ => None,
            };

            let assignment = {
                let mut state = self.state.lock();
                let SchedulerState {
                    pending,
                    destinations,
                } = &mut *state;
                let plate = destinations
                    .get_mut(&dest.barcode)
                    .ok_or_else(|| SchedulerError::UnknownPlate(dest.barcode.clone()))?;
                take_assignment(pending, plate, &source.barcode, source_format, pair)?
            };
            let Some(assignment) = assignment else {
                drop(lease);
                // pooled wells still in flight on another run
                thread::sleep(arbiter.poll_interval());
                continue;
            };
            lease.truncate(assignment.transfers.len());

            let tips = TipAssignment {
                channels: lease.ids().to_vec(),
                transfers: assignment.transfers,
                source_stage,
                dest_stage,
                source_angle: assignment.source_angle,
                dest_angle: assignment.dest_angle,
            };
            let mut machine = TransferStateMachine::new(self.ctx, tips)?;
            let result = machine.run();

            let dispensed = machine.dispensed_wells().to_vec();
            {
                let mut state = self.state.lock();
                if let Some(plate) = state.destinations.get_mut(&dest.barcode) {
                    for well in &dispensed {
                        plate.mark_used(*well)?;
                    }
                }
            }
            let tips = machine.assignment();
            self.records.lock().push(AssignmentRecord {
                channels: tips.channels.clone(),
                transfer_ids: tips.transfers.iter().map(|t| t.id).collect(),
                source: source.barcode.clone(),
                destination: dest.barcode.clone(),
                source_angle: tips.source_angle,
                dest_angle: tips.dest_angle,
                dispensed,
            });
            drop(lease);
            result?;
        }
    }
}
