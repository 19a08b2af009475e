//! Transfer state machine runner.
//!
//! Drives one [`TipAssignment`] (one or two channels) through the
//! transition table in [`machine`](super::machine): each state runs its
//! action, the action yields a trigger, the trigger is fired and the loop
//! sleeps one poll interval before the next state. The abort signal is
//! checked between states only, so a move in flight always completes or
//! faults on its own.
//!
//! Stage locks are held as leases on the runner. They are dropped as soon as
//! the channels leave the plate, on abort, and on any fatal error.

use super::geometry::{GeometryInput, PreCalculatedGeometry};
use super::machine::{State, TransferMachine, TransitionResult, Trigger};
use crate::arbiter::{ResourceArbiter, StageLease};
use crate::error::{ArbiterError, TransferError};
use crate::escalation::{ErrorData, ErrorEscalation, ErrorOption};
use crate::motion::GroupedChannelMotion;
use crate::tips::{self, TipCycle};
use bee_common::axis::{AxisFault, FirmwareRecovery};
use bee_common::consts::{FIRMWARE_CALL_TIMEOUT_MS, SHORT_CIRCUIT_MARKER};
use bee_common::labware::{LabwareDatabase, LiquidProfile, LiquidProfileLibrary};
use bee_common::plate::Transfer;
use bee_common::wells::{LabwareFormat, Well, xy_after_rotation};
use bee_hal::{Channel, Deck, LiquidState, Stage};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shared collaborators of every transfer run.
#[derive(Clone, Copy)]
pub struct TransferContext<'a> {
    pub deck: &'a Deck,
    pub arbiter: &'a ResourceArbiter,
    pub labware: &'a dyn LabwareDatabase,
    pub profiles: &'a dyn LiquidProfileLibrary,
    pub escalation: &'a dyn ErrorEscalation,
}

/// Channels paired with the transfers they carry out in one run.
///
/// `transfers[i]` is pipetted by `channels[i]`; every destination is
/// already resolved to a concrete, reserved well.
#[derive(Debug, Clone, PartialEq)]
pub struct TipAssignment {
    pub channels: Vec<u8>,
    pub transfers: Vec<Transfer>,
    pub source_stage: u8,
    pub dest_stage: u8,
    /// Stage rotation (degrees) at the source plate.
    pub source_angle: f64,
    /// Stage rotation (degrees) at the destination plate.
    pub dest_angle: f64,
}

impl TipAssignment {
    pub fn is_dual(&self) -> bool {
        self.channels.len() > 1
    }
}

/// Set points and positions fixed in `Initialize`.
#[derive(Debug)]
struct Plan {
    geometry: PreCalculatedGeometry,
    source_x: Vec<f64>,
    source_y: f64,
    dest_x: Vec<f64>,
    dest_y: f64,
}

pub struct TransferStateMachine<'a> {
    ctx: TransferContext<'a>,
    assignment: TipAssignment,
    motion: GroupedChannelMotion<'a>,
    source_stage: &'a Stage,
    dest_stage: &'a Stage,
    machine: TransferMachine,
    plan: Option<Plan>,
    source_lease: Option<StageLease<'a>>,
    dest_lease: Option<StageLease<'a>>,
    last_error: Option<String>,
    last_recovery: FirmwareRecovery,
    aborted_in: Option<State>,
    history: Vec<State>,
    dispensed: Vec<Well>,
    entered_at: Instant,
}

impl<'a> TransferStateMachine<'a> {
    pub fn new(ctx: TransferContext<'a>, assignment: TipAssignment) -> Result<Self, TransferError> {
        if assignment.transfers.is_empty() {
            return Err(TransferError::EmptyAssignment);
        }
        if assignment.channels.len() != assignment.transfers.len() {
            return Err(TransferError::ChannelMismatch {
                channels: assignment.channels.len(),
                transfers: assignment.transfers.len(),
            });
        }
        let deck: &'a Deck = ctx.deck;
        let channels = assignment
            .channels
            .iter()
            .map(|&id| {
                deck.channel(id)
                    .map(|c| c.as_ref())
                    .ok_or(TransferError::UnknownChannel(id))
            })
            .collect::<Result<Vec<&'a Channel>, _>>()?;
        let stage = |id: u8| -> Result<&'a Stage, TransferError> {
            deck.stage(id)
                .map(|s| s.as_ref())
                .ok_or(TransferError::UnknownStage(id))
        };
        let source_stage = stage(assignment.source_stage)?;
        let dest_stage = stage(assignment.dest_stage)?;

        Ok(Self {
            ctx,
            assignment,
            motion: GroupedChannelMotion::new(channels),
            source_stage,
            dest_stage,
            machine: TransferMachine::new(),
            plan: None,
            source_lease: None,
            dest_lease: None,
            last_error: None,
            last_recovery: FirmwareRecovery::None,
            aborted_in: None,
            history: Vec::new(),
            dispensed: Vec::new(),
            entered_at: Instant::now(),
        })
    }

    pub fn state(&self) -> State {
        self.machine.state()
    }

    pub fn assignment(&self) -> &TipAssignment {
        &self.assignment
    }

    /// Every state entered, in order.
    pub fn history(&self) -> &[State] {
        &self.history
    }

    /// Number of times `state` was entered.
    pub fn entries(&self, state: State) -> usize {
        self.history.iter().filter(|&&s| s == state).count()
    }

    /// Destination wells whose dispense completed.
    pub fn dispensed_wells(&self) -> &[Well] {
        &self.dispensed
    }

    /// Drive the machine until it exits.
    ///
    /// Returns `Ok` once `Done` is reached and
    /// [`TransferError::Aborted`] once the abort path completed.
    pub fn run(&mut self) -> Result<(), TransferError> {
        let abort = self.ctx.arbiter.abort_signal().clone();
        let poll = self.ctx.arbiter.poll_interval();
        debug!("Channels {:?}: starting {}", self.assignment.channels, self.describe());

        self.fire(Trigger::Start)?;
        while !self.machine.should_exit() {
            let state = self.machine.state();
            let trigger = if abort.is_aborted() && !state.is_terminal() && state != State::Aborting {
                Trigger::Abort
            } else {
                match self.step(state) {
                    Ok(trigger) => trigger,
                    Err(e) => {
                        error!("Channels {:?}: {:?} failed: {}", self.assignment.channels, state, e);
                        self.release_stages();
                        return Err(e);
                    }
                }
            };
            self.fire(trigger)?;
            if !self.machine.should_exit() {
                thread::sleep(poll);
            }
        }

        match self.machine.state() {
            State::Aborted => Err(TransferError::Aborted(
                self.aborted_in.unwrap_or(State::Aborted),
            )),
            _ => Ok(()),
        }
    }

    fn fire(&mut self, trigger: Trigger) -> Result<(), TransferError> {
        let from = self.machine.state();
        match self.machine.fire(trigger) {
            TransitionResult::Ok(to) => {
                if trigger == Trigger::Exit {
                    return Ok(());
                }
                if trigger == Trigger::Abort && self.aborted_in.is_none() {
                    self.aborted_in = Some(from);
                }
                if from != State::Idle {
                    debug!(
                        "[{:?}] {:?} took {:.3}s",
                        self.assignment.channels,
                        from,
                        self.entered_at.elapsed().as_secs_f64()
                    );
                }
                self.entered_at = Instant::now();
                self.history.push(to);
                Ok(())
            }
            TransitionResult::Rejected(reason) => {
                error!(
                    "Channels {:?}: {:?} rejected in {:?}: {}",
                    self.assignment.channels, trigger, from, reason
                );
                self.release_stages();
                Err(TransferError::InvalidTransition(reason))
            }
        }
    }

    fn step(&mut self, state: State) -> Result<Trigger, TransferError> {
        use State::*;

        let trigger = match state {
            Idle => Trigger::Start,
            Initialize => {
                self.initialize()?;
                Trigger::Success
            }
            TipsOn => {
                let result = tips::press_on(&self.motion, &self.tip_cycle());
                match self.outcome(result)? {
                    Trigger::MoveComplete
                        if self.ctx.arbiter.is_stage_available(self.assignment.source_stage) =>
                    {
                        Trigger::Success
                    }
                    Trigger::MoveComplete => Trigger::SourceStageInUse,
                    other => other,
                }
            }
            PreMoveXToSource => {
                let result = self.pre_move_x(true);
                self.outcome(result)?
            }
            MoveToSourceYR => {
                let result = self.move_to_source_yr();
                self.outcome(result)?
            }
            MoveToSource => {
                let result = self.move_to_source();
                self.outcome(result)?
            }
            MoveIntoSource => {
                let result = self.move_into_source();
                self.outcome(result)?
            }
            Aspirate => {
                let result = self.aspirate();
                self.outcome(result)?
            }
            MoveOutOfSource => {
                let result = self.move_out_of_source();
                self.outcome(result)?
            }
            MoveFromSource => {
                let result = self.move_from_source();
                self.outcome(result)?
            }
            LockDestPlate => self.lock_dest_plate()?,
            PreMoveXToDest => {
                let result = self.pre_move_x(false);
                self.outcome(result)?
            }
            MoveToDestYR => {
                let result = self.move_to_dest_yr();
                self.outcome(result)?
            }
            MoveToDest => {
                let result = self
                    .motion
                    .wait_for_move_blended_complete()
                    .map_err(TransferError::from);
                self.outcome(result)?
            }
            MoveIntoDest => {
                let result = self.move_into_dest();
                self.outcome(result)?
            }
            Dispense => {
                let result = self.dispense();
                self.outcome(result)?
            }
            MoveOutOfDest => {
                let result = self.move_out_of_dest();
                self.outcome(result)?
            }
            MoveFromDest => {
                let z_safe = vec![self.ctx.deck.z_safe(); self.motion.len()];
                let result = self
                    .motion
                    .move_absolute_z(&z_safe, true)
                    .map_err(TransferError::from);
                self.outcome(result)?
            }
            UnlockDestPlate => {
                self.dest_lease.take();
                Trigger::Done
            }
            RunTipHandling => {
                let result = self.run_tip_handling();
                match self.outcome(result)? {
                    Trigger::MoveComplete => Trigger::Done,
                    other => other,
                }
            }
            Done | Aborted => Trigger::Exit,
            Aborting => self.abort_cleanup(),
            error_state => self.escalate(error_state),
        };
        Ok(trigger)
    }

    /// Map a motion result to its trigger. Hardware faults and a timed-out
    /// wait go to the paired error state; a cancelled wait aborts.
    fn outcome(&mut self, result: Result<(), TransferError>) -> Result<Trigger, TransferError> {
        match result {
            Ok(()) => Ok(Trigger::MoveComplete),
            Err(TransferError::Arbiter(ArbiterError::Cancelled(_))) => Ok(Trigger::Abort),
            Err(
                e @ (TransferError::Axis(_)
                | TransferError::Firmware(_)
                | TransferError::Arbiter(ArbiterError::TimedOut { .. })),
            ) => {
                warn!(
                    "Channels {:?}: {:?}: {}",
                    self.assignment.channels,
                    self.machine.state(),
                    e
                );
                self.last_recovery = match &e {
                    TransferError::Firmware(f) => f.recovery(),
                    _ => FirmwareRecovery::Retry,
                };
                self.last_error = Some(e.to_string());
                Ok(Trigger::MoveError)
            }
            Err(e) => Err(e),
        }
    }

    // ─── Initialize ─────────────────────────────────────────────────

    fn initialize(&mut self) -> Result<(), TransferError> {
        let transfers = &self.assignment.transfers;
        let first = transfers.first().ok_or(TransferError::EmptyAssignment)?;
        let source_labware = self.ctx.labware.labware(&first.source.labware)?;
        let dest_labware = self.ctx.labware.labware(&first.destination.labware)?;
        let profiles = transfers
            .iter()
            .map(|t| self.ctx.profiles.liquid_profile(&t.liquid_profile))
            .collect::<Result<Vec<LiquidProfile>, _>>()?;

        let ids = self.motion.ids();
        let mut inputs = Vec::with_capacity(ids.len());
        for ((&channel, transfer), profile) in ids.iter().zip(transfers).zip(&profiles) {
            inputs.push(GeometryInput {
                channel,
                transfer,
                source: &source_labware,
                destination: &dest_labware,
                profile,
                z_source_teachpoint: z_teachpoint(self.source_stage, channel)?,
                z_dest_teachpoint: z_teachpoint(self.dest_stage, channel)?,
            });
        }
        let geometry = PreCalculatedGeometry::compute(inputs)?;

        let source_wells: Vec<Well> = transfers.iter().map(|t| t.source_well).collect();
        let dest_wells = transfers
            .iter()
            .map(|t| {
                t.destination_well()
                    .ok_or(TransferError::UnresolvedDestination(t.id))
            })
            .collect::<Result<Vec<Well>, _>>()?;

        let source = well_positions(
            self.source_stage,
            &ids,
            source_labware.format,
            &source_wells,
            self.assignment.source_angle,
        )?;
        let dest = well_positions(
            self.dest_stage,
            &ids,
            dest_labware.format,
            &dest_wells,
            self.assignment.dest_angle,
        )?;

        debug!(
            "Channels {:?}: geometry {:?}, source at {:?}, destination at {:?}",
            ids,
            geometry.channels(),
            source,
            dest
        );
        self.plan = Some(Plan {
            geometry,
            source_x: source.iter().map(|p| p.0).collect(),
            source_y: source.first().map_or(0.0, |p| p.1),
            dest_x: dest.iter().map(|p| p.0).collect(),
            dest_y: dest.first().map_or(0.0, |p| p.1),
        });
        Ok(())
    }

    // ─── Source side ────────────────────────────────────────────────

    /// Park over the busy plate at Z safe (source) or at the travel height
    /// between plates (destination) while the stage is in use.
    fn pre_move_x(&mut self, to_source: bool) -> Result<(), TransferError> {
        let plan = computed(&self.plan)?;
        let count = self.motion.len();
        if to_source {
            let z_safe = vec![self.ctx.deck.z_safe(); count];
            self.motion
                .move_absolute_blended_xz(&plan.source_x, &z_safe, &vec![0.0; count], true, true)?;
        } else {
            let tps = plan.geometry.column(|c| c.z_dest_teachpoint);
            let between = plan.geometry.column(|c| c.z_clear_between);
            self.motion
                .move_absolute_blended_xz(&plan.dest_x, &tps, &between, true, true)?;
        }
        Ok(())
    }

    fn move_to_source_yr(&mut self) -> Result<(), TransferError> {
        let source_y = {
            let plan = computed(&self.plan)?;
            let g = &plan.geometry;
            self.motion.move_absolute_blended_xz(
                &plan.source_x,
                &g.column(|c| c.z_source_teachpoint),
                &g.column(|c| c.z_source_clearance),
                false,
                true,
            )?;
            self.motion
                .pre_aspirate(&g.column(|c| c.w_aspirate_begin), false)?;
            plan.source_y
        };

        if self.source_lease.is_none() {
            self.source_lease = Some(self.ctx.arbiter.request_stage_for_transfer(
                &self.assignment.channels,
                self.assignment.source_stage,
                false,
            )?);
        }
        stage_checked(
            self.source_stage,
            self.source_stage
                .move_absolute(source_y, self.assignment.source_angle, true),
        )?;
        Ok(())
    }

    fn move_to_source(&mut self) -> Result<(), TransferError> {
        self.motion.wait_for_plunger_complete()?;
        stage_checked(self.source_stage, self.source_stage.wait_move_complete())?;
        self.motion.wait_for_move_blended_complete()?;
        Ok(())
    }

    fn move_into_source(&self) -> Result<(), TransferError> {
        let g = &computed(&self.plan)?.geometry;
        self.motion.move_absolute_z_offset(
            &g.column(|c| c.z_source_teachpoint),
            &g.column(|c| c.z_aspirate_begin),
            &g.column(|c| c.z_enter_source_velocity),
            true,
            true,
        )?;
        Ok(())
    }

    fn aspirate(&self) -> Result<(), TransferError> {
        let g = &computed(&self.plan)?.geometry;
        self.motion.aspirate_or_dispense(
            &g.column(|c| c.w_aspirate_end),
            &g.column(|c| c.z_aspirate_end),
            &g.column(|c| c.w_aspirate_velocity),
            &g.column(|c| c.aspirate_accel_factor),
            &g.column(|c| c.z_source_teachpoint),
            &g.column(|c| c.z_aspirate_velocity),
        )?;
        thread::sleep(g.post_aspirate_delay());
        for (channel, transfer) in self.motion.channels().iter().zip(&self.assignment.transfers) {
            channel.set_liquid(LiquidState::Holding(transfer.volume_ul()));
        }
        Ok(())
    }

    fn move_out_of_source(&mut self) -> Result<(), TransferError> {
        let g = &computed(&self.plan)?.geometry;
        self.motion.move_absolute_z_offset(
            &g.column(|c| c.z_source_teachpoint),
            &g.column(|c| c.z_source_clearance),
            &g.column(|c| c.z_exit_source_velocity),
            true,
            true,
        )?;
        self.source_lease.take();
        Ok(())
    }

    fn move_from_source(&mut self) -> Result<(), TransferError> {
        let g = &computed(&self.plan)?.geometry;
        let count = g.channels().len();
        self.motion.move_absolute_z_offset(
            &g.column(|c| c.z_source_teachpoint),
            &g.column(|c| c.z_clear_between),
            &vec![None; count],
            true,
            true,
        )?;
        self.source_lease.take();
        Ok(())
    }

    // ─── Destination side ───────────────────────────────────────────

    fn lock_dest_plate(&mut self) -> Result<Trigger, TransferError> {
        let stage = self.assignment.dest_stage;
        if !self.ctx.arbiter.is_stage_available(stage) {
            return Ok(Trigger::DestStageInUse);
        }
        match self
            .ctx
            .arbiter
            .request_stage_for_transfer(&self.assignment.channels, stage, true)
        {
            Ok(lease) => {
                self.dest_lease = Some(lease);
                Ok(Trigger::Done)
            }
            Err(ArbiterError::Cancelled(_)) => Ok(Trigger::Abort),
            Err(e) => Err(e.into()),
        }
    }

    fn move_to_dest_yr(&mut self) -> Result<(), TransferError> {
        if self.dest_lease.is_none() {
            self.dest_lease = Some(self.ctx.arbiter.request_stage_for_transfer(
                &self.assignment.channels,
                self.assignment.dest_stage,
                true,
            )?);
        }
        let plan = computed(&self.plan)?;
        let g = &plan.geometry;
        self.motion.move_absolute_blended_xz(
            &plan.dest_x,
            &g.column(|c| c.z_dest_teachpoint),
            &g.column(|c| c.z_dest_clearance),
            false,
            true,
        )?;
        stage_checked(
            self.dest_stage,
            self.dest_stage
                .move_absolute(plan.dest_y, self.assignment.dest_angle, true),
        )?;
        Ok(())
    }

    fn move_into_dest(&self) -> Result<(), TransferError> {
        let g = &computed(&self.plan)?.geometry;
        self.motion.move_absolute_z_offset(
            &g.column(|c| c.z_dest_teachpoint),
            &g.column(|c| c.z_dispense_begin),
            &g.column(|c| c.z_enter_dest_velocity),
            true,
            true,
        )?;
        Ok(())
    }

    fn dispense(&mut self) -> Result<(), TransferError> {
        let g = &computed(&self.plan)?.geometry;
        self.motion.aspirate_or_dispense(
            &g.column(|c| c.w_dispense_end),
            &g.column(|c| c.z_dispense_end),
            &g.column(|c| c.w_dispense_velocity),
            &g.column(|c| c.dispense_accel_factor),
            &g.column(|c| c.z_dest_teachpoint),
            &g.column(|c| c.z_dispense_velocity),
        )?;
        thread::sleep(g.post_dispense_delay());

        for (channel, transfer) in self.motion.channels().iter().zip(&self.assignment.transfers) {
            channel.set_liquid(LiquidState::Empty);
            let Some(well) = transfer.destination_well() else {
                continue;
            };
            info!(
                target: "pipette",
                channel = channel.id(),
                source = %transfer.source.barcode,
                source_well = %transfer.source_well,
                destination = %transfer.destination.barcode,
                destination_well = %well,
                volume_ul = transfer.volume_ul(),
                "transfer complete"
            );
            self.dispensed.extend(transfer.resolved_destinations());
        }
        Ok(())
    }

    fn move_out_of_dest(&self) -> Result<(), TransferError> {
        let g = &computed(&self.plan)?.geometry;
        self.motion.move_absolute_z_offset(
            &g.column(|c| c.z_dest_teachpoint),
            &g.column(|c| c.z_dest_clearance),
            &g.column(|c| c.z_exit_dest_velocity),
            true,
            true,
        )?;
        Ok(())
    }

    fn run_tip_handling(&self) -> Result<(), TransferError> {
        tips::run(&self.motion, &self.tip_cycle())
    }

    fn tip_cycle(&self) -> TipCycle<'a> {
        let config = self.ctx.deck.config();
        TipCycle {
            handling: config.deck.tip_handling,
            station: &config.tip_station,
            z_safe: config.deck.z_safe,
            call_timeout: Duration::from_millis(FIRMWARE_CALL_TIMEOUT_MS),
            retry_delay: self.ctx.arbiter.poll_interval(),
        }
    }

    // ─── Errors and abort ───────────────────────────────────────────

    /// Decide how to leave an error state.
    ///
    /// Short-circuits retry on their own. A firmware status that names a
    /// recovery gets it: the rotor is left to spin down before the operator
    /// is asked, and an open door is re-closed once the operator chose to
    /// retry. A failed re-close is put to the operator again.
    fn escalate(&mut self, state: State) -> Trigger {
        let origin = state.origin().unwrap_or(state);
        let recovery = std::mem::replace(&mut self.last_recovery, FirmwareRecovery::None);
        let mut message = self
            .last_error
            .take()
            .unwrap_or_else(|| format!("{origin:?} failed"));

        if message.contains(SHORT_CIRCUIT_MARKER) {
            info!(
                "Channels {:?}: retrying {:?} after short-circuit",
                self.assignment.channels, origin
            );
            return Trigger::Retry;
        }

        if recovery == FirmwareRecovery::WaitForSpinDown {
            if let Err(e) = tips::wait_for_spin_down(&self.motion) {
                warn!("Channels {:?}: {}", self.assignment.channels, e);
            }
        }

        loop {
            let error = ErrorData::new(
                format!(
                    "Channels {:?}, {:?}: {}",
                    self.assignment.channels, origin, message
                ),
                [ErrorOption::Retry, ErrorOption::Abort],
            );
            match self.ctx.escalation.add_error(error) {
                ErrorOption::Abort => return Trigger::Abort,
                ErrorOption::Retry if recovery == FirmwareRecovery::RecloseDoor => {
                    match tips::reclose_door(&self.motion, &self.tip_cycle()) {
                        Ok(()) => return Trigger::Retry,
                        Err(e) => {
                            warn!("Channels {:?}: {}", self.assignment.channels, e);
                            message = e.to_string();
                        }
                    }
                }
                ErrorOption::Retry => return Trigger::Retry,
            }
        }
    }

    /// Raise every channel to Z safe and let go of the stages.
    fn abort_cleanup(&mut self) -> Trigger {
        warn!(
            "Channels {:?}: aborting {}",
            self.assignment.channels,
            self.describe()
        );
        let z_safe = vec![self.ctx.deck.z_safe(); self.motion.len()];
        if let Err(e) = self.motion.move_absolute_z(&z_safe, true) {
            error!("Channels {:?}: could not reach Z safe: {}", self.assignment.channels, e);
        }
        self.release_stages();
        Trigger::Done
    }

    fn release_stages(&mut self) {
        self.source_lease.take();
        self.dest_lease.take();
    }

    fn describe(&self) -> String {
        self.assignment
            .transfers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The plan fixed in `Initialize`.
fn computed(plan: &Option<Plan>) -> Result<&Plan, TransferError> {
    plan.as_ref()
        .ok_or(TransferError::InvalidTransition("geometry not computed"))
}

fn z_teachpoint(stage: &Stage, channel: u8) -> Result<f64, TransferError> {
    stage
        .z_teachpoint(channel)
        .ok_or(TransferError::MissingTeachpoint {
            channel,
            stage: stage.id(),
        })
}

/// Deck (x, y) of each channel's well with the plate rotated by `angle`.
fn well_positions(
    stage: &Stage,
    channels: &[u8],
    format: LabwareFormat,
    wells: &[Well],
    angle: f64,
) -> Result<Vec<(f64, f64)>, TransferError> {
    channels
        .iter()
        .zip(wells)
        .map(|(&channel, well)| {
            let (cx, cy) = stage
                .center_position(channel)
                .ok_or(TransferError::MissingTeachpoint {
                    channel,
                    stage: stage.id(),
                })?;
            let (ox, oy) = well.offset_from_center(format);
            let (rx, ry) = xy_after_rotation(ox, oy, angle.abs(), angle < 0.0);
            Ok((cx + rx, cy - ry))
        })
        .collect()
}

/// Recover a faulted stage axis and pass the fault on.
fn stage_checked(stage: &Stage, result: Result<(), AxisFault>) -> Result<(), AxisFault> {
    result.map_err(|fault| {
        warn!("Stage {}: {}", stage.id(), fault);
        if let Err(e) = stage.recover(&fault) {
            error!("Stage {}: could not recover {}: {}", stage.id(), fault.axis, e);
        }
        fault
    })
}

// ─── Tests ──────────────────────────────────────────────────────────
