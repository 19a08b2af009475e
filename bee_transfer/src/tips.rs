//! Tip handling around each transfer.
//!
//! `Wash` and `Change` park the channel group over the tip station and run
//! a firmware routine on each plunger axis. With `Change` fresh tips are
//! pressed on before the transfer and the used ones ejected after it. A
//! "still moving" status is retried a few times before it is reported; any
//! other non-success status is returned as a
//! [`FirmwareError`](bee_common::axis::FirmwareError) with its operator
//! message.
//!
//! [`wait_for_spin_down`] and [`reclose_door`] carry out the recovery a
//! failed firmware call asks for before it is retried.

use crate::error::TransferError;
use crate::motion::GroupedChannelMotion;
use bee_common::axis::FirmwareStatus;
use bee_common::consts::STILL_MOVING_RETRY_LIMIT;
use bee_common::deck::{TipHandling, TipStation};
use bee_hal::Channel;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Parameters shared by every tip handling cycle of a run.
#[derive(Debug, Clone)]
pub struct TipCycle<'a> {
    pub handling: TipHandling,
    pub station: &'a TipStation,
    pub z_safe: f64,
    /// Timeout of one firmware call.
    pub call_timeout: Duration,
    /// Pause before re-calling after a "still moving" status.
    pub retry_delay: Duration,
}

/// Run the configured tip handling on every channel of `motion`.
pub fn run(motion: &GroupedChannelMotion<'_>, cycle: &TipCycle<'_>) -> Result<(), TransferError> {
    let (function, z_station) = match cycle.handling {
        TipHandling::None => return Ok(()),
        TipHandling::Wash => (&cycle.station.wash_function, cycle.station.z_wash),
        TipHandling::Change => (&cycle.station.change_function, cycle.station.z_shuck),
    };
    info!("Channels {:?}: {:?} tips", motion.ids(), cycle.handling);
    at_station(motion, cycle, function, z_station)
}

/// Press fresh tips on every channel. Only `Change` swaps tips.
pub fn press_on(motion: &GroupedChannelMotion<'_>, cycle: &TipCycle<'_>) -> Result<(), TransferError> {
    if cycle.handling != TipHandling::Change {
        return Ok(());
    }
    info!("Channels {:?}: pressing on tips", motion.ids());
    at_station(motion, cycle, &cycle.station.press_function, cycle.station.z_press)
}

/// Block until every plunger axis of the group has stopped.
pub fn wait_for_spin_down(motion: &GroupedChannelMotion<'_>) -> Result<(), TransferError> {
    info!("Channels {:?}: waiting for spin-down", motion.ids());
    for channel in motion.channels() {
        channel
            .w()
            .wait_move_complete()
            .map_err(|f| f.on_channel(channel.id()))?;
    }
    Ok(())
}

/// Re-close and re-lock the shield door.
pub fn reclose_door(motion: &GroupedChannelMotion<'_>, cycle: &TipCycle<'_>) -> Result<(), TransferError> {
    info!("Channels {:?}: re-closing shield door", motion.ids());
    for channel in motion.channels() {
        call_checked(channel, &cycle.station.close_door_function, cycle)?;
    }
    Ok(())
}

/// Travel to the station at Z safe, run `function` at `z_station` and rise again.
fn at_station(
    motion: &GroupedChannelMotion<'_>,
    cycle: &TipCycle<'_>,
    function: &str,
    z_station: f64,
) -> Result<(), TransferError> {
    let count = motion.len();
    motion.move_absolute_z(&vec![cycle.z_safe; count], true)?;
    motion.move_absolute_x(&vec![cycle.station.x; count], true)?;
    motion.move_absolute_z(&vec![z_station; count], true)?;
    for channel in motion.channels() {
        call_checked(channel, function, cycle)?;
    }
    motion.move_absolute_z(&vec![cycle.z_safe; count], true)?;
    Ok(())
}

fn call_checked(channel: &Channel, function: &str, cycle: &TipCycle<'_>) -> Result<(), TransferError> {
    let mut still_moving = 0;
    loop {
        let code = channel
            .w()
            .call_function_and_wait(function, cycle.call_timeout)
            .map_err(|f| f.on_channel(channel.id()))?;
        match FirmwareStatus::from_code(code) {
            FirmwareStatus::StillMoving if still_moving < STILL_MOVING_RETRY_LIMIT => {
                still_moving += 1;
                debug!(
                    "Channel {}: {} still moving, retry {}/{}",
                    channel.id(),
                    function,
                    still_moving,
                    STILL_MOVING_RETRY_LIMIT
                );
                thread::sleep(cycle.retry_delay);
            }
            status => {
                if status != FirmwareStatus::Success {
                    warn!("Channel {}: {} returned {}", channel.id(), function, status);
                }
                return status.check(function).map_err(TransferError::from);
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
