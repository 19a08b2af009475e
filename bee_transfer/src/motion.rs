//! Grouped channel motion.
//!
//! Commands the X, Z and W axes of one or two channels as a single logical
//! move. Every slice argument is in group order, one entry per channel.
//!
//! Z targets are given as a stage teachpoint and an offset above it; the
//! absolute target is `teachpoint - offset` since Z is positive downwards.
//!
//! A fault on any axis is tagged with its channel, the faulted axis is reset
//! and re-enabled, and the fault is returned so the caller can decide whether
//! to retry. Moves already started on other axes run to completion.

use bee_common::axis::AxisFault;
use bee_common::consts::SHORT_CIRCUIT_MARKER;
use bee_hal::Channel;
use tracing::{debug, error, warn};

/// Blended X/Z targets waiting for a deferred start.
type PendingXz = Vec<(f64, f64)>;

pub struct GroupedChannelMotion<'a> {
    channels: Vec<&'a Channel>,
    pending: Option<PendingXz>,
}

impl<'a> GroupedChannelMotion<'a> {
    pub fn new(channels: Vec<&'a Channel>) -> Self {
        Self {
            channels,
            pending: None,
        }
    }

    pub fn channels(&self) -> &[&'a Channel] {
        &self.channels
    }

    pub fn ids(&self) -> Vec<u8> {
        self.channels.iter().map(|c| c.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Move X and Z of every channel together.
    ///
    /// With `start_immediately` unset the targets are only staged; they are
    /// issued by [`start_pending`](Self::start_pending) or the next
    /// [`wait_for_move_blended_complete`](Self::wait_for_move_blended_complete).
    pub fn move_absolute_blended_xz(
        &mut self,
        x_positions: &[f64],
        z_teachpoints: &[f64],
        z_offsets: &[f64],
        wait: bool,
        start_immediately: bool,
    ) -> Result<(), AxisFault> {
        debug_assert_eq!(x_positions.len(), self.channels.len());
        let targets: PendingXz = x_positions
            .iter()
            .zip(z_teachpoints.iter().zip(z_offsets))
            .map(|(&x, (&tp, &offset))| (x, tp - offset))
            .collect();

        self.pending = Some(targets);
        if start_immediately {
            self.start_pending()?;
        }
        if wait {
            self.wait_for_move_blended_complete()?;
        }
        Ok(())
    }

    /// Issue staged blended targets, if any.
    pub fn start_pending(&mut self) -> Result<(), AxisFault> {
        let Some(targets) = self.pending.take() else {
            return Ok(());
        };
        for (channel, &(x, z)) in self.channels.iter().zip(&targets) {
            debug!("Channel {}: blended move to x={:.3} z={:.3}", channel.id(), x, z);
            checked(channel, channel.z().move_absolute(z, None, None, false))?;
            checked(channel, channel.x().move_absolute(x, None, None, false))?;
        }
        Ok(())
    }

    /// Block until every X and Z axis in the group has settled.
    pub fn wait_for_move_blended_complete(&mut self) -> Result<(), AxisFault> {
        self.start_pending()?;
        for channel in &self.channels {
            checked(channel, channel.x().wait_move_complete())?;
            checked(channel, channel.z().wait_move_complete())?;
        }
        Ok(())
    }

    /// Z-only move to offsets above the stage teachpoints with per-channel
    /// velocities.
    ///
    /// With `retry_on_fault` set, a drive short-circuit is reset and the move
    /// reissued once before the fault is reported.
    pub fn move_absolute_z_offset(
        &self,
        z_teachpoints: &[f64],
        z_offsets: &[f64],
        velocities: &[Option<f64>],
        wait: bool,
        retry_on_fault: bool,
    ) -> Result<(), AxisFault> {
        debug_assert_eq!(z_offsets.len(), self.channels.len());
        for (i, channel) in self.channels.iter().enumerate() {
            let target = z_teachpoints[i] - z_offsets[i];
            let velocity = velocities.get(i).copied().flatten();
            let issue = || channel.z().move_absolute(target, velocity, None, false);
            match checked(channel, issue()) {
                Err(fault) if retry_on_fault && fault.message.contains(SHORT_CIRCUIT_MARKER) => {
                    warn!("Channel {}: reissuing Z move after short-circuit", channel.id());
                    checked(channel, issue())?;
                }
                other => other?,
            }
        }
        if wait {
            self.wait_for_z_complete()?;
        }
        Ok(())
    }

    /// Z-only move to absolute positions.
    pub fn move_absolute_z(&self, positions: &[f64], wait: bool) -> Result<(), AxisFault> {
        for (channel, &z) in self.channels.iter().zip(positions) {
            checked(channel, channel.z().move_absolute(z, None, None, false))?;
        }
        if wait {
            self.wait_for_z_complete()?;
        }
        Ok(())
    }

    /// X-only move to absolute positions.
    pub fn move_absolute_x(&self, positions: &[f64], wait: bool) -> Result<(), AxisFault> {
        for (channel, &x) in self.channels.iter().zip(positions) {
            checked(channel, channel.x().move_absolute(x, None, None, false))?;
        }
        if wait {
            for channel in &self.channels {
                checked(channel, channel.x().wait_move_complete())?;
            }
        }
        Ok(())
    }

    fn wait_for_z_complete(&self) -> Result<(), AxisFault> {
        for channel in &self.channels {
            checked(channel, channel.z().wait_move_complete())?;
        }
        Ok(())
    }

    /// Drive the plungers to `w_targets` while Z follows to the concurrent
    /// offsets, then wait for both.
    pub fn aspirate_or_dispense(
        &self,
        w_targets: &[f64],
        z_offsets_concurrent: &[f64],
        w_velocities: &[f64],
        accel_factors: &[f64],
        z_teachpoints: &[f64],
        z_velocities: &[Option<f64>],
    ) -> Result<(), AxisFault> {
        debug_assert_eq!(w_targets.len(), self.channels.len());
        for (i, channel) in self.channels.iter().enumerate() {
            let z = z_teachpoints[i] - z_offsets_concurrent[i];
            debug!(
                "Channel {}: plunger to {:.3} at {:.3}/s (accel {:.2}), z to {:.3}",
                channel.id(),
                w_targets[i],
                w_velocities[i],
                accel_factors[i],
                z
            );
            checked(
                channel,
                channel.w().move_absolute(
                    w_targets[i],
                    Some(w_velocities[i]),
                    Some(accel_factors[i]),
                    false,
                ),
            )?;
            let z_velocity = z_velocities.get(i).copied().flatten();
            checked(channel, channel.z().move_absolute(z, z_velocity, None, false))?;
        }
        for channel in &self.channels {
            checked(channel, channel.w().wait_move_complete())?;
            checked(channel, channel.z().wait_move_complete())?;
        }
        Ok(())
    }

    /// Pre-stroke the plungers to take up backlash.
    ///
    /// Without `wait`, [`wait_for_plunger_complete`](Self::wait_for_plunger_complete)
    /// must be called before any move that depends on plunger position.
    pub fn pre_aspirate(&self, w_targets: &[f64], wait: bool) -> Result<(), AxisFault> {
        for (channel, &w) in self.channels.iter().zip(w_targets) {
            checked(channel, channel.w().move_absolute(w, None, None, false))?;
        }
        if wait {
            self.wait_for_plunger_complete()?;
        }
        Ok(())
    }

    pub fn wait_for_plunger_complete(&self) -> Result<(), AxisFault> {
        for channel in &self.channels {
            checked(channel, channel.w().wait_move_complete())?;
        }
        Ok(())
    }
}

/// Tag a fault with its channel and bring the faulted axis back up.
fn checked(channel: &Channel, result: Result<(), AxisFault>) -> Result<(), AxisFault> {
    result.map_err(|fault| {
        let fault = fault.on_channel(channel.id());
        warn!("{}", fault);
        if let Err(e) = channel.recover(&fault) {
            error!("Channel {}: could not recover {}: {}", channel.id(), fault.axis, e);
        }
        fault
    })
}

// ─── Tests ──────────────────────────────────────────────────────────
