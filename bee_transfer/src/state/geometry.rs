//! Per-transfer Z and W set points.
//!
//! Z values are offsets above the stage teachpoint (mm, positive up); the
//! motion layer turns them into absolute targets. W values are plunger
//! positions in µl. Everything is computed once in `Initialize` and never
//! changes for the rest of the run.

use crate::error::GeometryError;
use bee_common::consts::{LABWARE_CLEARANCE_MM, MAX_ACCEL_FACTOR, MIN_ACCEL_FACTOR};
use bee_common::labware::{Labware, LiquidProfile};
use bee_common::plate::Transfer;
use std::time::Duration;
use tracing::warn;

/// Everything needed to derive one channel's set points.
#[derive(Debug, Clone, Copy)]
pub struct GeometryInput<'a> {
    pub channel: u8,
    pub transfer: &'a Transfer,
    pub source: &'a Labware,
    pub destination: &'a Labware,
    pub profile: &'a LiquidProfile,
    pub z_source_teachpoint: f64,
    pub z_dest_teachpoint: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGeometry {
    pub channel: u8,
    pub z_source_teachpoint: f64,
    pub z_dest_teachpoint: f64,

    pub z_source_clearance: f64,
    pub z_aspirate_begin: f64,
    pub z_aspirate_end: f64,
    /// Travel height between the two plates.
    pub z_clear_between: f64,
    pub z_dest_clearance: f64,
    pub z_dispense_begin: f64,
    pub z_dispense_end: f64,

    pub w_begin: f64,
    pub w_aspirate_begin: f64,
    pub w_aspirate_end: f64,
    pub w_dispense_end: f64,
    pub w_end: f64,

    pub w_aspirate_velocity: f64,
    pub w_dispense_velocity: f64,
    pub aspirate_accel_factor: f64,
    pub dispense_accel_factor: f64,

    /// Z speeds for piercing and leaving the liquid, `None` for the drive default.
    pub z_enter_source_velocity: Option<f64>,
    pub z_exit_source_velocity: Option<f64>,
    pub z_enter_dest_velocity: Option<f64>,
    pub z_exit_dest_velocity: Option<f64>,
    /// Z speeds that keep the tip following the liquid during the stroke.
    pub z_aspirate_velocity: Option<f64>,
    pub z_dispense_velocity: Option<f64>,

    pub post_aspirate_delay: Duration,
    pub post_dispense_delay: Duration,
}

impl ChannelGeometry {
    pub fn compute(input: GeometryInput<'_>) -> Result<Self, GeometryError> {
        let GeometryInput {
            channel,
            transfer,
            source,
            destination,
            profile,
            ..
        } = input;

        let volume = transfer.volume_ul();
        let adjusted = profile.adjusted_volume(volume).unwrap_or_else(|e| {
            warn!("Channel {}: {}, using requested volume {}", channel, e, volume);
            volume
        });

        let z_source_clearance = source.thickness + LABWARE_CLEARANCE_MM;
        let z_aspirate_end = source.well_bottom() + transfer.aspirate_distance_mm;
        let z_aspirate_begin = z_aspirate_end + profile.z_move_during_aspirating;
        let z_clear_between = source.thickness.max(destination.thickness) + LABWARE_CLEARANCE_MM;
        let z_dest_clearance = destination.thickness + LABWARE_CLEARANCE_MM;
        let z_dispense_begin = destination.well_bottom() + transfer.dispense_distance_mm;
        let z_dispense_end = z_dispense_begin + profile.z_move_during_dispensing;

        let w_aspirate_begin = profile.pre_aspirate_volume;
        let w_aspirate_end = w_aspirate_begin + adjusted;
        let w_dispense_end = w_aspirate_begin - profile.post_dispense_volume;

        let aspirate_time = stroke_time(adjusted, profile.rate_to_aspirate);
        let dispense_time = stroke_time(w_aspirate_end - w_dispense_end, profile.rate_to_dispense);

        let geometry = Self {
            channel,
            z_source_teachpoint: input.z_source_teachpoint,
            z_dest_teachpoint: input.z_dest_teachpoint,
            z_source_clearance,
            z_aspirate_begin,
            z_aspirate_end,
            z_clear_between,
            z_dest_clearance,
            z_dispense_begin,
            z_dispense_end,
            w_begin: 0.0,
            w_aspirate_begin,
            w_aspirate_end,
            w_dispense_end,
            w_end: 0.0,
            w_aspirate_velocity: profile.rate_to_aspirate,
            w_dispense_velocity: profile.rate_to_dispense,
            aspirate_accel_factor: accel_factor(profile.max_accel_during_aspirate),
            dispense_accel_factor: accel_factor(profile.max_accel_during_dispense),
            z_enter_source_velocity: travel_velocity(
                z_source_clearance - z_aspirate_begin,
                profile.time_to_enter_liquid,
            ),
            z_exit_source_velocity: travel_velocity(
                z_source_clearance - z_aspirate_end,
                profile.time_to_exit_liquid,
            ),
            z_enter_dest_velocity: travel_velocity(
                z_dest_clearance - z_dispense_begin,
                profile.time_to_enter_liquid,
            ),
            z_exit_dest_velocity: travel_velocity(
                z_dest_clearance - z_dispense_end,
                profile.time_to_exit_liquid,
            ),
            z_aspirate_velocity: aspirate_time
                .and_then(|t| travel_velocity(z_aspirate_begin - z_aspirate_end, t)),
            z_dispense_velocity: dispense_time
                .and_then(|t| travel_velocity(z_dispense_end - z_dispense_begin, t)),
            post_aspirate_delay: delay(profile.post_aspirate_delay_s),
            post_dispense_delay: delay(profile.post_dispense_delay_s),
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Ordering checks. A failure means the labware or liquid profile data
    /// is wrong, so it is never retried.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let fail = |message: String| {
            Err(GeometryError {
                channel: self.channel,
                message,
            })
        };
        if !(self.z_source_clearance >= self.z_aspirate_begin
            && self.z_aspirate_begin >= self.z_aspirate_end)
        {
            return fail(format!(
                "source Z out of order: clearance {:.3} >= aspirate begin {:.3} >= aspirate end {:.3}",
                self.z_source_clearance, self.z_aspirate_begin, self.z_aspirate_end
            ));
        }
        if !(self.z_dest_clearance >= self.z_dispense_end
            && self.z_dispense_end >= self.z_dispense_begin)
        {
            return fail(format!(
                "destination Z out of order: clearance {:.3} >= dispense end {:.3} >= dispense begin {:.3}",
                self.z_dest_clearance, self.z_dispense_end, self.z_dispense_begin
            ));
        }
        if !(0.0 <= self.w_dispense_end
            && self.w_dispense_end <= self.w_aspirate_begin
            && self.w_aspirate_begin <= self.w_aspirate_end)
        {
            return fail(format!(
                "plunger out of order: 0 <= dispense end {:.3} <= aspirate begin {:.3} <= aspirate end {:.3}",
                self.w_dispense_end, self.w_aspirate_begin, self.w_aspirate_end
            ));
        }
        if !(self.w_aspirate_velocity > 0.0 && self.w_dispense_velocity > 0.0) {
            return fail("aspirate and dispense rates must be positive".to_string());
        }
        Ok(())
    }
}

fn accel_factor(max_accel_percent: f64) -> f64 {
    (max_accel_percent / 100.0).clamp(MIN_ACCEL_FACTOR, MAX_ACCEL_FACTOR)
}

fn stroke_time(volume: f64, rate: f64) -> Option<f64> {
    (volume > 0.0 && rate > 0.0).then(|| volume / rate)
}

fn travel_velocity(distance: f64, seconds: f64) -> Option<f64> {
    let distance = distance.abs();
    (distance > 0.0 && seconds > 0.0).then(|| distance / seconds)
}

fn delay(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_millis((seconds * 1000.0) as u64)
    } else {
        Duration::ZERO
    }
}

/// Set points for every channel of one run, in group order.
#[derive(Debug, Clone, PartialEq)]
pub struct PreCalculatedGeometry {
    channels: Vec<ChannelGeometry>,
}

impl PreCalculatedGeometry {
    pub fn compute<'a>(
        inputs: impl IntoIterator<Item = GeometryInput<'a>>,
    ) -> Result<Self, GeometryError> {
        let channels = inputs
            .into_iter()
            .map(ChannelGeometry::compute)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { channels })
    }

    pub fn channels(&self) -> &[ChannelGeometry] {
        &self.channels
    }

    /// One value per channel.
    pub fn column<T>(&self, field: impl Fn(&ChannelGeometry) -> T) -> Vec<T> {
        self.channels.iter().map(field).collect()
    }

    /// Longest post-aspirate delay across channels.
    pub fn post_aspirate_delay(&self) -> Duration {
        self.channels
            .iter()
            .map(|c| c.post_aspirate_delay)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Longest post-dispense delay across channels.
    pub fn post_dispense_delay(&self) -> Duration {
        self.channels
            .iter()
            .map(|c| c.post_dispense_delay)
            .max()
            .unwrap_or(Duration::ZERO)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
