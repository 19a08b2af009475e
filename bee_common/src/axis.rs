//! Axis capability trait, axis faults and firmware status codes.
//!
//! This module defines:
//! - `Axis` trait - one physical or simulated degree of freedom
//! - `AxisFault` - hardware-reported fault raised by a move
//! - `FirmwareStatus` - decoded status of a firmware function call
//! - `FirmwareError` - a non-success firmware status with its operator message

use crate::consts::POLL_INTERVAL_MS;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Hardware fault reported by an axis.
///
/// The channel is filled in by the motion layer, which knows which channel
/// owns the axis. A fault is always recoverable by `reset_faults` followed by
/// `enable(true)`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{axis}{}: {message}", channel_suffix(.channel))]
pub struct AxisFault {
    /// Axis name, e.g. `"ch1.z"`.
    pub axis: String,
    /// Owning channel, when known.
    pub channel: Option<u8>,
    /// Drive-reported description.
    pub message: String,
}

fn channel_suffix(channel: &Option<u8>) -> String {
    channel.map(|c| format!(" (channel {c})")).unwrap_or_default()
}

impl AxisFault {
    /// Create a fault not yet attributed to a channel.
    pub fn new(axis: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            axis: axis.into(),
            channel: None,
            message: message.into(),
        }
    }

    /// Attribute the fault to a channel.
    pub fn on_channel(mut self, channel: u8) -> Self {
        self.channel = Some(channel);
        self
    }
}

/// Interface to one single-degree-of-freedom actuator.
///
/// All methods take `&self`; implementations keep their own interior
/// state so that an axis can be shared between a channel object and the
/// threads that command it.
///
/// Positions are in mm (X, Y, Z), µl (W) or degrees (R). Z is positive
/// downwards.
pub trait Axis: Send + Sync {
    /// Axis identifier used in logs and faults.
    fn name(&self) -> &str;

    /// Start an absolute move. Blocks until motion completes when `wait` is set.
    ///
    /// `velocity` is in position units per second and `accel` is a fraction
    /// of the axis maximum acceleration. `None` uses the drive defaults.
    fn move_absolute(
        &self,
        position: f64,
        velocity: Option<f64>,
        accel: Option<f64>,
        wait: bool,
    ) -> Result<(), AxisFault>;

    /// Jog at constant velocity.
    fn move_speed(&self, velocity: f64, accel: f64, wait: bool) -> Result<(), AxisFault>;

    /// Run the homing routine.
    fn home(&self, wait: bool) -> Result<(), AxisFault>;

    /// Current position.
    fn position(&self) -> f64;

    /// Current velocity.
    fn actual_speed(&self) -> f64;

    /// True once the commanded motion has settled.
    fn motion_complete(&self) -> bool;

    /// True once the trajectory generator has finished, which may precede settling.
    fn trajectory_complete(&self) -> bool {
        self.motion_complete()
    }

    /// Block until the current motion completes.
    fn wait_move_complete(&self) -> Result<(), AxisFault> {
        while !self.motion_complete() {
            std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
        }
        Ok(())
    }

    /// Call a named firmware function and wait for its `func_done` status.
    fn call_function_and_wait(&self, function: &str, timeout: Duration) -> Result<i32, AxisFault>;

    /// Clear latched drive faults.
    fn reset_faults(&self);

    /// Enable or disable the drive.
    fn enable(&self, on: bool) -> Result<(), AxisFault>;

    /// Whether the drive is enabled.
    fn is_enabled(&self) -> bool;
}

/// What the caller should do after a failed firmware call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareRecovery {
    /// Nothing to recover.
    None,
    /// Ask the operator and retry the same call.
    Retry,
    /// Re-close and re-lock the door before retrying.
    RecloseDoor,
    /// Let the rotor stop before retrying.
    WaitForSpinDown,
}

/// Decoded `func_done` status of a firmware function call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareStatus {
    /// `1`
    Success,
    /// `0`
    TimedOut,
    /// `-1`
    NotHomed,
    /// `-2`, safety interlock tripped or drive not enabled.
    NotEnabled,
    /// `-3`, axis still moving from a previous command.
    StillMoving,
    /// `-4`
    DoorNotClosed,
    /// `-5`
    Imbalanced,
    /// Any other code.
    Unknown(i32),
}

impl FirmwareStatus {
    /// Decode a raw status code.
    pub const fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Success,
            0 => Self::TimedOut,
            -1 => Self::NotHomed,
            -2 => Self::NotEnabled,
            -3 => Self::StillMoving,
            -4 => Self::DoorNotClosed,
            -5 => Self::Imbalanced,
            other => Self::Unknown(other),
        }
    }

    /// Raw status code.
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 1,
            Self::TimedOut => 0,
            Self::NotHomed => -1,
            Self::NotEnabled => -2,
            Self::StillMoving => -3,
            Self::DoorNotClosed => -4,
            Self::Imbalanced => -5,
            Self::Unknown(code) => code,
        }
    }

    /// Operator-facing message. These strings are shown verbatim.
    pub fn message(self, function: &str) -> String {
        match self {
            Self::Success => "Success".to_string(),
            Self::TimedOut => "Timed out. Please try again".to_string(),
            Self::NotHomed => "Please rehome HiG and try again".to_string(),
            Self::NotEnabled => "Please reset safety interlock for HiG and try again".to_string(),
            Self::StillMoving => {
                "Please allow HiG to come to a stop before commanding a new cycle. You may try again."
                    .to_string()
            }
            Self::DoorNotClosed => {
                "Shield door is apparently not closed. Check for obstructions before trying again."
                    .to_string()
            }
            Self::Imbalanced => {
                "Imbalanced load detected -- Please rebalance load in HiG and try again".to_string()
            }
            Self::Unknown(_) => format!("Unknown error during {function} call"),
        }
    }

    /// Recovery route for this status.
    pub const fn recovery(self) -> FirmwareRecovery {
        match self {
            Self::Success => FirmwareRecovery::None,
            Self::TimedOut | Self::NotHomed | Self::NotEnabled | Self::Unknown(_) => {
                FirmwareRecovery::Retry
            }
            Self::DoorNotClosed => FirmwareRecovery::RecloseDoor,
            Self::StillMoving | Self::Imbalanced => FirmwareRecovery::WaitForSpinDown,
        }
    }

    /// Convert into a `Result`, attaching the operator message on failure.
    pub fn check(self, function: &str) -> Result<(), FirmwareError> {
        match self {
            Self::Success => Ok(()),
            status => Err(FirmwareError {
                function: function.to_string(),
                message: status.message(function),
                status,
            }),
        }
    }
}

impl fmt::Display for FirmwareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

/// Non-success firmware call.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{function}: {message}")]
pub struct FirmwareError {
    /// Firmware function that was called.
    pub function: String,
    /// Decoded status.
    pub status: FirmwareStatus,
    /// Operator message for `status`.
    pub message: String,
}

impl FirmwareError {
    /// Recovery route for the failed call.
    pub fn recovery(&self) -> FirmwareRecovery {
        self.status.recovery()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
