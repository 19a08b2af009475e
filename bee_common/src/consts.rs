//! Instrument-wide constants for the Bumblebee workspace.
//!
//! Single source of truth for timing, geometry margins and limits shared
//! by the HAL and the transfer engine.

/// Poll interval of blocking waits and of the state machine driver loop (ms).
pub const POLL_INTERVAL_MS: u64 = 10;

/// Height added above labware thickness for Z clearance moves (mm).
pub const LABWARE_CLEARANCE_MM: f64 = 5.0;

/// Lower bound of the plunger acceleration factor.
pub const MIN_ACCEL_FACTOR: f64 = 0.01;

/// Upper bound of the plunger acceleration factor.
pub const MAX_ACCEL_FACTOR: f64 = 1.0;

/// Axis faults whose message contains this marker are retried without
/// asking the operator.
pub const SHORT_CIRCUIT_MARKER: &str = "Short-circuit";

/// Maximum disagreement between upper-left and lower-right tip spacing (mm).
pub const TIP_SPACING_TOLERANCE_MM: f64 = 1.1;

/// Radicand values in (-EPS, 0) are treated as zero by the two-tip solver.
pub const ANGLE_SOLVER_EPSILON: f64 = 1e-5;

/// Automatic retries of a "still moving" firmware status before escalation.
pub const STILL_MOVING_RETRY_LIMIT: u32 = 5;

/// Default firmware call timeout (ms).
pub const FIRMWARE_CALL_TIMEOUT_MS: u64 = 30_000;

/// Default deck configuration file.
pub const DEFAULT_DECK_PATH: &str = "config/deck.toml";
