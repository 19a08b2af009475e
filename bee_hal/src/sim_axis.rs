//! Simulated axis.
//!
//! `SimulatedAxis` implements [`Axis`] with constant-velocity motion whose
//! duration is scaled by `time_scale`. A scale of zero completes every move
//! as soon as it is commanded, which is what tests and dry runs use.
//!
//! Faults and firmware results can be scripted:
//! - `fail_moves_to(target, n, msg)` faults the next `n` moves to `target`
//! - `fail_next_moves(n, msg)` faults the next `n` moves regardless of target
//! - `script_function(name, codes)` queues `func_done` codes for a firmware call
//!
//! A faulted axis is disabled and rejects further commands until
//! `reset_faults()` and `enable(true)` are called, like a real drive.

use bee_common::axis::{Axis, AxisFault};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Velocity used when a move does not specify one (units/s).
const DEFAULT_VELOCITY: f64 = 100.0;

/// Position tolerance for matching a scripted fault target.
const TARGET_MATCH_WINDOW: f64 = 1e-6;

#[derive(Debug, Clone)]
struct ScriptedFault {
    /// Only moves to this target fault. `None` matches every move.
    target: Option<f64>,
    remaining: u32,
    message: String,
}

#[derive(Debug)]
struct MotionState {
    /// Position at the start of the current move.
    start: f64,
    /// Commanded target.
    target: f64,
    /// Signed velocity of the current move.
    velocity: f64,
    started_at: Instant,
    duration: Duration,
    enabled: bool,
    /// Latched fault message.
    fault: Option<String>,
    moves: u64,
}

impl MotionState {
    fn elapsed_fraction(&self) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.started_at.elapsed().as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    fn position(&self) -> f64 {
        let fraction = self.elapsed_fraction();
        if fraction >= 1.0 {
            self.target
        } else {
            self.start + (self.target - self.start) * fraction
        }
    }

    fn complete(&self) -> bool {
        self.started_at.elapsed() >= self.duration
    }
}

/// Axis simulator with scripted faults.
pub struct SimulatedAxis {
    name: String,
    time_scale: f64,
    state: Mutex<MotionState>,
    faults: Mutex<VecDeque<ScriptedFault>>,
    functions: Mutex<HashMap<String, VecDeque<i32>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl SimulatedAxis {
    /// Create an enabled axis at position zero.
    pub fn new(name: impl Into<String>, time_scale: f64) -> Self {
        Self {
            name: name.into(),
            time_scale: time_scale.max(0.0),
            state: Mutex::new(MotionState {
                start: 0.0,
                target: 0.0,
                velocity: 0.0,
                started_at: Instant::now(),
                duration: Duration::ZERO,
                enabled: true,
                fault: None,
                moves: 0,
            }),
            faults: Mutex::new(VecDeque::new()),
            functions: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Fault the next `times` moves whose target is `target`.
    pub fn fail_moves_to(&self, target: f64, times: u32, message: impl Into<String>) {
        self.faults.lock().push_back(ScriptedFault {
            target: Some(target),
            remaining: times,
            message: message.into(),
        });
    }

    /// Fault the next `times` moves.
    pub fn fail_next_moves(&self, times: u32, message: impl Into<String>) {
        self.faults.lock().push_back(ScriptedFault {
            target: None,
            remaining: times,
            message: message.into(),
        });
    }

    /// Queue `func_done` codes returned by successive calls to `function`.
    /// Once the queue is empty the call succeeds.
    pub fn script_function(&self, function: &str, codes: impl IntoIterator<Item = i32>) {
        self.functions
            .lock()
            .entry(function.to_string())
            .or_default()
            .extend(codes);
    }

    /// Number of accepted move commands.
    pub fn move_count(&self) -> u64 {
        self.state.lock().moves
    }

    /// Number of calls to firmware `function`.
    pub fn function_calls(&self, function: &str) -> usize {
        self.calls.lock().get(function).copied().unwrap_or(0)
    }

    /// Latched fault message, if any.
    pub fn fault(&self) -> Option<String> {
        self.state.lock().fault.clone()
    }

    fn take_scripted_fault(&self, target: f64) -> Option<String> {
        let mut faults = self.faults.lock();
        let index = faults.iter().position(|f| {
            f.remaining > 0
                && f.target
                    .is_none_or(|t| (t - target).abs() <= TARGET_MATCH_WINDOW)
        })?;
        let fault = &mut faults[index];
        fault.remaining -= 1;
        let message = fault.message.clone();
        if fault.remaining == 0 {
            faults.remove(index);
        }
        Some(message)
    }

    fn check_ready(&self, state: &MotionState) -> Result<(), AxisFault> {
        if let Some(message) = &state.fault {
            return Err(AxisFault::new(&self.name, message.clone()));
        }
        if !state.enabled {
            return Err(AxisFault::new(&self.name, "axis is disabled"));
        }
        Ok(())
    }

    fn start_move(&self, target: f64, velocity: Option<f64>) -> Result<Duration, AxisFault> {
        let mut state = self.state.lock();
        self.check_ready(&state)?;

        if let Some(message) = self.take_scripted_fault(target) {
            debug!("Axis {}: scripted fault on move to {:.3}", self.name, target);
            state.fault = Some(message.clone());
            state.enabled = false;
            return Err(AxisFault::new(&self.name, message));
        }

        let start = state.position();
        let speed = velocity
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(DEFAULT_VELOCITY);
        let distance = (target - start).abs();
        let duration = Duration::from_secs_f64(distance / speed * self.time_scale);

        state.start = start;
        state.target = target;
        state.velocity = speed * (target - start).signum();
        state.started_at = Instant::now();
        state.duration = duration;
        state.moves += 1;

        trace!(
            "Axis {}: move {:.3} -> {:.3} at {:.3} ({:?})",
            self.name, start, target, speed, duration
        );
        Ok(duration)
    }

    fn remaining(&self) -> Duration {
        let state = self.state.lock();
        state.duration.saturating_sub(state.started_at.elapsed())
    }
}

impl Axis for SimulatedAxis {
    fn name(&self) -> &str {
        &self.name
    }

    fn move_absolute(
        &self,
        position: f64,
        velocity: Option<f64>,
        _accel: Option<f64>,
        wait: bool,
    ) -> Result<(), AxisFault> {
        self.start_move(position, velocity)?;
        if wait {
            self.wait_move_complete()?;
        }
        Ok(())
    }

    fn move_speed(&self, velocity: f64, _accel: f64, wait: bool) -> Result<(), AxisFault> {
        // jog for one second of simulated travel
        let target = self.position() + velocity;
        self.move_absolute(target, Some(velocity.abs()), None, wait)
    }

    fn home(&self, wait: bool) -> Result<(), AxisFault> {
        self.move_absolute(0.0, None, None, wait)
    }

    fn position(&self) -> f64 {
        self.state.lock().position()
    }

    fn actual_speed(&self) -> f64 {
        let state = self.state.lock();
        if state.complete() { 0.0 } else { state.velocity }
    }

    fn motion_complete(&self) -> bool {
        self.state.lock().complete()
    }

    fn wait_move_complete(&self) -> Result<(), AxisFault> {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        let state = self.state.lock();
        match &state.fault {
            Some(message) => Err(AxisFault::new(&self.name, message.clone())),
            None => Ok(()),
        }
    }

    fn call_function_and_wait(&self, function: &str, _timeout: Duration) -> Result<i32, AxisFault> {
        {
            let state = self.state.lock();
            self.check_ready(&state)?;
        }
        *self.calls.lock().entry(function.to_string()).or_default() += 1;
        let code = self
            .functions
            .lock()
            .get_mut(function)
            .and_then(VecDeque::pop_front)
            .unwrap_or(1);
        debug!("Axis {}: {} returned {}", self.name, function, code);
        Ok(code)
    }

    fn reset_faults(&self) {
        let mut state = self.state.lock();
        if state.fault.take().is_some() {
            debug!("Axis {} fault reset", self.name);
        }
    }

    fn enable(&self, on: bool) -> Result<(), AxisFault> {
        let mut state = self.state.lock();
        if on {
            if let Some(message) = &state.fault {
                return Err(AxisFault::new(&self.name, message.clone()));
            }
        }
        state.enabled = on;
        debug!("Axis {} {}", self.name, if on { "enabled" } else { "disabled" });
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
