//! Deck devices: pipetting channels and plate stages.
//!
//! A `Channel` is one tip with its X, Z and W (plunger) axes. A `Stage` is a
//! plate-holding fixture with Y travel and R rotation. Both are shared behind
//! `Arc` and only hold hardware handles plus per-channel geometry; who may
//! use them is decided by the resource arbiter.

use bee_common::axis::{Axis, AxisFault};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Liquid currently held by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LiquidState {
    #[default]
    Empty,
    /// Volume in µl.
    Holding(f64),
}

/// One physical pipetting tip.
pub struct Channel {
    id: u8,
    x: Arc<dyn Axis>,
    z: Arc<dyn Axis>,
    w: Arc<dyn Axis>,
    x_home: f64,
    liquid: Mutex<LiquidState>,
}

impl Channel {
    pub fn new(id: u8, x: Arc<dyn Axis>, z: Arc<dyn Axis>, w: Arc<dyn Axis>, x_home: f64) -> Self {
        Self {
            id,
            x,
            z,
            w,
            x_home,
            liquid: Mutex::new(LiquidState::Empty),
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn x(&self) -> &dyn Axis {
        self.x.as_ref()
    }

    pub fn z(&self) -> &dyn Axis {
        self.z.as_ref()
    }

    pub fn w(&self) -> &dyn Axis {
        self.w.as_ref()
    }

    pub fn x_home(&self) -> f64 {
        self.x_home
    }

    pub fn liquid(&self) -> LiquidState {
        *self.liquid.lock()
    }

    pub fn set_liquid(&self, state: LiquidState) {
        *self.liquid.lock() = state;
    }

    /// Axis by name, used to reset the axis named in a fault.
    pub fn axis_named(&self, name: &str) -> Option<&dyn Axis> {
        [self.x(), self.z(), self.w()]
            .into_iter()
            .find(|axis| axis.name() == name)
    }

    /// Clear and re-enable the axis that raised `fault`.
    pub fn recover(&self, fault: &AxisFault) -> Result<(), AxisFault> {
        let axis = self
            .axis_named(&fault.axis)
            .ok_or_else(|| fault.clone())?;
        axis.reset_faults();
        axis.enable(true).map_err(|f| f.on_channel(self.id))
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("liquid", &self.liquid())
            .finish()
    }
}

/// Per-channel view of a stage, derived from teachpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageGeometry {
    /// Plate centre (x, y) for the channel.
    pub center: (f64, f64),
    /// Z of the stage surface for the channel.
    pub z_teachpoint: f64,
}

/// Plate-holding fixture with Y and rotation axes.
pub struct Stage {
    id: u8,
    y: Arc<dyn Axis>,
    r: Arc<dyn Axis>,
    robot_teachpoint_y: f64,
    geometry: HashMap<u8, StageGeometry>,
}

impl Stage {
    pub fn new(
        id: u8,
        y: Arc<dyn Axis>,
        r: Arc<dyn Axis>,
        robot_teachpoint_y: f64,
        geometry: HashMap<u8, StageGeometry>,
    ) -> Self {
        Self {
            id,
            y,
            r,
            robot_teachpoint_y,
            geometry,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn y(&self) -> &dyn Axis {
        self.y.as_ref()
    }

    pub fn r(&self) -> &dyn Axis {
        self.r.as_ref()
    }

    /// Move to `y` and rotate to `angle` degrees, both axes together.
    pub fn move_absolute(&self, y: f64, angle: f64, wait: bool) -> Result<(), AxisFault> {
        self.y.move_absolute(y, None, None, false)?;
        self.r.move_absolute(angle, None, None, false)?;
        if wait {
            self.wait_move_complete()?;
        }
        Ok(())
    }

    pub fn wait_move_complete(&self) -> Result<(), AxisFault> {
        self.y.wait_move_complete()?;
        self.r.wait_move_complete()
    }

    /// Present the stage to the plate robot.
    pub fn move_to_robot_teachpoint(&self) -> Result<(), AxisFault> {
        debug!("Stage {} to robot teachpoint", self.id);
        self.move_absolute(self.robot_teachpoint_y, 0.0, true)
    }

    pub fn geometry(&self, channel: u8) -> Option<StageGeometry> {
        self.geometry.get(&channel).copied()
    }

    pub fn center_position(&self, channel: u8) -> Option<(f64, f64)> {
        self.geometry(channel).map(|g| g.center)
    }

    pub fn z_teachpoint(&self, channel: u8) -> Option<f64> {
        self.geometry(channel).map(|g| g.z_teachpoint)
    }

    /// Clear and re-enable the axis that raised `fault`.
    pub fn recover(&self, fault: &AxisFault) -> Result<(), AxisFault> {
        let axis = [self.y(), self.r()]
            .into_iter()
            .find(|axis| axis.name() == fault.axis)
            .ok_or_else(|| fault.clone())?;
        axis.reset_faults();
        axis.enable(true)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("id", &self.id)
            .field("robot_teachpoint_y", &self.robot_teachpoint_y)
            .finish()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
