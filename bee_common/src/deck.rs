//! Deck description: channels, stages, teachpoints and run settings.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! service_name = "bumblebee-01"
//!
//! [deck]
//! z_safe = 0.0
//! tip_handling = "wash"
//!
//! [[channels]]
//! id = 1
//!
//! [[stages]]
//! id = 1
//! robot_teachpoint_y = 250.0
//!
//! [[teachpoints]]
//! channel = 1
//! stage = 1
//! upper_left = { x = 100.0, y = 80.0, z = 60.0 }
//! lower_right = { x = 220.0, y = 160.0, z = 60.0 }
//! ```

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{POLL_INTERVAL_MS, TIP_SPACING_TOLERANCE_MM};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Tip treatment after each transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipHandling {
    #[default]
    None,
    Wash,
    Change,
}

/// Cartesian point in deck coordinates (mm).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Where a channel finds a stage: the plate's upper-left and lower-right corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTeachpoint {
    pub channel: u8,
    pub stage: u8,
    pub upper_left: Point3,
    pub lower_right: Point3,
}

impl StageTeachpoint {
    /// Plate centre as seen by this channel.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.upper_left.x + self.lower_right.x) / 2.0,
            (self.upper_left.y + self.lower_right.y) / 2.0,
        )
    }

    /// Z of the stage surface for this channel.
    pub fn z(&self) -> f64 {
        self.upper_left.z
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: u8,
    /// X home position (mm).
    #[serde(default)]
    pub x_home: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub id: u8,
    /// Y position at which the plate robot reaches the stage.
    pub robot_teachpoint_y: f64,
}

/// Wash and tip-change station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipStation {
    pub x: f64,
    pub z_wash: f64,
    pub z_shuck: f64,
    /// Z at which fresh tips are pressed on.
    #[serde(default)]
    pub z_press: f64,
    /// Firmware routine run for a wash cycle.
    #[serde(default = "default_wash_function")]
    pub wash_function: String,
    /// Firmware routine run to eject used tips.
    #[serde(default = "default_change_function")]
    pub change_function: String,
    /// Firmware routine run to press fresh tips on.
    #[serde(default = "default_press_function")]
    pub press_function: String,
    /// Firmware routine that re-closes and re-locks the shield door.
    #[serde(default = "default_close_door_function")]
    pub close_door_function: String,
}

fn default_wash_function() -> String {
    "wash_tip".to_string()
}

fn default_change_function() -> String {
    "change_tip".to_string()
}

fn default_press_function() -> String {
    "press_tip".to_string()
}

fn default_close_door_function() -> String {
    "close_door".to_string()
}

impl Default for TipStation {
    fn default() -> Self {
        Self {
            x: 0.0,
            z_wash: 0.0,
            z_shuck: 0.0,
            z_press: 0.0,
            wash_function: default_wash_function(),
            change_function: default_change_function(),
            press_function: default_press_function(),
            close_door_function: default_close_door_function(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckSettings {
    /// Z height at which channels may travel freely.
    pub z_safe: f64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Bound on arbiter waits. Unset means wait until the resource frees up.
    #[serde(default)]
    pub acquire_timeout_ms: Option<u64>,
    #[serde(default)]
    pub tip_handling: TipHandling,
    /// Axis driver name in the driver registry.
    #[serde(default = "default_driver")]
    pub driver: String,
}

fn default_poll_interval_ms() -> u64 {
    POLL_INTERVAL_MS
}

fn default_driver() -> String {
    "simulation".to_string()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Multiplier on simulated move durations. Zero completes moves instantly.
    #[serde(default)]
    pub time_scale: f64,
}

/// Complete deck description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckConfig {
    pub shared: SharedConfig,
    pub deck: DeckSettings,
    pub channels: Vec<ChannelConfig>,
    pub stages: Vec<StageConfig>,
    pub teachpoints: Vec<StageTeachpoint>,
    #[serde(default)]
    pub tip_station: TipStation,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl DeckConfig {
    /// Validate cross references and teachpoint consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.channels.is_empty() {
            return Err(invalid("at least one channel is required"));
        }
        if self.stages.len() < 2 {
            return Err(invalid(
                "at least two stages are required (one source, one destination)",
            ));
        }
        if self.deck.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms must be greater than zero"));
        }

        let mut channel_ids = HashSet::new();
        for channel in &self.channels {
            if !channel_ids.insert(channel.id) {
                return Err(invalid(format!("duplicate channel id {}", channel.id)));
            }
        }
        let mut stage_ids = HashSet::new();
        for stage in &self.stages {
            if !stage_ids.insert(stage.id) {
                return Err(invalid(format!("duplicate stage id {}", stage.id)));
            }
        }

        for channel in &self.channels {
            for stage in &self.stages {
                if self.teachpoint(channel.id, stage.id).is_none() {
                    return Err(invalid(format!(
                        "missing teachpoint for channel {} on stage {}",
                        channel.id, stage.id
                    )));
                }
            }
        }

        for stage in &self.stages {
            for (i, a) in self.channels.iter().enumerate() {
                for b in &self.channels[i + 1..] {
                    self.tip_spacing(a.id, b.id, stage.id)?;
                }
            }
        }
        Ok(())
    }

    pub fn teachpoint(&self, channel: u8, stage: u8) -> Option<&StageTeachpoint> {
        self.teachpoints
            .iter()
            .find(|tp| tp.channel == channel && tp.stage == stage)
    }

    /// Y spacing between two channels over a stage.
    ///
    /// Mean of the upper-left and lower-right deltas. The two must agree
    /// within tolerance.
    pub fn tip_spacing(&self, channel1: u8, channel2: u8, stage: u8) -> Result<f64, ConfigError> {
        let tp1 = self.teachpoint(channel1, stage).ok_or_else(|| {
            invalid(format!("missing teachpoint for channel {channel1} on stage {stage}"))
        })?;
        let tp2 = self.teachpoint(channel2, stage).ok_or_else(|| {
            invalid(format!("missing teachpoint for channel {channel2} on stage {stage}"))
        })?;

        let spacing_ul = (tp1.upper_left.y - tp2.upper_left.y).abs();
        let spacing_lr = (tp1.lower_right.y - tp2.lower_right.y).abs();
        if (spacing_ul - spacing_lr).abs() > TIP_SPACING_TOLERANCE_MM {
            return Err(invalid(format!(
                "teachpoints for channels {channel1} and {channel2} on stage {stage} disagree by {:.2}mm",
                spacing_lr - spacing_ul
            )));
        }
        Ok((spacing_ul + spacing_lr) / 2.0)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.deck.poll_interval_ms)
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.deck.acquire_timeout_ms.map(Duration::from_millis)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

// ─── Tests ──────────────────────────────────────────────────────────
