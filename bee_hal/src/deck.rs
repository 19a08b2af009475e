//! Deck assembly.
//!
//! Builds the channels and stages described by a [`DeckConfig`] using axes
//! from a [`DriverRegistry`], or directly from simulated axes whose handles
//! are kept for fault scripting.

use crate::HalError;
use crate::devices::{Channel, Stage, StageGeometry};
use crate::driver_registry::{AxisSpec, DriverRegistry};
use crate::sim_axis::SimulatedAxis;
use bee_common::axis::{Axis, AxisFault};
use bee_common::config::ConfigError;
use bee_common::deck::DeckConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Simulated axes by name, for scripting faults in tests and dry runs.
pub type SimulatedAxes = HashMap<String, Arc<SimulatedAxis>>;

/// All channels and stages of one instrument.
#[derive(Debug)]
pub struct Deck {
    config: DeckConfig,
    channels: Vec<Arc<Channel>>,
    stages: Vec<Arc<Stage>>,
}

impl Deck {
    /// Build the deck with the driver named in the configuration.
    pub fn from_config(config: &DeckConfig, registry: &DriverRegistry) -> Result<Self, HalError> {
        config.validate()?;
        let driver = config.deck.driver.as_str();
        info!("Building deck with '{}' driver", driver);
        Self::assemble(config, |spec| registry.create_axis(driver, spec))
    }

    /// Build the deck from simulated axes and return their handles.
    pub fn simulated(config: &DeckConfig) -> Result<(Self, SimulatedAxes), HalError> {
        config.validate()?;
        let mut handles = SimulatedAxes::new();
        let deck = Self::assemble(config, |spec| {
            let axis = Arc::new(SimulatedAxis::new(spec.name.clone(), spec.time_scale));
            handles.insert(spec.name.clone(), Arc::clone(&axis));
            Ok(axis as Arc<dyn Axis>)
        })?;
        Ok((deck, handles))
    }

    fn assemble<F>(config: &DeckConfig, mut make_axis: F) -> Result<Self, HalError>
    where
        F: FnMut(&AxisSpec) -> Result<Arc<dyn Axis>, HalError>,
    {
        let time_scale = config.simulation.time_scale;
        let mut axis = |name: String| make_axis(&AxisSpec { name, time_scale });

        let mut channels = Vec::with_capacity(config.channels.len());
        for channel in &config.channels {
            let id = channel.id;
            channels.push(Arc::new(Channel::new(
                id,
                axis(format!("ch{id}.x"))?,
                axis(format!("ch{id}.z"))?,
                axis(format!("ch{id}.w"))?,
                channel.x_home,
            )));
        }

        let mut stages = Vec::with_capacity(config.stages.len());
        for stage in &config.stages {
            let mut geometry = HashMap::new();
            for channel in &config.channels {
                let tp = config.teachpoint(channel.id, stage.id).ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "missing teachpoint for channel {} on stage {}",
                        channel.id, stage.id
                    ))
                })?;
                geometry.insert(
                    channel.id,
                    StageGeometry {
                        center: tp.center(),
                        z_teachpoint: tp.z(),
                    },
                );
            }
            let id = stage.id;
            stages.push(Arc::new(Stage::new(
                id,
                axis(format!("stage{id}.y"))?,
                axis(format!("stage{id}.r"))?,
                stage.robot_teachpoint_y,
                geometry,
            )));
        }

        debug!(
            "Deck assembled: {} channels, {} stages",
            channels.len(),
            stages.len()
        );
        Ok(Self {
            config: config.clone(),
            channels,
            stages,
        })
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    pub fn channels(&self) -> &[Arc<Channel>] {
        &self.channels
    }

    pub fn stages(&self) -> &[Arc<Stage>] {
        &self.stages
    }

    pub fn channel(&self, id: u8) -> Option<&Arc<Channel>> {
        self.channels.iter().find(|c| c.id() == id)
    }

    pub fn stage(&self, id: u8) -> Option<&Arc<Stage>> {
        self.stages.iter().find(|s| s.id() == id)
    }

    pub fn z_safe(&self) -> f64 {
        self.config.deck.z_safe
    }

    /// Y spacing between two channels over a stage.
    pub fn tip_spacing(&self, channel1: u8, channel2: u8, stage: u8) -> Result<f64, ConfigError> {
        self.config.tip_spacing(channel1, channel2, stage)
    }

    /// Raise every channel to Z safe, then park X and W at home.
    pub fn return_channels_home(&self) -> Result<(), AxisFault> {
        for channel in &self.channels {
            channel
                .z()
                .move_absolute(self.z_safe(), None, None, false)
                .map_err(|f| f.on_channel(channel.id()))?;
        }
        for channel in &self.channels {
            channel
                .z()
                .wait_move_complete()
                .map_err(|f| f.on_channel(channel.id()))?;
        }
        for channel in &self.channels {
            let id = channel.id();
            channel
                .x()
                .move_absolute(channel.x_home(), None, None, false)
                .map_err(|f| f.on_channel(id))?;
            channel
                .w()
                .move_absolute(0.0, None, None, false)
                .map_err(|f| f.on_channel(id))?;
        }
        for channel in &self.channels {
            let id = channel.id();
            channel.x().wait_move_complete().map_err(|f| f.on_channel(id))?;
            channel.w().wait_move_complete().map_err(|f| f.on_channel(id))?;
        }
        info!("Channels returned home");
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
