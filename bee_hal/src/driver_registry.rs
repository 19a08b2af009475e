//! Driver registry for axis drivers.
//!
//! Maps a driver name from the deck configuration to a factory that builds
//! one axis. Constructed at startup and passed to [`Deck::from_config`]; no
//! global state.
//!
//! [`Deck::from_config`]: crate::deck::Deck::from_config

use crate::HalError;
use crate::sim_axis::SimulatedAxis;
use bee_common::axis::Axis;
use std::collections::HashMap;
use std::sync::Arc;

/// What a factory needs to know to build an axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec {
    /// Axis name, e.g. `"ch1.z"` or `"stage2.r"`.
    pub name: String,
    /// Simulated move duration multiplier.
    pub time_scale: f64,
}

/// Factory function type for creating axis instances.
pub type AxisFactory = fn(&AxisSpec) -> Arc<dyn Axis>;

fn simulated(spec: &AxisSpec) -> Arc<dyn Axis> {
    Arc::new(SimulatedAxis::new(spec.name.clone(), spec.time_scale))
}

/// Registry of available axis drivers.
pub struct DriverRegistry {
    factories: HashMap<&'static str, AxisFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in `"simulation"` driver.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.factories.insert("simulation", simulated as AxisFactory);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Errors
    /// Returns `HalError::DuplicateDriver` if the name is already taken.
    pub fn register(&mut self, name: &'static str, factory: AxisFactory) -> Result<(), HalError> {
        if self.factories.contains_key(name) {
            return Err(HalError::DuplicateDriver(name.to_string()));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<AxisFactory> {
        self.factories.get(name).copied()
    }

    /// Build one axis with the named driver.
    ///
    /// # Errors
    /// Returns `HalError::DriverNotFound` if no driver with the given name is registered.
    pub fn create_axis(&self, driver: &str, spec: &AxisSpec) -> Result<Arc<dyn Axis>, HalError> {
        let factory = self
            .get_factory(driver)
            .ok_or_else(|| HalError::DriverNotFound(driver.to_string()))?;
        Ok(factory(spec))
    }

    /// List all registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
