//! System configuration - root configuration structure.

use heapless::Vec;
use serde::Deserialize;

use crate::motion::MAX_ACTUATORS;

use super::actuator::ActuatorConfig;
use super::conveyor::ConveyorConfig;
use super::planner::PlannerConfig;
use super::ticker::StepTickerConfig;

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemConfig {
    /// Planner settings.
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Conveyor settings.
    #[serde(default)]
    pub conveyor: ConveyorConfig,

    /// Step ticker settings.
    #[serde(default)]
    pub step_ticker: StepTickerConfig,

    /// Actuators in motor order.
    #[serde(default)]
    pub actuators: Vec<ActuatorConfig, MAX_ACTUATORS>,
}

impl SystemConfig {
    /// Get an actuator configuration by name.
    pub fn actuator(&self, name: &str) -> Option<&ActuatorConfig> {
        self.actuators.iter().find(|a| a.name.as_str() == name)
    }

    /// Motor index of an actuator by name.
    pub fn actuator_index(&self, name: &str) -> Option<usize> {
        self.actuators.iter().position(|a| a.name.as_str() == name)
    }

    /// List all actuator names in motor order.
    pub fn actuator_names(&self) -> impl Iterator<Item = &str> {
        self.actuators.iter().map(|a| a.name.as_str())
    }
}
