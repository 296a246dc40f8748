//! Planner configuration from TOML.

use serde::Deserialize;

use super::units::{Millimeters, MmPerSec};

/// Cornering and speed floor settings for the planner.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Allowed deviation from the ideal path at a corner.
    #[serde(default = "default_junction_deviation", rename = "junction_deviation_mm")]
    pub junction_deviation: Millimeters,

    /// Deviation used instead for moves of the third primary axis alone.
    #[serde(default, rename = "z_junction_deviation_mm")]
    pub z_junction_deviation: Option<Millimeters>,

    /// Speed every block must be able to decelerate to.
    #[serde(default, rename = "minimum_planner_speed_mm_per_sec")]
    pub minimum_planner_speed: MmPerSec,
}

fn default_junction_deviation() -> Millimeters {
    Millimeters(0.05)
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            junction_deviation: default_junction_deviation(),
            z_junction_deviation: None,
            minimum_planner_speed: MmPerSec(0.0),
        }
    }
}
