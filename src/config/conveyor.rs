//! Conveyor configuration from TOML.

use serde::Deserialize;

/// Flow control settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConveyorConfig {
    /// How long a non-full queue collects moves before the first is released.
    #[serde(default = "default_queue_delay_time_ms")]
    pub queue_delay_time_ms: u32,
}

fn default_queue_delay_time_ms() -> u32 {
    100
}

impl Default for ConveyorConfig {
    fn default() -> Self {
        Self {
            queue_delay_time_ms: default_queue_delay_time_ms(),
        }
    }
}
