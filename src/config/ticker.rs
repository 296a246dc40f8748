//! Step ticker configuration from TOML.

use serde::Deserialize;

use super::units::{Hertz, Microseconds};

/// Step generation timing.
#[derive(Debug, Clone, Deserialize)]
pub struct StepTickerConfig {
    /// Rate of the step tick.
    #[serde(default = "default_frequency", rename = "frequency_hz")]
    pub frequency: Hertz,

    /// Step pulse width.
    #[serde(default = "default_unstep_time", rename = "unstep_time_us")]
    pub unstep_time: Microseconds,
}

fn default_frequency() -> Hertz {
    Hertz(100_000)
}

fn default_unstep_time() -> Microseconds {
    Microseconds(1)
}

impl Default for StepTickerConfig {
    fn default() -> Self {
        Self {
            frequency: default_frequency(),
            unstep_time: default_unstep_time(),
        }
    }
}

impl StepTickerConfig {
    /// Tick frequency as a float, as used by the planner.
    #[inline]
    pub fn frequency_f32(&self) -> f32 {
        self.frequency.value() as f32
    }

    /// `true` if the pulse fits inside one tick with 1us to spare.
    pub fn unstep_fits(&self) -> bool {
        let period = self.frequency.period_us();
        period > 0 && self.unstep_time.value() < period
    }
}
