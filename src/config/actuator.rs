//! Actuator configuration from TOML.

use heapless::String;
use serde::Deserialize;

use super::units::StepsPerMm;

/// Per-actuator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ActuatorConfig {
    /// Human-readable name (max 16 chars), e.g. "alpha".
    pub name: String<16>,

    /// Resolution of the actuator.
    pub steps_per_mm: StepsPerMm,

    /// Invert direction pin logic.
    #[serde(default)]
    pub invert_direction: bool,
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_steps_per_mm_rejected_at_parse() {
        let result: Result<ActuatorConfig, _> = toml::from_str(
            r#"
name = "alpha"
steps_per_mm = -80.0
"#,
        );
        assert!(result.is_err());
    }
}
