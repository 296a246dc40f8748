//! Unit tests for configuration validation.

use motion_core::config::{parse_config, validate_config, SystemConfig};
use motion_core::error::{ConfigError, Error};

fn with_actuators(sections: &str) -> String {
    format!(
        "{}\n[[actuators]]\nname = \"alpha\"\nsteps_per_mm = 80.0\n\n[[actuators]]\nname = \"beta\"\nsteps_per_mm = 80.0\n",
        sections
    )
}

/// Test validation of a valid configuration.
#[test]
fn test_valid_config_passes_validation() {
    let config: SystemConfig =
        toml::from_str(&with_actuators("")).expect("Failed to parse TOML");
    assert!(validate_config(&config).is_ok());
}

/// Test validation fails without actuators.
#[test]
fn test_empty_config_fails() {
    let config: SystemConfig = toml::from_str("").expect("Failed to parse TOML");
    assert_eq!(
        validate_config(&config),
        Err(Error::Config(ConfigError::NoActuators))
    );
}

/// Test validation fails for repeated actuator names.
#[test]
fn test_duplicate_actuator_names() {
    let toml_str = r#"
[[actuators]]
name = "alpha"
steps_per_mm = 80.0

[[actuators]]
name = "alpha"
steps_per_mm = 100.0
"#;

    let config: SystemConfig = toml::from_str(toml_str).expect("Failed to parse TOML");
    let result = validate_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::DuplicateActuatorName(ref name))) if name.as_str() == "alpha"
    ));
}

/// Test validation fails for a negative junction deviation.
#[test]
fn test_negative_junction_deviation() {
    let toml_str = with_actuators("[planner]\njunction_deviation_mm = -0.1\n");
    assert!(matches!(
        parse_config(&toml_str),
        Err(Error::Config(ConfigError::InvalidJunctionDeviation(_)))
    ));
}

/// Test validation fails for a negative minimum planner speed.
#[test]
fn test_negative_minimum_planner_speed() {
    let toml_str = with_actuators("[planner]\nminimum_planner_speed_mm_per_sec = -2.0\n");
    assert!(matches!(
        parse_config(&toml_str),
        Err(Error::Config(ConfigError::InvalidMinimumPlannerSpeed(_)))
    ));
}

/// Test validation fails when the pulse does not fit in one tick.
#[test]
fn test_unstep_must_fit_period() {
    // 100 kHz leaves a 10us period
    let toml_str = with_actuators("[step_ticker]\nfrequency_hz = 100000\nunstep_time_us = 10\n");
    assert_eq!(
        parse_config(&toml_str).unwrap_err(),
        Error::Config(ConfigError::InvalidUnstepTime {
            unstep_us: 10,
            period_us: 10,
        })
    );

    let toml_str = with_actuators("[step_ticker]\nfrequency_hz = 100000\nunstep_time_us = 9\n");
    assert!(parse_config(&toml_str).is_ok());
}

/// Test that error messages name the offending value.
#[test]
fn test_error_display() {
    let err = Error::Config(ConfigError::InvalidFrequency(0));
    assert_eq!(
        err.to_string(),
        "Configuration error: Invalid step frequency: 0. Must be > 0"
    );
}
