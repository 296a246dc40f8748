//! Unit tests for TOML configuration parsing.

use std::fs;

use motion_core::config::{load_config, parse_config, SystemConfig};
use motion_core::error::{ConfigError, Error};

const MACHINE: &str = r#"
[planner]
junction_deviation_mm = 0.02
z_junction_deviation_mm = 0.0
minimum_planner_speed_mm_per_sec = 1.5

[conveyor]
queue_delay_time_ms = 50

[step_ticker]
frequency_hz = 200000
unstep_time_us = 2

[[actuators]]
name = "alpha"
steps_per_mm = 80.0

[[actuators]]
name = "beta"
steps_per_mm = 80.0
invert_direction = true

[[actuators]]
name = "gamma"
steps_per_mm = 1600.0
"#;

/// Test parsing every section of a machine description.
#[test]
fn test_parse_machine() {
    let config = parse_config(MACHINE).expect("Failed to parse config");

    assert!((config.planner.junction_deviation.value() - 0.02).abs() < 1e-6);
    assert_eq!(config.planner.z_junction_deviation.map(|d| d.value()), Some(0.0));
    assert!((config.planner.minimum_planner_speed.value() - 1.5).abs() < 1e-6);
    assert_eq!(config.conveyor.queue_delay_time_ms, 50);
    assert_eq!(config.step_ticker.frequency.value(), 200_000);
    assert_eq!(config.step_ticker.unstep_time.value(), 2);

    let beta = config.actuator("beta").expect("Actuator not found");
    assert!(beta.invert_direction);
    assert_eq!(config.actuator_index("gamma"), Some(2));
    assert!((config.actuators[2].steps_per_mm.value() - 1600.0).abs() < 1e-3);
}

/// Test that omitted sections fall back to defaults.
#[test]
fn test_defaults_for_missing_sections() {
    let toml_str = r#"
[[actuators]]
name = "alpha"
steps_per_mm = 100.0
"#;

    let config: SystemConfig = toml::from_str(toml_str).expect("Failed to parse TOML");

    assert!((config.planner.junction_deviation.value() - 0.05).abs() < 1e-6);
    assert!(config.planner.z_junction_deviation.is_none());
    assert_eq!(config.planner.minimum_planner_speed.value(), 0.0);
    assert_eq!(config.conveyor.queue_delay_time_ms, 100);
    assert_eq!(config.step_ticker.frequency.value(), 100_000);
    assert_eq!(config.step_ticker.unstep_time.value(), 1);
}

/// Test that a non-positive resolution is rejected while deserializing.
#[test]
fn test_parse_rejects_zero_steps_per_mm() {
    let toml_str = r#"
[[actuators]]
name = "alpha"
steps_per_mm = 0.0
"#;

    assert!(matches!(
        parse_config(toml_str),
        Err(Error::Config(ConfigError::ParseError(_)))
    ));
}

/// Test that more actuators than a block can describe do not parse.
#[test]
fn test_parse_rejects_seven_actuators() {
    let mut toml_str = String::new();
    for name in ["a", "b", "c", "d", "e", "f", "g"] {
        toml_str.push_str(&format!("[[actuators]]\nname = \"{}\"\nsteps_per_mm = 80.0\n\n", name));
    }

    assert!(parse_config(&toml_str).is_err());
}

/// Test that malformed TOML reports a parse error.
#[test]
fn test_parse_rejects_garbage() {
    assert!(matches!(
        parse_config("[[actuators]\nname ="),
        Err(Error::Config(ConfigError::ParseError(_)))
    ));
}

/// Test loading a configuration file from disk.
#[test]
fn test_load_config_from_file() {
    let path = std::env::temp_dir().join(format!("motion-core-{}.toml", std::process::id()));
    fs::write(&path, MACHINE).expect("Failed to write config");

    let loaded = load_config(&path);
    let _ = fs::remove_file(&path);

    let config = loaded.expect("Failed to load config");
    let names: Vec<_> = config.actuator_names().collect();
    assert_eq!(names, ["alpha", "beta", "gamma"]);
}
