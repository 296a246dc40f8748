//! Configuration validation.

use crate::error::{ConfigError, Error, Result};

use super::SystemConfig;

/// Validate a system configuration.
///
/// Checks:
/// - At least one actuator, with unique names
/// - Junction deviations and minimum planner speed are finite and >= 0
/// - Step frequency is non-zero and the unstep pulse fits in one tick
pub fn validate_config(config: &SystemConfig) -> Result<()> {
    validate_actuators(config)?;
    validate_planner(&config.planner)?;
    validate_ticker(&config.step_ticker)?;
    Ok(())
}

fn validate_actuators(config: &SystemConfig) -> Result<()> {
    if config.actuators.is_empty() {
        return Err(Error::Config(ConfigError::NoActuators));
    }

    for (i, actuator) in config.actuators.iter().enumerate() {
        if config.actuators[..i]
            .iter()
            .any(|other| other.name == actuator.name)
        {
            return Err(Error::Config(ConfigError::DuplicateActuatorName(
                actuator.name.clone(),
            )));
        }
    }

    Ok(())
}

fn validate_planner(planner: &super::PlannerConfig) -> Result<()> {
    let deviations = core::iter::once(planner.junction_deviation)
        .chain(planner.z_junction_deviation);
    for deviation in deviations {
        if !deviation.0.is_finite() || deviation.0 < 0.0 {
            return Err(Error::Config(ConfigError::InvalidJunctionDeviation(
                deviation.0,
            )));
        }
    }

    let min_speed = planner.minimum_planner_speed.0;
    if !min_speed.is_finite() || min_speed < 0.0 {
        return Err(Error::Config(ConfigError::InvalidMinimumPlannerSpeed(
            min_speed,
        )));
    }

    Ok(())
}

fn validate_ticker(ticker: &super::StepTickerConfig) -> Result<()> {
    if ticker.frequency.value() == 0 {
        return Err(Error::Config(ConfigError::InvalidFrequency(0)));
    }

    if !ticker.unstep_fits() {
        return Err(Error::Config(ConfigError::InvalidUnstepTime {
            unstep_us: ticker.unstep_time.value(),
            period_us: ticker.frequency.period_us(),
        }));
    }

    Ok(())
}
