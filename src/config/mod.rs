//! Configuration module for motion-core.
//!
//! Provides types for loading and validating planner, conveyor, step ticker
//! and actuator configuration from TOML files (with `std` feature) or
//! pre-parsed data.

mod actuator;
mod conveyor;
mod planner;
mod system;
mod ticker;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use actuator::ActuatorConfig;
pub use conveyor::ConveyorConfig;
pub use planner::PlannerConfig;
pub use system::SystemConfig;
pub use ticker::StepTickerConfig;
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Hertz, Microseconds, Millimeters, MmPerSec, Steps, StepsPerMm};
