//! # motion-core
//!
//! Motion planning and step generation for multi-axis machines (CNC mills,
//! 3D printers, laser cutters).
//!
//! ## Features
//!
//! - **Lock-free queue**: fixed capacity single-producer/single-consumer block
//!   queue, no allocation per move
//! - **Look-ahead planning**: junction deviation cornering with a reverse and
//!   forward pass over every queued block
//! - **Fixed point step generation**: per-actuator 2.62 ramps, no floating
//!   point in the step tick
//! - **embedded-hal 1.0**: `OutputPin` actuators, `DelayNs` for producer waits
//! - **no_std compatible**: the core library works without the standard library
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use motion_core::{
//!     Conveyor, ManualTickTimer, MoveQueue, MoveRequest, Planner, StdClock, StepTicker,
//!     VirtualActuator,
//! };
//!
//! let config = motion_core::load_config("motion.toml")?;
//!
//! let mut queue: MoveQueue<32> = MoveQueue::new();
//! let (producer, consumer, status) = queue.split();
//! let conveyor = Conveyor::new(status, StdClock::new(), &config.conveyor);
//! let mut planner = Planner::new(producer, &conveyor, &config, delay)?;
//! let mut ticker = StepTicker::new(consumer, &conveyor, timer, &config.step_ticker);
//! for _ in &config.actuators {
//!     ticker.register_actuator(VirtualActuator::new())?;
//! }
//! conveyor.start();
//! ticker.start()?;
//!
//! // producer context
//! planner.append_block(&MoveRequest::new(target, 100.0, 10.0, 1000.0));
//!
//! // timer interrupts
//! ticker.tick();
//! ticker.unstep_tick();
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O, TOML parsing and `StdClock`
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[macro_use]
mod fmt;

// Core modules
pub mod actuator;
pub mod config;
pub mod error;
pub mod motion;
pub mod timing;

// Re-exports for ergonomic API
pub use actuator::{Actuator, Milestone, StepperActuator, VirtualActuator};
pub use config::{validate_config, SystemConfig};
pub use error::{Error, Result};
pub use motion::{
    Block, Conveyor, FixedPoint, MoveQueue, MoveRequest, Planner, StepTicker, MAX_ACTUATORS,
};
pub use timing::{Clock, ManualClock, ManualTickTimer, TickTimer};

#[cfg(feature = "std")]
pub use timing::StdClock;

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{Hertz, Microseconds, Millimeters, MmPerSec, Steps, StepsPerMm};
