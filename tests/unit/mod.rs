//! Unit test harness for motion-core.
//!
//! Configuration loading and validation through the public API.

mod config_parsing;
mod config_validation;
