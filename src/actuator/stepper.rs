//! STEP/DIR stepper driver actuator.
//!
//! Generic over embedded-hal 1.0 pin types.

use embedded_hal::digital::OutputPin;

use super::Actuator;
use crate::config::ActuatorConfig;

/// Stepper driver wired to a STEP and a DIR pin.
///
/// Pin errors cannot be propagated out of the step tick; a failed STEP write
/// stops the actuator for the rest of the block and is counted in
/// [`pin_faults`](Self::pin_faults).
pub struct StepperActuator<STEP, DIR>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    /// STEP pin (pulse to move one step).
    step_pin: STEP,

    /// DIR pin (high = negative, or positive when inverted).
    dir_pin: DIR,

    /// Whether direction pin logic is inverted.
    invert_direction: bool,

    /// Current direction, `true` = negative.
    reverse: bool,

    /// Absolute position in steps.
    position: i32,

    /// Set while the step ticker is issuing steps.
    moving: bool,

    /// Failed pin writes.
    pin_faults: u32,
}

impl<STEP, DIR> StepperActuator<STEP, DIR>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    /// Create an actuator at position zero.
    pub fn new(step_pin: STEP, dir_pin: DIR, invert_direction: bool) -> Self {
        Self {
            step_pin,
            dir_pin,
            invert_direction,
            reverse: false,
            position: 0,
            moving: false,
            pin_faults: 0,
        }
    }

    /// Create an actuator for a configured axis.
    pub fn from_config(config: &ActuatorConfig, step_pin: STEP, dir_pin: DIR) -> Self {
        Self::new(step_pin, dir_pin, config.invert_direction)
    }

    /// Current direction, `true` = negative.
    #[inline]
    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    /// Number of failed pin writes since creation.
    #[inline]
    pub fn pin_faults(&self) -> u32 {
        self.pin_faults
    }

    /// Overwrite the absolute position, e.g. after homing.
    #[inline]
    pub fn set_position_steps(&mut self, steps: i32) {
        self.position = steps;
    }

    /// Release the pins.
    pub fn release(self) -> (STEP, DIR) {
        (self.step_pin, self.dir_pin)
    }
}

impl<STEP, DIR> Actuator for StepperActuator<STEP, DIR>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    fn set_direction(&mut self, reverse: bool) {
        let pin_high = reverse != self.invert_direction;
        let result = if pin_high {
            self.dir_pin.set_high()
        } else {
            self.dir_pin.set_low()
        };
        if result.is_err() {
            self.pin_faults = self.pin_faults.wrapping_add(1);
        }
        self.reverse = reverse;
    }

    fn step(&mut self) -> bool {
        if self.step_pin.set_high().is_err() {
            self.pin_faults = self.pin_faults.wrapping_add(1);
            self.moving = false;
            return false;
        }
        self.position += if self.reverse { -1 } else { 1 };
        self.moving
    }

    fn unstep(&mut self) {
        if self.step_pin.set_low().is_err() {
            self.pin_faults = self.pin_faults.wrapping_add(1);
        }
    }

    fn start_moving(&mut self) {
        self.moving = true;
    }

    fn stop_moving(&mut self) {
        self.moving = false;
    }

    fn is_moving(&self) -> bool {
        self.moving
    }

    fn current_position_steps(&self) -> i32 {
        self.position
    }
}
