//! Actuators driven by the step ticker.
//!
//! The real-time side only needs to pulse a pin and track position, so the
//! [`Actuator`] trait is deliberately small. The producer-side position
//! bookkeeping (last planned milestone) lives in [`Milestone`] and is owned by
//! the planner, which keeps the two contexts from sharing mutable state.

mod milestone;
mod stepper;
mod virtual_axis;

pub use milestone::Milestone;
pub use stepper::StepperActuator;
pub use virtual_axis::VirtualActuator;

/// Contract between the step ticker and one motor.
///
/// Every method is called from the real-time tick and must not block.
pub trait Actuator {
    /// Set the direction for the next steps. `true` means negative.
    fn set_direction(&mut self, reverse: bool);

    /// Issue one step pulse and advance the absolute position.
    ///
    /// Returns `false` if the actuator was stopped externally (endstop, probe)
    /// and should not be stepped further in this block.
    fn step(&mut self) -> bool;

    /// End the step pulse started by [`step`](Self::step).
    fn unstep(&mut self);

    /// Mark the actuator as moving.
    fn start_moving(&mut self);

    /// Mark the actuator as stopped.
    fn stop_moving(&mut self);

    /// `true` while the actuator still has steps to issue.
    fn is_moving(&self) -> bool;

    /// Absolute position in steps.
    fn current_position_steps(&self) -> i32;
}
