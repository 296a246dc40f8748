//! Hardware-free actuator for dry runs and simulation.

use super::Actuator;

/// Actuator that only counts.
#[derive(Debug, Clone, Default)]
pub struct VirtualActuator {
    reverse: bool,
    position: i32,
    moving: bool,
    pin_high: bool,
    pulses: u32,
    stop_after: Option<u32>,
}

impl VirtualActuator {
    /// Create an actuator at position zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Step pulses issued since creation.
    #[inline]
    pub fn pulses(&self) -> u32 {
        self.pulses
    }

    /// `true` between a step and its unstep.
    #[inline]
    pub fn is_pin_high(&self) -> bool {
        self.pin_high
    }

    /// Report an external stop once this many pulses have been issued,
    /// as a triggered endstop would.
    pub fn stop_after(&mut self, pulses: u32) {
        self.stop_after = Some(pulses);
    }
}

impl Actuator for VirtualActuator {
    fn set_direction(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    fn step(&mut self) -> bool {
        self.pin_high = true;
        self.pulses += 1;
        self.position += if self.reverse { -1 } else { 1 };
        if self.stop_after.is_some_and(|limit| self.pulses >= limit) {
            self.moving = false;
        }
        self.moving
    }

    fn unstep(&mut self) {
        self.pin_high = false;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_pulses_and_position() {
        let mut a = VirtualActuator::new();
        a.start_moving();
        a.set_direction(true);
        assert!(a.step());
        assert!(a.is_pin_high());
        a.unstep();
        assert!(!a.is_pin_high());
        assert_eq!(a.pulses(), 1);
        assert_eq!(a.current_position_steps(), -1);
    }

    #[test]
    fn test_external_stop() {
        let mut a = VirtualActuator::new();
        a.stop_after(2);
        a.start_moving();
        assert!(a.step());
        assert!(!a.step());
        assert!(!a.is_moving());
    }
}
