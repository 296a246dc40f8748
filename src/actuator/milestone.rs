//! Planned position tracking for one actuator.
//!
//! The milestone is where the planner believes the actuator will be once all
//! queued blocks have run. Step deltas for new moves are computed against it,
//! so rounding never accumulates across moves.

use crate::config::units::{Millimeters, Steps, StepsPerMm};

/// Last planned position of an actuator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Milestone {
    /// Resolution used for conversions
    steps_per_mm: StepsPerMm,
    /// Last milestone in steps
    steps: Steps,
    /// Last milestone as requested, in millimeters
    mm: Millimeters,
}

impl Milestone {
    /// Create a milestone at the origin.
    #[inline]
    pub fn new(steps_per_mm: StepsPerMm) -> Self {
        Self {
            steps_per_mm,
            steps: Steps::default(),
            mm: Millimeters::default(),
        }
    }

    /// Signed steps from the milestone to a target position.
    #[inline]
    pub fn steps_to_target(&self, target: Millimeters) -> i32 {
        (Steps::from_mm(target, self.steps_per_mm) - self.steps).value()
    }

    /// Record that a move of `steps` toward `target` has been planned.
    #[inline]
    pub fn update_last_milestone(&mut self, target: Millimeters, steps: i32) {
        self.steps = self.steps + Steps(steps);
        self.mm = target;
    }

    /// Force the milestone, e.g. after homing or a halt.
    #[inline]
    pub fn set_last_milestone(&mut self, mm: Millimeters) {
        self.mm = mm;
        self.steps = Steps::from_mm(mm, self.steps_per_mm);
    }

    /// Change resolution, keeping the position in millimeters.
    pub fn change_steps_per_mm(&mut self, steps_per_mm: StepsPerMm) {
        self.steps_per_mm = steps_per_mm;
        self.steps = Steps::from_mm(self.mm, steps_per_mm);
    }

    /// Last milestone in steps.
    #[inline]
    pub fn steps(&self) -> Steps {
        self.steps
    }

    /// Last milestone in millimeters.
    #[inline]
    pub fn mm(&self) -> Millimeters {
        self.mm
    }

    /// Resolution.
    #[inline]
    pub fn steps_per_mm(&self) -> StepsPerMm {
        self.steps_per_mm
    }
}
