//! Planned move descriptor.

use core::fmt;

use super::fixed::FixedPoint;

/// Maximum number of actuators a block can describe.
pub const MAX_ACTUATORS: usize = 6;

/// Number of leading actuators treated as primary (geometric) axes.
pub const N_PRIMARY_AXIS: usize = 3;

/// Actuator index of the first primary axis.
pub const ALPHA: usize = 0;
/// Actuator index of the second primary axis.
pub const BETA: usize = 1;
/// Actuator index of the third primary axis (Z on cartesian machines).
pub const GAMMA: usize = 2;

/// Target position of every actuator in millimeters.
pub type ActuatorCoordinates = [f32; MAX_ACTUATORS];

/// Per-actuator ramp state for one block.
///
/// All rates are in steps per tick, all changes in steps per tick per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RampInfo {
    /// Current rate.
    pub steps_per_tick: FixedPoint,
    /// Fractional step accumulator.
    pub counter: FixedPoint,
    /// Rate change applied every tick (signed).
    pub acceleration_change: FixedPoint,
    /// Rate change applied once deceleration starts (negative).
    pub deceleration_change: FixedPoint,
    /// Cruise rate.
    pub plateau_rate: FixedPoint,
    /// Steps this actuator has to issue. Zero means inactive.
    pub steps_to_move: u32,
    /// Steps issued so far.
    pub step_count: u32,
    /// Tick at which the ramp changes phase.
    pub next_accel_event: u32,
}

impl RampInfo {
    /// Inactive ramp.
    pub const IDLE: Self = Self {
        steps_per_tick: FixedPoint::ZERO,
        counter: FixedPoint::ZERO,
        acceleration_change: FixedPoint::ZERO,
        deceleration_change: FixedPoint::ZERO,
        plateau_rate: FixedPoint::ZERO,
        steps_to_move: 0,
        step_count: 0,
        next_accel_event: 0,
    };
}

/// One planned move: step counts for every actuator plus its velocity trapezoid.
///
/// Blocks live inside the [`MoveQueue`](super::MoveQueue) and are reused in
/// place; they are never allocated per move. The cross-context `locked` and
/// `is_ticking` flags are kept by the queue slot that holds the block.
#[derive(Debug, Clone)]
pub struct Block {
    /// Steps for each actuator.
    pub steps: [u32; MAX_ACTUATORS],
    /// `true` when the actuator moves in the negative direction.
    pub direction_bits: [bool; MAX_ACTUATORS],
    /// Steps of the dominant actuator.
    pub steps_event_count: u32,
    /// Nominal rate in steps per second.
    pub nominal_rate: f32,
    /// Nominal speed in mm per second.
    pub nominal_speed: f32,
    /// Length of the move.
    pub millimeters: f32,
    /// Acceleration in mm/s².
    pub acceleration: f32,
    /// Planned entry speed in mm/s.
    pub entry_speed: f32,
    /// Exit speed used by the last trapezoid computation, mm/s.
    pub exit_speed: f32,
    /// Junction speed limit in mm/s.
    pub max_entry_speed: f32,
    /// Entry rate in steps per second.
    pub initial_rate: f32,
    /// Peak rate in steps per second.
    pub maximum_rate: f32,

    /// Tick at which acceleration ends.
    pub accelerate_until: u32,
    /// Tick at which deceleration starts.
    pub decelerate_after: u32,
    /// Length of the move in ticks.
    pub total_move_ticks: u32,

    /// Ramp for each actuator, prepared for the step ticker.
    pub ramp: [RampInfo; MAX_ACTUATORS],

    /// Trapezoid must be recomputed when the queue changes.
    pub recalculate: bool,
    /// Nominal speed is reachable regardless of neighbours.
    pub nominal_length: bool,
    /// Fully planned and committable.
    pub ready: bool,
    /// Moves at least one primary axis.
    pub primary_axis: bool,
    /// Came from a G1/G2/G3 (feed) move.
    pub is_g123: bool,
    /// Auxiliary output level, 1.11 fixed point (12 bits).
    pub s_value: u16,
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

impl Block {
    /// Largest 1.11 fixed point auxiliary value.
    pub const S_VALUE_MAX: u16 = 0x0FFF;

    /// Create an empty block.
    pub const fn new() -> Self {
        Self {
            steps: [0; MAX_ACTUATORS],
            direction_bits: [false; MAX_ACTUATORS],
            steps_event_count: 0,
            nominal_rate: 0.0,
            nominal_speed: 0.0,
            millimeters: 0.0,
            // avoids divide by zero if never set
            acceleration: 100.0,
            entry_speed: 0.0,
            exit_speed: 0.0,
            max_entry_speed: 0.0,
            initial_rate: 0.0,
            maximum_rate: 0.0,
            accelerate_until: 0,
            decelerate_after: 0,
            total_move_ticks: 0,
            ramp: [RampInfo::IDLE; MAX_ACTUATORS],
            recalculate: false,
            nominal_length: false,
            ready: false,
            primary_axis: false,
            is_g123: false,
            s_value: 0,
        }
    }

    /// Reset the block so the slot can be reused.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Mark the block as fully planned.
    #[inline]
    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// `true` if any actuator has steps.
    #[inline]
    pub fn has_steps(&self) -> bool {
        self.steps.iter().any(|&s| s != 0)
    }

    /// Store an auxiliary level in 1.11 fixed point, clamped to 12 bits.
    pub fn set_s_value(&mut self, value: f32) {
        let raw = libm::roundf(value * (1 << 11) as f32);
        self.s_value = if raw <= 0.0 {
            0
        } else if raw >= Self::S_VALUE_MAX as f32 {
            Self::S_VALUE_MAX
        } else {
            raw as u16
        };
    }

    /// Auxiliary level as a float.
    #[inline]
    pub fn s_value_f32(&self) -> f32 {
        self.s_value as f32 / (1 << 11) as f32
    }

    /// Ramp rate of an actuator in steps per second at the given tick frequency.
    pub fn trapezoid_rate(&self, axis: usize, frequency: f32) -> f32 {
        self.ramp
            .get(axis)
            .map(|r| r.steps_per_tick.to_f32() * frequency)
            .unwrap_or(0.0)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "steps:")?;
        for (i, s) in self.steps.iter().enumerate() {
            let sign = if self.direction_bits[i] { "-" } else { "" };
            write!(f, " {}{}", sign, s)?;
        }
        write!(
            f,
            " (max:{}) nominal:r{:.4}/s{:.4} mm:{:.4} acc:{:.2} accu:{} decu:{} ticks:{} \
             rates:{:.4}/{:.4} entry/max:{:.4}/{:.4} exit:{:.4} primary:{} ready:{} recalc:{} nomlen:{}",
            self.steps_event_count,
            self.nominal_rate,
            self.nominal_speed,
            self.millimeters,
            self.acceleration,
            self.accelerate_until,
            self.decelerate_after,
            self.total_move_ticks,
            self.initial_rate,
            self.maximum_rate,
            self.entry_speed,
            self.max_entry_speed,
            self.exit_speed,
            self.primary_axis,
            self.ready,
            self.recalculate,
            self.nominal_length,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_resets_everything() {
        let mut block = Block::new();
        block.steps[1] = 42;
        block.recalculate = true;
        block.ramp[1].steps_to_move = 42;
        block.total_move_ticks = 99;

        block.clear();

        assert!(!block.has_steps());
        assert!(!block.recalculate);
        assert_eq!(block.ramp[1], RampInfo::IDLE);
        assert_eq!(block.total_move_ticks, 0);
        assert_eq!(block.acceleration, 100.0);
    }

    #[test]
    fn test_s_value_is_twelve_bit() {
        let mut block = Block::new();

        block.set_s_value(0.5);
        assert_eq!(block.s_value, 1024);
        assert!((block.s_value_f32() - 0.5).abs() < 1e-6);

        block.set_s_value(1.0);
        assert_eq!(block.s_value, 2048);

        block.set_s_value(5.0);
        assert_eq!(block.s_value, Block::S_VALUE_MAX);

        block.set_s_value(-1.0);
        assert_eq!(block.s_value, 0);
    }

    #[test]
    fn test_trapezoid_rate() {
        let mut block = Block::new();
        block.ramp[0].steps_per_tick = FixedPoint::from_f64(0.1);

        assert!((block.trapezoid_rate(0, 100_000.0) - 10_000.0).abs() < 0.01);
        assert_eq!(block.trapezoid_rate(MAX_ACTUATORS, 100_000.0), 0.0);
    }
}
