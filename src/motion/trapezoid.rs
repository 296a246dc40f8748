//! Velocity trapezoid and per-actuator ramp computation.
//!
//! A block's trapezoid is worked out in steps per second for the dominant
//! actuator, rounded to whole ticks, and then handed to every other actuator
//! as a scaled copy. Rates are re-derived from the rounded tick counts so the
//! ramp lands exactly on the planned peak rate.

use libm::{floorf, sqrtf};

use super::block::{Block, MAX_ACTUATORS};
use super::fixed::FixedPoint;
use crate::config::Hertz;

/// Tick rate constants used to turn trapezoids into fixed point ramps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickScale {
    frequency: f32,
    /// 2^62 / frequency², turns steps/s² into 2.62 steps/tick².
    fp_scale: f64,
}

impl TickScale {
    /// Constants for a step tick at `frequency`.
    pub fn new(frequency: Hertz) -> Self {
        let f = frequency.value() as f64;
        Self {
            frequency: frequency.value() as f32,
            fp_scale: FixedPoint::SCALE as f64 / (f * f),
        }
    }

    /// Tick frequency in hertz.
    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }
}

/// Highest speed from which `target_speed` can still be reached within
/// `distance` while slowing down at `deceleration`.
#[inline]
pub fn max_allowable_speed(deceleration: f32, target_speed: f32, distance: f32) -> f32 {
    sqrtf((target_speed * target_speed + 2.0 * deceleration * distance).max(0.0))
}

/// Compute the trapezoid of `block` between `entry_speed` and `exit_speed`
/// (mm/s) and prepare its ramps.
///
/// The caller must make sure the step ticker is not executing the block.
pub fn calculate_trapezoid(block: &mut Block, entry_speed: f32, exit_speed: f32, scale: TickScale) {
    if block.nominal_speed <= 0.0 || block.millimeters <= 0.0 || block.nominal_rate <= 0.0 {
        // nothing to ramp; any steps are issued one per tick
        block.initial_rate = 0.0;
        block.maximum_rate = 0.0;
        block.accelerate_until = 0;
        block.decelerate_after = 0;
        block.total_move_ticks = 0;
        block.exit_speed = exit_speed;
        prepare(block, 0.0, 0.0, scale);
        return;
    }

    let frequency = scale.frequency;
    let steps = block.steps_event_count as f32;

    let initial_rate = block.nominal_rate * (entry_speed / block.nominal_speed);
    let final_rate = block.nominal_rate * (exit_speed / block.nominal_speed);

    // steps/s² of the dominant actuator
    let acceleration_per_second = (block.acceleration * steps) / block.millimeters;

    let maximum_possible_rate = sqrtf(
        (steps * acceleration_per_second)
            + ((initial_rate * initial_rate + final_rate * final_rate) / 2.0),
    );
    block.maximum_rate = maximum_possible_rate.min(block.nominal_rate);

    let time_to_accelerate = (block.maximum_rate - initial_rate) / acceleration_per_second;
    let time_to_decelerate = (final_rate - block.maximum_rate) / -acceleration_per_second;

    let mut plateau_time = 0.0;
    if maximum_possible_rate > block.nominal_rate {
        let acceleration_distance = ((initial_rate + block.maximum_rate) / 2.0) * time_to_accelerate;
        let deceleration_distance = ((block.maximum_rate + final_rate) / 2.0) * time_to_decelerate;
        let plateau_distance = steps - acceleration_distance - deceleration_distance;
        plateau_time = (plateau_distance / block.maximum_rate).max(0.0);
    }

    let total_move_time = time_to_accelerate + time_to_decelerate + plateau_time;

    // float to int casts saturate, so a tiny negative time becomes 0 ticks
    let acceleration_ticks = floorf(time_to_accelerate * frequency) as u32;
    let deceleration_ticks = floorf(time_to_decelerate * frequency) as u32;
    let total_move_ticks = (floorf(total_move_time * frequency) as u32)
        .max(acceleration_ticks.saturating_add(deceleration_ticks));

    // rates that reach maximum_rate in exactly the rounded tick counts
    let acceleration_time = acceleration_ticks as f32 / frequency;
    let deceleration_time = deceleration_ticks as f32 / frequency;

    let acceleration_in_steps = if acceleration_time > 0.0 {
        (block.maximum_rate - initial_rate) / acceleration_time
    } else {
        0.0
    };
    let deceleration_in_steps = if deceleration_time > 0.0 {
        (block.maximum_rate - final_rate) / deceleration_time
    } else {
        0.0
    };

    block.accelerate_until = acceleration_ticks;
    block.decelerate_after = total_move_ticks - deceleration_ticks;
    block.total_move_ticks = total_move_ticks;
    block.initial_rate = initial_rate;
    block.exit_speed = exit_speed;

    prepare(block, acceleration_in_steps, deceleration_in_steps, scale);
}

/// Fill the per-actuator ramps from the block trapezoid.
///
/// Every actuator runs its own ramp scaled by its share of the dominant
/// actuator's steps.
fn prepare(block: &mut Block, acceleration_in_steps: f32, deceleration_in_steps: f32, scale: TickScale) {
    let inv = 1.0 / block.steps_event_count.max(1) as f32;
    let frequency = scale.frequency as f64;

    let acceleration_per_tick = acceleration_in_steps as f64 * scale.fp_scale;
    let deceleration_per_tick = deceleration_in_steps as f64 * scale.fp_scale;

    let initial_rate = block.initial_rate as f64;
    let maximum_rate = block.maximum_rate as f64;
    let accelerate_until = block.accelerate_until;
    let decelerate_after = block.decelerate_after;
    let total_move_ticks = block.total_move_ticks;

    for m in 0..MAX_ACTUATORS {
        let steps = block.steps[m];
        let ramp = &mut block.ramp[m];
        ramp.steps_to_move = steps;
        if steps == 0 {
            continue;
        }

        let ratio = (inv * steps as f32) as f64;

        ramp.steps_per_tick = FixedPoint::from_f64((initial_rate * ratio) / frequency);
        ramp.counter = FixedPoint::ZERO;
        ramp.step_count = 0;
        ramp.next_accel_event = total_move_ticks.saturating_add(1);

        let mut acceleration_change = 0.0;
        if accelerate_until != 0 {
            ramp.next_accel_event = accelerate_until;
            acceleration_change = acceleration_per_tick;
        } else if decelerate_after == 0 {
            // starts decelerating
            acceleration_change = -deceleration_per_tick;
        } else if decelerate_after != total_move_ticks {
            ramp.next_accel_event = decelerate_after;
        }

        ramp.acceleration_change = FixedPoint::from_scaled_f64(acceleration_change * ratio);
        ramp.deceleration_change = -FixedPoint::from_scaled_f64(deceleration_per_tick * ratio);
        ramp.plateau_rate = FixedPoint::from_f64((maximum_rate * ratio) / frequency);
    }
}
