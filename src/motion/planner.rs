//! Move planning.
//!
//! The planner turns move requests into blocks at the head of the queue and
//! keeps the velocity plan of every queued block optimal. Each new block is
//! decelerated to `minimum_planner_speed` at its end; later arrivals raise
//! the exit speeds of earlier blocks through a reverse pass (how fast may a
//! block enter and still slow down in time) and a forward pass (how fast can
//! it actually get given the previous block).
//!
//! Blocks already handed to the step ticker are never rewritten. The planner
//! only reads their cached exit speed.

use core::fmt;

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use libm::sqrtf;

use super::block::{ActuatorCoordinates, Block, ALPHA, BETA, GAMMA, MAX_ACTUATORS, N_PRIMARY_AXIS};
use super::conveyor::{Conveyor, POLL_INTERVAL_MS};
use super::queue::Producer;
use super::trapezoid::{calculate_trapezoid, max_allowable_speed, TickScale};
use crate::actuator::Milestone;
use crate::config::{validate_config, Millimeters, StepsPerMm, SystemConfig};
use crate::timing::Clock;
use crate::Result;

/// One requested move, already converted to actuator space.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveRequest {
    /// Absolute target of every actuator in millimeters.
    pub target: ActuatorCoordinates,
    /// Requested feed rate in mm/s.
    pub rate_mm_s: f32,
    /// Length of the move in millimeters.
    pub distance_mm: f32,
    /// Direction of the move over the primary axes. `None` for moves with no
    /// geometric direction, which skip cornering.
    pub unit_vec: Option<[f32; N_PRIMARY_AXIS]>,
    /// Acceleration in mm/s².
    pub acceleration: f32,
    /// Auxiliary output level (spindle or laser power), 0.0 to ~2.0.
    pub s_value: f32,
    /// Feed move (G1/G2/G3) as opposed to a rapid.
    pub is_g123: bool,
}

impl MoveRequest {
    /// Feed move without direction or auxiliary output.
    pub fn new(target: ActuatorCoordinates, rate_mm_s: f32, distance_mm: f32, acceleration: f32) -> Self {
        Self {
            target,
            rate_mm_s,
            distance_mm,
            unit_vec: None,
            acceleration,
            s_value: 0.0,
            is_g123: true,
        }
    }

    /// Set the direction used for cornering.
    pub fn with_unit_vec(mut self, unit_vec: [f32; N_PRIMARY_AXIS]) -> Self {
        self.unit_vec = Some(unit_vec);
        self
    }

    /// Set the auxiliary output level.
    pub fn with_s_value(mut self, s_value: f32) -> Self {
        self.s_value = s_value;
        self
    }

    /// Mark as a rapid (G0) move.
    pub fn rapid(mut self) -> Self {
        self.is_g123 = false;
        self
    }
}

/// Producer side of the motion pipeline.
pub struct Planner<'a, C, D, const N: usize> {
    queue: Producer<'a, N>,
    conveyor: &'a Conveyor<'a, C, N>,
    delay: D,

    milestones: Vec<Milestone, MAX_ACTUATORS>,

    xy_junction_deviation: f32,
    z_junction_deviation: Option<f32>,
    minimum_planner_speed: f32,

    previous_unit_vec: [f32; N_PRIMARY_AXIS],
}

impl<'a, C, D, const N: usize> Planner<'a, C, D, N>
where
    C: Clock,
    D: DelayNs,
{
    /// Create a planner with every actuator at the origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(
        queue: Producer<'a, N>,
        conveyor: &'a Conveyor<'a, C, N>,
        config: &SystemConfig,
        delay: D,
    ) -> Result<Self> {
        validate_config(config)?;

        let milestones = config
            .actuators
            .iter()
            .map(|actuator| Milestone::new(actuator.steps_per_mm))
            .collect();

        Ok(Self {
            queue,
            conveyor,
            delay,
            milestones,
            xy_junction_deviation: config.planner.junction_deviation.value(),
            z_junction_deviation: config.planner.z_junction_deviation.map(Millimeters::value),
            minimum_planner_speed: config.planner.minimum_planner_speed.value(),
            previous_unit_vec: [0.0; N_PRIMARY_AXIS],
        })
    }

    /// Plan a move and commit it to the queue.
    ///
    /// Blocks while the queue is full. Returns `false` only if the machine
    /// halted while waiting, in which case the move is dropped. Moves too
    /// short to produce a single step are absorbed and return `true`; their
    /// distance is carried into the next move.
    pub fn append_block(&mut self, request: &MoveRequest) -> bool {
        let block = self.queue.head();
        block.clear();

        let mut has_steps = false;
        for (i, milestone) in self.milestones.iter_mut().enumerate() {
            let target = Millimeters(request.target[i]);
            let steps = milestone.steps_to_target(target);
            if steps != 0 {
                milestone.update_last_milestone(target, steps);
                has_steps = true;
            }
            block.direction_bits[i] = steps < 0;
            block.steps[i] = steps.unsigned_abs();
        }

        if !has_steps {
            block.clear();
            return true;
        }

        block.set_s_value(request.s_value);
        block.is_g123 = request.is_g123;

        let mut junction_deviation = self.xy_junction_deviation;
        block.primary_axis = true;
        if block.steps[ALPHA] == 0 && block.steps[BETA] == 0 {
            if block.steps[GAMMA] != 0 {
                if let Some(z) = self.z_junction_deviation {
                    junction_deviation = z;
                }
            } else {
                block.primary_axis = false;
            }
        }

        block.acceleration = request.acceleration;
        block.steps_event_count = block.steps.iter().copied().max().unwrap_or(0);
        block.millimeters = request.distance_mm;

        if request.distance_mm > 0.0 {
            block.nominal_speed = request.rate_mm_s;
            block.nominal_rate =
                block.steps_event_count as f32 * request.rate_mm_s / request.distance_mm;
        } else {
            block.nominal_speed = 0.0;
            block.nominal_rate = 0.0;
        }
        let nominal_speed = block.nominal_speed;

        let vmax_junction = match request.unit_vec {
            Some(unit_vec) if !self.queue.is_empty() => self.junction_speed(
                &unit_vec,
                nominal_speed,
                request.acceleration,
                junction_deviation,
            ),
            _ => self.minimum_planner_speed,
        };

        let v_allowable = max_allowable_speed(
            request.acceleration,
            self.minimum_planner_speed,
            request.distance_mm,
        );

        let block = self.queue.head();
        block.max_entry_speed = vmax_junction;
        block.entry_speed = vmax_junction.min(v_allowable);
        block.nominal_length = nominal_speed <= v_allowable;
        block.recalculate = true;

        self.previous_unit_vec = request.unit_vec.unwrap_or([0.0; N_PRIMARY_AXIS]);

        self.recalculate();

        self.queue.head().mark_ready();

        while !self.queue.commit_head() {
            self.delay.delay_ms(POLL_INTERVAL_MS);

            if self.conveyor.is_halted() {
                self.queue.head().clear();
                return false;
            }

            self.conveyor.check_queue(false);
        }

        true
    }

    /// Highest speed at which the corner between the last queued block and a
    /// move in direction `unit_vec` can be taken.
    fn junction_speed(
        &mut self,
        unit_vec: &[f32; N_PRIMARY_AXIS],
        nominal_speed: f32,
        acceleration: f32,
        junction_deviation: f32,
    ) -> f32 {
        self.queue.start_iteration();
        let idx = self.queue.step_toward_tail();
        let previous = self.queue.block(idx);
        let previous_nominal_speed = if previous.primary_axis {
            previous.nominal_speed
        } else {
            0.0
        };

        if junction_deviation <= 0.0 || previous_nominal_speed <= 0.0 {
            return self.minimum_planner_speed;
        }

        // previous_unit_vec points along the previous move, so this is the
        // cosine of the angle between the reversed previous move and this one
        let cos_theta = self
            .previous_unit_vec
            .iter()
            .zip(unit_vec)
            .fold(0.0f32, |acc, (p, u)| acc - p * u);

        // full reversal
        if cos_theta > 0.9999 {
            return self.minimum_planner_speed;
        }

        let mut vmax_junction = previous_nominal_speed.min(nominal_speed);
        // corner limit, skipped when the moves are collinear
        if cos_theta >= -0.9999 {
            let sin_theta_d2 = sqrtf(0.5 * (1.0 - cos_theta));
            vmax_junction = vmax_junction.min(sqrtf(
                acceleration * junction_deviation * sin_theta_d2 / (1.0 - sin_theta_d2),
            ));
        }
        vmax_junction
    }

    /// Replan the queue after a new block was placed at the head.
    fn recalculate(&mut self) {
        let mut entry_speed = self.minimum_planner_speed;

        self.queue.start_iteration();
        let mut current = self.queue.head_index();

        if !self.queue.is_empty() {
            while !self.queue.at_tail() && self.queue.block(current).recalculate {
                entry_speed = self.reverse_pass(current, entry_speed);
                current = self.queue.step_toward_tail();
            }

            // current is the tail or the first block that needs no reverse
            // pass; walk forward fixing entry speeds and trapezoids
            let mut exit_speed = self.max_exit_speed(current);

            while !self.queue.at_head() {
                let previous = current;
                current = self.queue.step_toward_head();

                exit_speed = self.forward_pass(current, exit_speed);

                let previous_entry = self.queue.block(previous).entry_speed;
                let current_entry = self.queue.block(current).entry_speed;
                self.plan_trapezoid(previous, previous_entry, current_entry);
            }
        }

        let entry = self.queue.block(current).entry_speed;
        self.plan_trapezoid(current, entry, self.minimum_planner_speed);
    }

    /// Raise the entry speed of a block as far as its exit speed allows.
    /// Returns the new entry speed.
    fn reverse_pass(&mut self, idx: usize, exit_speed: f32) -> f32 {
        let entry_speed = self.queue.with_block_mut(idx, |block| {
            if block.entry_speed != block.max_entry_speed {
                if !block.nominal_length && block.max_entry_speed > exit_speed {
                    let max_entry_speed =
                        max_allowable_speed(block.acceleration, exit_speed, block.millimeters);
                    block.entry_speed = max_entry_speed.min(block.max_entry_speed);
                } else {
                    block.entry_speed = block.max_entry_speed;
                }
            }
            block.entry_speed
        });

        entry_speed.unwrap_or_else(|| self.queue.block(idx).entry_speed)
    }

    /// Limit the entry speed of a block by what the previous block can reach.
    /// Returns the highest exit speed of the block.
    fn forward_pass(&mut self, idx: usize, prev_max_exit_speed: f32) -> f32 {
        self.queue.with_block_mut(idx, |block| {
            let prev_exit = prev_max_exit_speed
                .min(block.nominal_speed)
                .min(block.max_entry_speed);

            if prev_exit <= block.entry_speed {
                // acceleration limited, nothing later can change that
                block.entry_speed = prev_exit;
                block.recalculate = false;
            }
        });

        self.max_exit_speed(idx)
    }

    fn max_exit_speed(&self, idx: usize) -> f32 {
        let block = self.queue.block(idx);

        // being executed: its exit speed is fixed
        if self.queue.is_ticking(idx) {
            return block.exit_speed;
        }

        if block.nominal_length {
            return block.nominal_speed;
        }

        max_allowable_speed(block.acceleration, block.entry_speed, block.millimeters)
            .min(block.nominal_speed)
    }

    fn plan_trapezoid(&mut self, idx: usize, entry_speed: f32, exit_speed: f32) {
        let scale = TickScale::new(self.conveyor.step_frequency());
        // refused while the step ticker executes the block
        let _ = self
            .queue
            .with_block_mut(idx, |block| calculate_trapezoid(block, entry_speed, exit_speed, scale));
    }

    /// The most recently committed block.
    pub fn last_block(&mut self) -> Option<&Block> {
        if self.queue.is_empty() {
            return None;
        }
        self.queue.start_iteration();
        let idx = self.queue.step_toward_tail();
        Some(self.queue.block(idx))
    }

    /// Write every queued block, newest first.
    ///
    /// # Errors
    ///
    /// Propagates errors from the writer.
    pub fn dump_queue<W: fmt::Write>(&mut self, out: &mut W) -> fmt::Result {
        if self.queue.is_empty() {
            return Ok(());
        }

        self.queue.start_iteration();
        let mut n = 0;
        loop {
            let idx = self.queue.step_toward_tail();
            n += 1;
            writeln!(out, "block {:03} > {}", n, self.queue.block(idx))?;
            if self.queue.at_tail() {
                break;
            }
        }
        debug!("dumped {} blocks", n);
        Ok(())
    }

    /// Last planned position of an actuator.
    pub fn milestone(&self, actuator: usize) -> Option<&Milestone> {
        self.milestones.get(actuator)
    }

    /// Overwrite the planned position of every actuator, e.g. after homing or
    /// a halt. Extra coordinates are ignored.
    pub fn set_position(&mut self, position: &ActuatorCoordinates) {
        for (milestone, &mm) in self.milestones.iter_mut().zip(position.iter()) {
            milestone.set_last_milestone(Millimeters(mm));
        }
        self.previous_unit_vec = [0.0; N_PRIMARY_AXIS];
    }

    /// Change the resolution of an actuator, keeping its position in mm.
    ///
    /// Returns `false` if there is no such actuator.
    pub fn change_steps_per_mm(&mut self, actuator: usize, steps_per_mm: StepsPerMm) -> bool {
        match self.milestones.get_mut(actuator) {
            Some(milestone) => {
                milestone.change_steps_per_mm(steps_per_mm);
                true
            }
            None => {
                warn!("no actuator {} to change resolution of", actuator);
                false
            }
        }
    }

    /// Number of actuators planned for.
    #[inline]
    pub fn actuator_count(&self) -> usize {
        self.milestones.len()
    }

    /// Speed every block can stop at.
    #[inline]
    pub fn minimum_planner_speed(&self) -> f32 {
        self.minimum_planner_speed
    }

    /// Shared conveyor.
    #[inline]
    pub fn conveyor(&self) -> &'a Conveyor<'a, C, N> {
        self.conveyor
    }
}
