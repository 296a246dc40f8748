//! Real-time step generation.
//!
//! [`StepTicker::tick`] runs once per period of the step timer. Every active
//! actuator advances its own fixed point ramp: the rate changes by a constant
//! amount per tick, the rate is added to a counter, and each time the counter
//! passes one whole step a pulse is issued. Pulses are ended by
//! [`StepTicker::unstep_tick`] from a short one-shot timer.
//!
//! Nothing here allocates, blocks or touches floating point.

use heapless::Vec;

use super::block::{Block, RampInfo, MAX_ACTUATORS};
use super::conveyor::Conveyor;
use super::fixed::FixedPoint;
use super::queue::Consumer;
use crate::actuator::Actuator;
use crate::config::{Hertz, Microseconds, StepTickerConfig};
use crate::error::TickerError;
use crate::timing::{Clock, TickTimer};

/// Consumer side of the motion pipeline.
pub struct StepTicker<'a, A, T, C, const N: usize> {
    consumer: Consumer<'a, N>,
    conveyor: &'a Conveyor<'a, C, N>,
    actuators: Vec<A, MAX_ACTUATORS>,
    timer: T,

    unstep_time: Microseconds,
    started: bool,

    /// Executing a block.
    running: bool,
    /// Queue slot of the block being executed, claimed until released.
    current_block: Option<usize>,
    /// Working copy of the block ramps.
    ramp: [RampInfo; MAX_ACTUATORS],
    accelerate_until: u32,
    decelerate_after: u32,
    total_move_ticks: u32,
    current_tick: u32,

    /// Bit `n` set while actuator `n` has a pulse to end.
    unstep: u32,
    missed_unsteps: u32,
}

impl<'a, A, T, C, const N: usize> StepTicker<'a, A, T, C, N>
where
    A: Actuator,
    T: TickTimer,
    C: Clock,
{
    /// Create a stopped ticker with no actuators.
    pub fn new(
        consumer: Consumer<'a, N>,
        conveyor: &'a Conveyor<'a, C, N>,
        timer: T,
        config: &StepTickerConfig,
    ) -> Self {
        conveyor.set_step_frequency(config.frequency);
        Self {
            consumer,
            conveyor,
            actuators: Vec::new(),
            timer,
            unstep_time: config.unstep_time,
            started: false,
            running: false,
            current_block: None,
            ramp: [RampInfo::IDLE; MAX_ACTUATORS],
            accelerate_until: 0,
            decelerate_after: 0,
            total_move_ticks: 0,
            current_tick: 0,
            unstep: 0,
            missed_unsteps: 0,
        }
    }

    /// Add an actuator. Actuators are numbered in registration order, which
    /// must match the planner's actuator order.
    ///
    /// # Errors
    ///
    /// Returns `TickerError::TooManyActuators` when all slots are taken.
    pub fn register_actuator(&mut self, actuator: A) -> Result<usize, TickerError> {
        self.actuators
            .push(actuator)
            .map_err(|_| TickerError::TooManyActuators)?;
        Ok(self.actuators.len() - 1)
    }

    /// Start the step timer.
    ///
    /// # Errors
    ///
    /// Returns the timer's error if it cannot run at the configured rate.
    pub fn start(&mut self) -> Result<(), TickerError> {
        if !self.started {
            let rate_error = self.timer.start(self.frequency(), self.unstep_time).map_err(|e| {
                error!("step timer setup failed");
                e
            })?;
            if rate_error != 0 {
                warn!("step ticker is not accurate: {}", rate_error);
            }
            self.started = true;
            info!(
                "step ticker started at {} Hz, {} us pulses",
                self.frequency().value(),
                self.unstep_time.value()
            );
        }

        self.current_tick = 0;
        Ok(())
    }

    /// Stop the step timer. Timing may be changed again afterwards.
    pub fn stop(&mut self) {
        if self.started {
            self.timer.stop();
            self.started = false;
        }
    }

    /// Set the tick rate. Only allowed while stopped. Blocks planned from
    /// now on use the new rate.
    ///
    /// # Errors
    ///
    /// Returns `TickerError::AlreadyStarted` while running, or
    /// `TickerError::UnstepTooLong` if the current pulse would not fit in the
    /// new period.
    pub fn set_frequency(&mut self, frequency: Hertz) -> Result<(), TickerError> {
        if self.started {
            error!("cannot set step ticker frequency after it has been started");
            return Err(TickerError::AlreadyStarted);
        }
        Self::check_unstep(frequency, self.unstep_time)?;
        self.conveyor.set_step_frequency(frequency);
        Ok(())
    }

    /// Set the step pulse width. Only allowed while stopped.
    ///
    /// # Errors
    ///
    /// Returns `TickerError::AlreadyStarted` while running, or
    /// `TickerError::UnstepTooLong` unless the pulse ends at least 1us before
    /// the next tick.
    pub fn set_unstep_time(&mut self, unstep_time: Microseconds) -> Result<(), TickerError> {
        if self.started {
            error!("cannot set step ticker unstep delay after it has been started");
            return Err(TickerError::AlreadyStarted);
        }
        Self::check_unstep(self.frequency(), unstep_time)?;
        self.unstep_time = unstep_time;
        Ok(())
    }

    fn check_unstep(frequency: Hertz, unstep_time: Microseconds) -> Result<(), TickerError> {
        let period_us = frequency.period_us();
        if period_us == 0 || unstep_time.value() > period_us - 1 {
            return Err(TickerError::UnstepTooLong {
                unstep_us: unstep_time.value(),
                period_us,
            });
        }
        Ok(())
    }

    /// One step tick. Call from the periodic timer interrupt.
    pub fn tick(&mut self) {
        if self.unstep != 0 {
            // the one-shot never fired: end the pulses now
            self.unstep_tick();
            self.missed_unsteps = self.missed_unsteps.wrapping_add(1);
        }

        if !self.running && !self.fetch_next_block() {
            return;
        }

        if self.conveyor.is_halted() {
            self.abandon_block();
            return;
        }

        let tick = self.current_tick;
        let mut still_moving = false;

        for (m, actuator) in self.actuators.iter_mut().enumerate() {
            let ramp = &mut self.ramp[m];
            if ramp.steps_to_move == 0 {
                continue;
            }

            ramp.steps_per_tick += ramp.acceleration_change;

            if tick == ramp.next_accel_event {
                if tick == self.accelerate_until {
                    // end of acceleration
                    ramp.acceleration_change = FixedPoint::ZERO;
                    if self.decelerate_after < self.total_move_ticks {
                        ramp.next_accel_event = self.decelerate_after;
                        if tick != self.decelerate_after {
                            ramp.steps_per_tick = ramp.plateau_rate;
                        }
                    }
                }

                if tick == self.decelerate_after {
                    ramp.acceleration_change = ramp.deceleration_change;
                }
            }

            // rounding at the end of a ramp: finish one step per tick
            if ramp.steps_per_tick.is_non_positive() {
                ramp.counter = FixedPoint::ONE;
                ramp.steps_per_tick = FixedPoint::ZERO;
            }

            ramp.counter += ramp.steps_per_tick;

            if ramp.counter >= FixedPoint::ONE {
                ramp.counter -= FixedPoint::ONE;
                ramp.step_count += 1;

                let keep_moving = actuator.step();
                self.unstep |= 1 << m;

                if !keep_moving || ramp.step_count == ramp.steps_to_move {
                    ramp.steps_to_move = 0;
                    actuator.stop_moving();
                }
            }

            if actuator.is_moving() {
                still_moving = true;
            }
        }

        self.current_tick += 1;

        if self.unstep != 0 {
            self.timer.arm_unstep();
        }

        self.publish_moving();

        if !still_moving {
            self.current_tick = 0;
            self.conveyor.block_finished(&mut self.consumer);
            self.current_block = None;
            self.running = false;

            // start the next block on this same tick
            self.fetch_next_block();
        }
    }

    /// End every pending step pulse. Call from the one-shot unstep timer.
    pub fn unstep_tick(&mut self) {
        for (m, actuator) in self.actuators.iter_mut().enumerate() {
            if self.unstep & (1 << m) != 0 {
                actuator.unstep();
            }
        }
        self.unstep = 0;
    }

    fn fetch_next_block(&mut self) -> bool {
        match self.conveyor.get_next_block(&mut self.consumer) {
            Some(idx) => {
                self.current_block = Some(idx);
                self.running = self.start_next_block(idx);
            }
            None => {
                self.current_block = None;
                self.running = false;
            }
        }
        self.running
    }

    fn start_next_block(&mut self, idx: usize) -> bool {
        let Some(block) = self.consumer.block(idx) else {
            self.current_block = None;
            return false;
        };
        self.ramp = block.ramp;
        self.accelerate_until = block.accelerate_until;
        self.decelerate_after = block.decelerate_after;
        self.total_move_ticks = block.total_move_ticks;

        let mut any_active = false;
        for (m, actuator) in self.actuators.iter_mut().enumerate() {
            if self.ramp[m].steps_to_move == 0 {
                continue;
            }
            any_active = true;
            actuator.set_direction(block.direction_bits[m]);
            actuator.start_moving();
        }

        self.current_tick = 0;

        if !any_active {
            // nothing for the registered actuators to do
            self.conveyor.block_finished(&mut self.consumer);
            self.current_block = None;
        }

        self.publish_moving();
        any_active
    }

    /// Drop the block in progress without decelerating.
    fn abandon_block(&mut self) {
        self.running = false;
        self.current_tick = 0;
        self.current_block = None;
        for (ramp, actuator) in self.ramp.iter_mut().zip(self.actuators.iter_mut()) {
            ramp.steps_to_move = 0;
            actuator.stop_moving();
        }
        self.publish_moving();
    }

    fn publish_moving(&self) {
        let mask = self
            .actuators
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_moving())
            .fold(0u32, |mask, (m, _)| mask | 1 << m);
        self.conveyor.set_moving_mask(mask);
    }

    /// `true` while a block is being executed.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Queue slot of the block being executed.
    #[inline]
    pub fn current_block_index(&self) -> Option<usize> {
        self.current_block
    }

    /// The block being executed, e.g. to follow its auxiliary output level.
    pub fn current_block(&self) -> Option<&Block> {
        self.current_block.and_then(|idx| self.consumer.block(idx))
    }

    /// Ticks since the current block started.
    #[inline]
    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }

    /// Pulses that had to be ended by the next tick instead of the one-shot.
    #[inline]
    pub fn missed_unsteps(&self) -> u32 {
        self.missed_unsteps
    }

    /// Current rate of an actuator in steps per second, 0 when idle.
    pub fn current_rate(&self, axis: usize) -> f32 {
        match self.ramp.get(axis) {
            Some(ramp) if self.running && ramp.steps_to_move != 0 => {
                ramp.steps_per_tick.to_f32() * self.frequency().value() as f32
            }
            _ => 0.0,
        }
    }

    /// Steps issued so far by an actuator in the current block.
    pub fn step_count(&self, axis: usize) -> u32 {
        self.ramp.get(axis).map(|r| r.step_count).unwrap_or(0)
    }

    /// Tick rate, shared with the planner through the conveyor.
    #[inline]
    pub fn frequency(&self) -> Hertz {
        self.conveyor.step_frequency()
    }

    /// Step pulse width.
    #[inline]
    pub fn unstep_time(&self) -> Microseconds {
        self.unstep_time
    }

    /// Registered actuators in motor order.
    #[inline]
    pub fn actuators(&self) -> &[A] {
        &self.actuators
    }

    /// Mutable access to a registered actuator.
    #[inline]
    pub fn actuator_mut(&mut self, index: usize) -> Option<&mut A> {
        self.actuators.get_mut(index)
    }

    /// The step timer.
    #[inline]
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// The step timer, mutably.
    #[inline]
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}
