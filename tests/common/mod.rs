//! Simulated machine shared by the integration tests.
//!
//! Wires queue, conveyor, planner and step ticker together with virtual
//! actuators, a hand-driven clock and a hand-driven step timer.

#![allow(dead_code)]

use embedded_hal_mock::eh1::delay::NoopDelay;
use motion_core::config::{ActuatorConfig, SystemConfig};
use motion_core::motion::ActuatorCoordinates;
use motion_core::{
    Actuator, Conveyor, ManualClock, ManualTickTimer, MoveQueue, MoveRequest, Planner, StepTicker,
    StepsPerMm, VirtualActuator, MAX_ACTUATORS,
};

pub type TestConveyor<'a, const N: usize> = Conveyor<'a, &'a ManualClock, N>;
pub type TestPlanner<'a, const N: usize> = Planner<'a, &'a ManualClock, NoopDelay, N>;
pub type TestTicker<'a, const N: usize> =
    StepTicker<'a, VirtualActuator, ManualTickTimer, &'a ManualClock, N>;

/// Config with `n` actuators named axis0.. at `steps_per_mm`.
pub fn config(n: usize, steps_per_mm: f32) -> SystemConfig {
    let mut config = SystemConfig::default();
    for i in 0..n {
        let mut name = heapless::String::new();
        core::fmt::Write::write_fmt(&mut name, format_args!("axis{}", i)).unwrap();
        config
            .actuators
            .push(ActuatorConfig {
                name,
                steps_per_mm: StepsPerMm::new(steps_per_mm).unwrap(),
                invert_direction: false,
            })
            .unwrap();
    }
    config
}

pub fn target(coords: &[f32]) -> ActuatorCoordinates {
    let mut t = [0.0; MAX_ACTUATORS];
    t[..coords.len()].copy_from_slice(coords);
    t
}

pub struct Machine<'a, const N: usize> {
    pub clock: &'a ManualClock,
    pub conveyor: &'a TestConveyor<'a, N>,
    pub planner: TestPlanner<'a, N>,
    pub ticker: TestTicker<'a, N>,
    pub ticks: u64,
}

impl<'a, const N: usize> Machine<'a, N> {
    /// One step tick followed by the unstep one-shot, if armed.
    pub fn tick(&mut self) {
        self.ticker.tick();
        self.ticks += 1;
        if self.ticker.timer_mut().take_unstep() {
            self.ticker.unstep_tick();
        }
    }

    /// Release the queue and tick until idle. Returns the number of ticks.
    ///
    /// Panics after `limit` ticks.
    pub fn run_until_idle(&mut self, limit: u64) -> u64 {
        self.conveyor.force_queue();
        let start = self.ticks;
        while !self.conveyor.is_idle() || self.ticker.is_running() {
            assert!(self.ticks - start < limit, "not idle after {} ticks", limit);
            self.tick();
        }
        self.ticks - start
    }

    /// Plan a straight move from the current milestone to `to`.
    pub fn line_to(&mut self, to: &[f32], rate_mm_s: f32, acceleration: f32) -> bool {
        let from: Vec<f32> = (0..to.len())
            .map(|i| self.planner.milestone(i).map(|m| m.mm().value()).unwrap_or(0.0))
            .collect();
        let delta: Vec<f32> = to.iter().zip(&from).map(|(t, f)| t - f).collect();
        let distance = delta.iter().map(|d| d * d).sum::<f32>().sqrt();

        let mut request = MoveRequest::new(target(to), rate_mm_s, distance, acceleration);
        if distance > 0.0 {
            let mut unit = [0.0; 3];
            for (u, d) in unit.iter_mut().zip(&delta) {
                *u = d / distance;
            }
            request = request.with_unit_vec(unit);
        }
        self.planner.append_block(&request)
    }

    pub fn position_steps(&self, axis: usize) -> i32 {
        self.ticker.actuators()[axis].current_position_steps()
    }

    pub fn pulses(&self, axis: usize) -> u32 {
        self.ticker.actuators()[axis].pulses()
    }
}

/// Build a machine over a queue of `N` slots and hand it to `f`.
pub fn with_machine<const N: usize, R>(
    config: &SystemConfig,
    f: impl FnOnce(&mut Machine<'_, N>) -> R,
) -> R {
    let clock = ManualClock::new();
    let mut queue: MoveQueue<N> = MoveQueue::new();
    let (producer, consumer, status) = queue.split();
    let conveyor = Conveyor::new(status, &clock, &config.conveyor);
    let planner = Planner::new(producer, &conveyor, config, NoopDelay::new()).unwrap();

    let mut ticker = StepTicker::new(consumer, &conveyor, ManualTickTimer::new(), &config.step_ticker);
    for _ in config.actuators.iter() {
        ticker.register_actuator(VirtualActuator::new()).unwrap();
    }

    conveyor.start();
    ticker.start().unwrap();
    assert!(ticker.timer().is_running());

    let mut machine = Machine {
        clock: &clock,
        conveyor: &conveyor,
        planner,
        ticker,
        ticks: 0,
    };
    f(&mut machine)
}
