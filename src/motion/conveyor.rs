//! Flow control between the planner and the step ticker.
//!
//! The conveyor decides when committed blocks may be handed to the real-time
//! side. An idle machine holds the first moves back for
//! `queue_delay_time_ms` so a few blocks accumulate before motion starts.
//! It also carries the halt and flush flags. Every field is atomic, so one
//! conveyor is shared by reference between the producer context, the step
//! tick and whatever raises a halt.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;

use super::queue::{Consumer, QueueStatus};
use crate::config::{ConveyorConfig, Hertz, StepTickerConfig};
use crate::timing::Clock;

/// Polling interval of the blocking waits.
pub const POLL_INTERVAL_MS: u32 = 10;

/// Queue gate shared by the planner and the step ticker.
pub struct Conveyor<'q, C, const N: usize> {
    status: QueueStatus<'q, N>,
    clock: C,
    queue_delay_time_ms: u32,

    running: AtomicBool,
    allow_fetch: AtomicBool,
    flush: AtomicBool,
    halted: AtomicBool,
    last_check_ms: AtomicU32,
    /// f32 bits of the nominal speed of the block being executed.
    current_feedrate: AtomicU32,
    /// Bit `n` set while actuator `n` is moving. Written by the step ticker.
    moving_mask: AtomicU32,
    /// Step tick rate in hertz. Written by the step ticker, read by the
    /// planner when it converts speeds to ticks.
    step_frequency: AtomicU32,
}

impl<'q, C: Clock, const N: usize> Conveyor<'q, C, N> {
    /// Create a stopped conveyor over a queue.
    pub fn new(status: QueueStatus<'q, N>, clock: C, config: &ConveyorConfig) -> Self {
        let now = clock.now_ms();
        Self {
            status,
            clock,
            queue_delay_time_ms: config.queue_delay_time_ms,
            running: AtomicBool::new(false),
            allow_fetch: AtomicBool::new(false),
            flush: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            last_check_ms: AtomicU32::new(now),
            current_feedrate: AtomicU32::new(0),
            moving_mask: AtomicU32::new(0),
            step_frequency: AtomicU32::new(StepTickerConfig::default().frequency.value()),
        }
    }

    /// Enable the periodic queue check. Called once everything is configured.
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
        debug!("conveyor started");
    }

    /// `true` after [`start`](Self::start).
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Decide whether the step ticker may take blocks.
    ///
    /// Called from the producer context whenever it is idle or waiting.
    /// Fetching is allowed when forced, when the queue is full, or when the
    /// queue has held blocks for `queue_delay_time_ms`, unless a flush is
    /// pending.
    pub fn check_queue(&self, force: bool) {
        if !force && !self.is_running() {
            return;
        }

        let now = self.clock.now_ms();
        if self.status.is_empty() {
            self.allow_fetch.store(false, Ordering::Release);
            self.last_check_ms.store(now, Ordering::Relaxed);
            return;
        }

        let waited = now.wrapping_sub(self.last_check_ms.load(Ordering::Relaxed));
        if force || self.status.is_full() || waited >= self.queue_delay_time_ms {
            self.last_check_ms.store(now, Ordering::Relaxed);
            if !self.flush.load(Ordering::SeqCst) {
                self.allow_fetch.store(true, Ordering::Release);
            }
        }
    }

    /// Same as `check_queue(true)`.
    #[inline]
    pub fn force_queue(&self) {
        self.check_queue(true);
    }

    /// Hand the tail block to the step ticker.
    ///
    /// Real-time safe. Returns `None` when flushing (after draining the
    /// queue), halted, empty, not yet allowed to fetch, or when the planner is
    /// rewriting the tail at this very moment. In the last case the caller
    /// simply asks again next tick.
    pub fn get_next_block(&self, consumer: &mut Consumer<'_, N>) -> Option<usize> {
        if self.flush.load(Ordering::SeqCst) {
            while !consumer.is_empty() {
                consumer.release_tail();
            }
            self.flush.store(false, Ordering::SeqCst);
            return None;
        }

        self.set_current_feedrate(0.0);

        if self.is_halted() || consumer.is_empty() || !self.allow_fetch.load(Ordering::Acquire) {
            return None;
        }

        let idx = consumer.try_acquire_tail()?;
        self.set_current_feedrate(consumer.block(idx).map_or(0.0, |b| b.nominal_speed));
        Some(idx)
    }

    /// Release the block the step ticker just finished. Real-time safe.
    #[inline]
    pub fn block_finished(&self, consumer: &mut Consumer<'_, N>) {
        consumer.release_tail();
    }

    /// Queue empty and no actuator moving.
    pub fn is_idle(&self) -> bool {
        self.status.is_empty() && self.moving_mask.load(Ordering::Acquire) == 0
    }

    /// Wait until the queue has drained, forcing blocks out to the step
    /// ticker, and optionally until every actuator has stopped.
    ///
    /// Returns `false` if the wait was cut short by a halt.
    pub fn wait_for_idle<D: DelayNs>(&self, wait_for_motors: bool, delay: &mut D) -> bool {
        while !self.status.is_empty() {
            if self.is_halted() {
                return false;
            }
            self.check_queue(true);
            delay.delay_ms(POLL_INTERVAL_MS);
        }

        if wait_for_motors {
            while !self.is_idle() {
                if self.is_halted() {
                    return false;
                }
                delay.delay_ms(POLL_INTERVAL_MS);
            }
        }

        true
    }

    /// Wait until the queue has room for another block.
    ///
    /// Returns `false` if the wait was cut short by a halt.
    pub fn wait_for_room<D: DelayNs>(&self, delay: &mut D) -> bool {
        while self.status.is_full() {
            if self.is_halted() {
                return false;
            }
            delay.delay_ms(POLL_INTERVAL_MS);
        }
        true
    }

    /// Discard every block that has not started yet and wait for the block
    /// in progress to finish.
    ///
    /// The block currently being executed is not decelerated.
    pub fn flush_queue<D: DelayNs>(&self, delay: &mut D) {
        self.allow_fetch.store(false, Ordering::Release);
        self.flush.store(true, Ordering::SeqCst);
        info!("flushing {} queued blocks", self.status.len());

        if self.wait_for_idle(false, delay) {
            self.flush.store(false, Ordering::SeqCst);
        }
    }

    /// Enter or leave the halt state. Safe from any context.
    ///
    /// Entering a halt also schedules a flush, which the step ticker performs
    /// on its next fetch.
    pub fn on_halt(&self, halted: bool) {
        self.halted.store(halted, Ordering::SeqCst);
        if halted {
            self.flush.store(true, Ordering::SeqCst);
        }
    }

    /// `true` while halted.
    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// `true` while a flush is pending.
    #[inline]
    pub fn is_flushing(&self) -> bool {
        self.flush.load(Ordering::SeqCst)
    }

    /// `true` once the step ticker may take blocks.
    #[inline]
    pub fn fetch_allowed(&self) -> bool {
        self.allow_fetch.load(Ordering::Acquire)
    }

    /// Nominal speed of the block being executed in mm/s, 0 when none.
    #[inline]
    pub fn current_feedrate(&self) -> f32 {
        f32::from_bits(self.current_feedrate.load(Ordering::Relaxed))
    }

    /// Read-only queue state.
    #[inline]
    pub fn queue_status(&self) -> QueueStatus<'q, N> {
        self.status
    }

    #[inline]
    fn set_current_feedrate(&self, feedrate: f32) {
        self.current_feedrate.store(feedrate.to_bits(), Ordering::Relaxed);
    }

    /// Publish which actuators are moving.
    #[inline]
    pub(crate) fn set_moving_mask(&self, mask: u32) {
        self.moving_mask.store(mask, Ordering::Release);
    }

    /// Step tick rate blocks are planned for. 100 kHz until a step ticker
    /// is attached.
    #[inline]
    pub fn step_frequency(&self) -> Hertz {
        Hertz(self.step_frequency.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_step_frequency(&self, frequency: Hertz) {
        self.step_frequency.store(frequency.value(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MoveQueue;
    use crate::timing::ManualClock;
    use embedded_hal_mock::eh1::delay::NoopDelay;

    fn config(delay_ms: u32) -> ConveyorConfig {
        ConveyorConfig {
            queue_delay_time_ms: delay_ms,
        }
    }

    #[test]
    fn test_first_block_is_held_back() {
        let mut queue: MoveQueue<8> = MoveQueue::new();
        let (mut producer, mut consumer, status) = queue.split();
        let clock = ManualClock::new();
        let conveyor = Conveyor::new(status, &clock, &config(100));
        conveyor.start();

        producer.head().nominal_speed = 50.0;
        assert!(producer.commit_head());

        conveyor.check_queue(false);
        assert!(conveyor.get_next_block(&mut consumer).is_none());

        clock.advance(99);
        conveyor.check_queue(false);
        assert!(conveyor.get_next_block(&mut consumer).is_none());

        clock.advance(1);
        conveyor.check_queue(false);
        let idx = conveyor.get_next_block(&mut consumer).unwrap();
        assert_eq!(conveyor.current_feedrate(), 50.0);

        conveyor.block_finished(&mut consumer);
        assert!(producer.with_block_mut(idx, |_| ()).is_some());
        assert!(conveyor.is_idle());
    }

    #[test]
    fn test_not_running_ignores_unforced_checks() {
        let mut queue: MoveQueue<8> = MoveQueue::new();
        let (mut producer, mut consumer, status) = queue.split();
        let clock = ManualClock::new();
        let conveyor = Conveyor::new(status, &clock, &config(0));

        assert!(producer.commit_head());
        conveyor.check_queue(false);
        assert!(!conveyor.fetch_allowed());

        conveyor.force_queue();
        assert!(conveyor.get_next_block(&mut consumer).is_some());
    }

    #[test]
    fn test_full_queue_releases_immediately() {
        let mut queue: MoveQueue<3> = MoveQueue::new();
        let (mut producer, _, status) = queue.split();
        let clock = ManualClock::new();
        let conveyor = Conveyor::new(status, &clock, &config(1000));
        conveyor.start();

        assert!(producer.commit_head());
        conveyor.check_queue(false);
        assert!(!conveyor.fetch_allowed());

        assert!(producer.commit_head());
        conveyor.check_queue(false);
        assert!(conveyor.fetch_allowed());
    }

    #[test]
    fn test_halt_flushes_on_next_fetch() {
        let mut queue: MoveQueue<8> = MoveQueue::new();
        let (mut producer, mut consumer, status) = queue.split();
        let clock = ManualClock::new();
        let conveyor = Conveyor::new(status, &clock, &config(0));

        for _ in 0..3 {
            assert!(producer.commit_head());
        }
        conveyor.force_queue();

        conveyor.on_halt(true);
        assert!(conveyor.is_flushing());
        assert!(!conveyor.is_idle());

        assert!(conveyor.get_next_block(&mut consumer).is_none());
        assert!(!conveyor.is_flushing());
        assert!(conveyor.is_idle());

        // stays halted: nothing is handed out
        assert!(producer.commit_head());
        conveyor.force_queue();
        assert!(conveyor.get_next_block(&mut consumer).is_none());

        conveyor.on_halt(false);
        assert!(conveyor.get_next_block(&mut consumer).is_some());
    }

    #[test]
    fn test_moving_actuators_are_not_idle() {
        let mut queue: MoveQueue<4> = MoveQueue::new();
        let (_, _, status) = queue.split();
        let clock = ManualClock::new();
        let conveyor = Conveyor::new(status, &clock, &config(0));

        conveyor.set_moving_mask(0b100);
        assert!(!conveyor.is_idle());
        conveyor.set_moving_mask(0);
        assert!(conveyor.is_idle());
    }

    #[test]
    fn test_waits_return_false_when_halted() {
        let mut queue: MoveQueue<3> = MoveQueue::new();
        let (mut producer, _, status) = queue.split();
        let clock = ManualClock::new();
        let conveyor = Conveyor::new(status, &clock, &config(0));
        let mut delay = NoopDelay::new();

        assert!(conveyor.wait_for_room(&mut delay));
        assert!(conveyor.wait_for_idle(true, &mut delay));

        assert!(producer.commit_head());
        assert!(producer.commit_head());
        conveyor.on_halt(true);

        assert!(!conveyor.wait_for_room(&mut delay));
        assert!(!conveyor.wait_for_idle(true, &mut delay));

        // a halted flush leaves the flag for the step ticker to act on
        conveyor.flush_queue(&mut delay);
        assert!(conveyor.is_flushing());
    }
}
