//! Time sources and timers.
//!
//! The core never talks to hardware timers directly. [`Clock`] supplies the
//! millisecond time the conveyor uses for its start-up delay, and
//! [`TickTimer`] is the periodic step timer plus the one-shot unstep timer
//! that drive [`StepTicker`](crate::motion::StepTicker).

use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::{Hertz, Microseconds};
use crate::error::TickerError;

/// Monotonic millisecond clock.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch. Wraps.
    fn now_ms(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Clock based on `std::time::Instant`.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    epoch: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// Start counting from now.
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_ms(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }
}

/// Clock advanced by hand, for simulation and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU32,
}

impl ManualClock {
    /// Clock at zero.
    pub const fn new() -> Self {
        Self {
            now: AtomicU32::new(0),
        }
    }

    /// Move time forward.
    pub fn advance(&self, ms: u32) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.load(Ordering::Relaxed)
    }
}

/// Periodic step timer with a one-shot unstep match.
///
/// The owner of the timer interrupt calls
/// [`StepTicker::tick`](crate::motion::StepTicker::tick) on every period and
/// [`StepTicker::unstep_tick`](crate::motion::StepTicker::unstep_tick) when
/// the one-shot fires.
pub trait TickTimer {
    /// Start ticking.
    ///
    /// Returns the rate error in timer counts (0 when exact).
    ///
    /// # Errors
    ///
    /// Returns `TickerError::TimerSetup` if the rate cannot be produced.
    fn start(&mut self, frequency: Hertz, unstep_time: Microseconds) -> Result<u32, TickerError>;

    /// Stop ticking.
    fn stop(&mut self);

    /// Fire the unstep one-shot `unstep_time` after the current tick.
    fn arm_unstep(&mut self);
}

/// Timer driven by hand: ticks happen when the caller says so.
///
/// Records what the step ticker asked of it.
#[derive(Debug, Default, Clone)]
pub struct ManualTickTimer {
    running: bool,
    frequency: Hertz,
    unstep_time: Microseconds,
    armed: bool,
    arm_count: u32,
}

impl ManualTickTimer {
    /// Stopped timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Rate passed to the last `start`.
    pub fn frequency(&self) -> Hertz {
        self.frequency
    }

    /// Pulse width passed to the last `start`.
    pub fn unstep_time(&self) -> Microseconds {
        self.unstep_time
    }

    /// Take the pending one-shot, if armed.
    pub fn take_unstep(&mut self) -> bool {
        core::mem::take(&mut self.armed)
    }

    /// Number of times the one-shot was armed.
    pub fn arm_count(&self) -> u32 {
        self.arm_count
    }
}

impl TickTimer for ManualTickTimer {
    fn start(&mut self, frequency: Hertz, unstep_time: Microseconds) -> Result<u32, TickerError> {
        if frequency.value() == 0 {
            return Err(TickerError::TimerSetup);
        }
        self.running = true;
        self.frequency = frequency;
        self.unstep_time = unstep_time;
        Ok(0)
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn arm_unstep(&mut self) {
        self.armed = true;
        self.arm_count = self.arm_count.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_ms(), 0);
        clock.advance(150);
        assert_eq!((&clock).now_ms(), 150);
    }

    #[test]
    fn test_manual_timer() {
        let mut timer = ManualTickTimer::new();
        assert_eq!(timer.start(Hertz(0), Microseconds(1)), Err(TickerError::TimerSetup));
        assert_eq!(timer.start(Hertz(100_000), Microseconds(1)), Ok(0));
        assert!(timer.is_running());

        timer.arm_unstep();
        assert!(timer.take_unstep());
        assert!(!timer.take_unstep());
        assert_eq!(timer.arm_count(), 1);

        timer.stop();
        assert!(!timer.is_running());
    }
}
