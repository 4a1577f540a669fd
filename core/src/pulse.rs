//! Cosmetic pulse clock for the hero overlay.
//!
//! The caller owns the clock for as long as the view is shown and feeds
//! it elapsed time. There is no background timer; dropping the clock
//! is the teardown.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_PULSE_PERIOD: Duration = Duration::from_millis(2600);

pub const PULSE_OPACITY_HIGH: f64 = 0.12;
pub const PULSE_OPACITY_LOW: f64 = 0.06;

const NANOS_PER_SEC: u128 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseClock {
    pub period: Duration,
    pub phase:  bool,
    pub paused: bool,
    elapsed:    Duration,
}

impl PulseClock {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            phase: false,
            paused: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Feed elapsed wall time. Returns how many times the phase flipped,
    /// saturating at `u32::MAX`. A paused clock or a zero period never
    /// flips. Constant time regardless of `dt`.
    pub fn advance(&mut self, dt: Duration) -> u32 {
        if self.paused || self.period.is_zero() {
            return 0;
        }
        let total = self.elapsed.saturating_add(dt).as_nanos();
        let period = self.period.as_nanos();
        let periods = total / period;
        let rest = total % period;

        // rest < period, so its whole seconds fit in u64.
        self.elapsed = Duration::new((rest / NANOS_PER_SEC) as u64, (rest % NANOS_PER_SEC) as u32);
        if periods % 2 == 1 {
            self.phase = !self.phase;
        }
        u32::try_from(periods).unwrap_or(u32::MAX)
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }

    pub fn opacity(&self) -> f64 {
        if self.phase { PULSE_OPACITY_HIGH } else { PULSE_OPACITY_LOW }
    }
}

impl Default for PulseClock {
    fn default() -> Self {
        Self::new(DEFAULT_PULSE_PERIOD)
    }
}
