//! Fixed-rate pacing for the driver loop.
//!
//! Arena timers count ticks, so the clock only has to hand out tick numbers
//! at a steady rate. It never replays missed ticks: after a stall the next
//! deadline is measured from the moment the late tick fired.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Ticks per second. 0 turns the clock off.
    pub tick_rate_hz: u32,
    /// Fraction of the tick period the arena work may take before the tick
    /// is reported as slow.
    pub slow_tick_fraction: f64,
    /// Upper bound, in microseconds, of a random delay before the first
    /// tick.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20,
            slow_tick_fraction: 0.8,
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Self::default()
        }
    }

    pub fn validated(self) -> Self {
        let tick_rate_hz = if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                requested = self.tick_rate_hz,
                used = Self::MAX_TICK_RATE_HZ,
                "tick rate too high"
            );
            Self::MAX_TICK_RATE_HZ
        } else {
            self.tick_rate_hz
        };
        Self {
            tick_rate_hz,
            slow_tick_fraction: self.slow_tick_fraction.clamp(0.0, 1.0),
            ..self
        }
    }

    /// The tick period, `None` when the clock is off.
    pub fn tick_duration(&self) -> Option<Duration> {
        match self.tick_rate_hz {
            0 => None,
            hz => Some(Duration::from_secs(1) / hz),
        }
    }

    fn first_delay(&self, period: Duration) -> Duration {
        if self.initial_jitter_us == 0 {
            return period;
        }
        period + Duration::from_micros(rand::rng().random_range(0..self.initial_jitter_us))
    }
}

/// One fired tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Starts at 1.
    pub tick: u64,
    /// Fired more than a tenth of a period late.
    pub overrun: bool,
    /// Whole periods lost to the delay.
    pub ticks_skipped: u64,
}

/// How late a deadline was met, in whole periods.
fn lateness(late_by: Duration, period: Duration) -> (bool, u64) {
    if late_by <= period / 10 {
        return (false, 0);
    }
    (true, (late_by.as_nanos() / period.as_nanos()) as u64)
}

// ---------------------------------------------------------------------------
// TickClock
// ---------------------------------------------------------------------------

/// Paces the driver loop; see the module docs.
pub struct TickClock {
    config: TickConfig,
    period: Option<Duration>,
    deadline: Option<Instant>,
    ticks: u64,
    /// When the current tick's work began.
    working_since: Option<Instant>,
    held: bool,
    overruns: u64,
    slow_ticks: u64,
}

impl TickClock {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let period = config.tick_duration();
        let deadline = period.map(|p| Instant::now() + config.first_delay(p));
        debug!(rate_hz = config.tick_rate_hz, "tick clock ready");
        Self {
            config,
            period,
            deadline,
            ticks: 0,
            working_since: None,
            held: false,
            overruns: 0,
            slow_ticks: 0,
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Resolves when the next tick is due. Pends forever while paused or
    /// off, so it can sit in a `tokio::select!`.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (Some(deadline), Some(period), false) = (self.deadline, self.period, self.held) else {
            return std::future::pending().await;
        };
        time::sleep_until(deadline).await;

        let fired = Instant::now();
        self.ticks += 1;
        self.working_since = Some(fired);
        self.deadline = Some(fired + period);

        let (overrun, ticks_skipped) = lateness(fired.saturating_duration_since(deadline), period);
        if overrun {
            self.overruns += 1;
        }
        if ticks_skipped > 0 {
            warn!(tick = self.ticks, skipped = ticks_skipped, "arena ticks dropped after a stall");
        }
        trace!(tick = self.ticks, overrun, "tick");

        TickInfo {
            tick: self.ticks,
            overrun,
            ticks_skipped,
        }
    }

    /// Closes the current tick and reports it if the work ran long.
    pub fn record_tick_end(&mut self) {
        let (Some(since), Some(period)) = (self.working_since.take(), self.period) else {
            return;
        };
        let spent = since.elapsed();
        if spent.as_secs_f64() >= period.as_secs_f64() * self.config.slow_tick_fraction {
            self.slow_ticks += 1;
            warn!(
                tick = self.ticks,
                spent_ms = spent.as_secs_f64() * 1000.0,
                period_ms = period.as_secs_f64() * 1000.0,
                "slow arena tick"
            );
        }
    }

    pub fn pause(&mut self) {
        if !self.held {
            self.held = true;
            debug!(tick = self.ticks, "tick clock paused");
        }
    }

    /// The next tick is one full period after the call.
    pub fn resume(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        self.deadline = self.period.map(|p| Instant::now() + p);
        debug!(tick = self.ticks, "tick clock resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.held
    }

    pub fn is_disabled(&self) -> bool {
        self.period.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Ticks that fired late.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Ticks whose work took longer than the slow-tick fraction allows.
    pub fn slow_ticks(&self) -> u64 {
        self.slow_ticks
    }

    pub fn tick_duration(&self) -> Option<Duration> {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(50);

    #[test]
    fn test_lateness_within_tenth_is_on_time() {
        assert_eq!(lateness(Duration::from_millis(5), PERIOD), (false, 0));
    }

    #[test]
    fn test_lateness_counts_whole_periods() {
        assert_eq!(lateness(Duration::from_millis(20), PERIOD), (true, 0));
        assert_eq!(lateness(Duration::from_millis(120), PERIOD), (true, 2));
    }

    #[test]
    fn test_validated_clamps_slow_tick_fraction() {
        let config = TickConfig {
            slow_tick_fraction: 3.0,
            ..TickConfig::default()
        }
        .validated();
        assert_eq!(config.slow_tick_fraction, 1.0);
    }
}
