//! # Server Tick Loop
//!
//! Fixed-timestep pacing for the replication server.
//!
//! ## Design
//!
//! The tick loop must:
//! - Run `tick_rate` times per second regardless of processing time
//! - Drain inbound events before touching state
//! - Broadcast after state has been updated

use std::time::{Duration, Instant};

/// Fixed-timestep tick loop controller.
pub struct TickLoop {
    tick_duration: Duration,
    last_tick: Instant,
    accumulator: Duration,
    tick_count: u64,
    stats: TickStats,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    /// Minimum tick duration observed.
    pub min_tick_us: u64,
    /// Maximum tick duration observed.
    pub max_tick_us: u64,
    /// Average tick duration (rolling).
    pub avg_tick_us: u64,
    /// Number of late ticks (took longer than budget).
    pub late_ticks: u64,
    /// Total ticks measured.
    pub total_ticks: u64,
}

impl TickStats {
    fn fresh(tick_duration: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: duration_us(tick_duration),
            late_ticks: 0,
            total_ticks: 0,
        }
    }
}

fn duration_us(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl TickLoop {
    /// Creates a tick loop running `tick_rate` times per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));

        Self {
            tick_duration,
            last_tick: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: TickStats::fresh(tick_duration),
        }
    }

    /// Returns true if a tick is due. Call in a loop until it returns false.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_tick);
        self.last_tick = now;

        self.accumulator >= self.tick_duration
    }

    /// Marks the start of a tick and returns its start time.
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.accumulator = self.accumulator.saturating_sub(self.tick_duration);
        self.tick_count += 1;
        Instant::now()
    }

    /// Marks the end of a tick started at `start`.
    pub fn end_tick(&mut self, start: Instant) {
        let duration = start.elapsed();
        let us = duration_us(duration);

        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(us);
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + us) / 16;

        if duration > self.tick_duration {
            self.stats.late_ticks += 1;
            tracing::debug!("Tick {} ran late: {}us", self.tick_count, us);
        }
    }

    /// Sleeps until the next tick is due.
    pub fn wait_for_next_tick(&self) {
        let elapsed = Instant::now().duration_since(self.last_tick);
        if elapsed < self.tick_duration {
            std::thread::sleep(self.tick_duration - elapsed);
        }
    }

    /// Ticks begun so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Target tick duration.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Resets statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::fresh(self.tick_duration);
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new(tether_shared::TICK_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_loop_creation() {
        let tick_loop = TickLoop::new(60);
        assert_eq!(tick_loop.tick_count(), 0);
        assert_eq!(tick_loop.tick_duration(), Duration::from_micros(16666));
    }

    #[test]
    fn test_zero_rate_does_not_divide_by_zero() {
        assert_eq!(TickLoop::new(0).tick_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_tick_execution() {
        let mut tick_loop = TickLoop::new(1000);
        std::thread::sleep(Duration::from_millis(5));
        assert!(tick_loop.should_tick());

        let start = tick_loop.begin_tick();
        tick_loop.end_tick(start);

        assert_eq!(tick_loop.tick_count(), 1);
        assert_eq!(tick_loop.stats().total_ticks, 1);
        assert!(tick_loop.stats().min_tick_us <= tick_loop.stats().max_tick_us);
    }
}
