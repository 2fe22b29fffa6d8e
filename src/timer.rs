//! # Per-Thread Operation Timer
//!
//! A [`Timer`] accumulates the latency of every operation a single worker
//! thread executes: total time spent inside operations, the shortest and
//! longest interval, and the number of completed operations.
//!
//! ## Ownership
//!
//! Each worker owns exactly one timer slot (see [`crate::stats`]). Only the
//! owning thread calls `start`/`stop`; the reporter copies and resets the
//! slot between reporting periods.
//!
//! ## Restart Semantics
//!
//! Calling [`Timer::start`] on a timer that is already running is treated
//! as a restart: the pending interval is discarded and timing begins again
//! from the new instant. [`Timer::stop`] on a stopped timer is rejected
//! with [`StatsError::TimerNotRunning`] and leaves the timer untouched.
//!
//! ## Merging
//!
//! [`Timer::merge`] combines two timers field by field. It is associative
//! and commutative, so reducing the per-thread timers in any order yields
//! the same aggregate.

use crate::error::{Result, StatsError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timer {
    start: Option<Instant>,
    last_split: Option<Instant>,
    last_value: Duration,
    elapsed_total: Duration,
    min: Option<Duration>,
    max: Duration,
    events: u64,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing an operation now.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Start timing an operation at `now`.
    pub fn start_at(&mut self, now: Instant) {
        self.start = Some(now);
        if self.last_split.is_none() {
            self.last_split = Some(now);
        }
    }

    /// Stop the running operation and return its interval.
    pub fn stop(&mut self) -> Result<Duration> {
        self.stop_at(Instant::now())
    }

    /// Stop the running operation at `now` and return its interval.
    ///
    /// A `now` earlier than the start instant yields a zero interval.
    pub fn stop_at(&mut self, now: Instant) -> Result<Duration> {
        let started = self.start.take().ok_or(StatsError::TimerNotRunning)?;
        let delta = now.saturating_duration_since(started);

        self.last_value = delta;
        self.elapsed_total += delta;
        self.min = Some(self.min.map_or(delta, |m| m.min(delta)));
        self.max = self.max.max(delta);
        self.events += 1;

        Ok(delta)
    }

    pub fn is_running(&self) -> bool {
        self.start.is_some()
    }

    /// Interval of the most recently completed operation.
    pub fn value(&self) -> Duration {
        self.last_value
    }

    /// Zero all accumulated statistics, keeping a running operation running.
    pub fn reset(&mut self) {
        *self = Timer {
            start: self.start,
            last_split: self.last_split,
            ..Timer::default()
        };
    }

    /// Time elapsed since the previous split (or since the first start),
    /// moving the split point to now. Returns zero for a timer that was
    /// never started.
    pub fn split(&mut self) -> Duration {
        self.split_at(Instant::now())
    }

    pub fn split_at(&mut self, now: Instant) -> Duration {
        match self.last_split.replace(now) {
            Some(previous) => now.saturating_duration_since(previous),
            None => {
                self.last_split = None;
                Duration::ZERO
            }
        }
    }

    /// Accumulated time including the operation currently in flight.
    pub fn current(&self) -> Duration {
        match self.start {
            Some(started) => self.elapsed_total + started.elapsed(),
            None => self.elapsed_total,
        }
    }

    /// Combine two timers into a stopped aggregate.
    pub fn merge(a: &Timer, b: &Timer) -> Timer {
        let min = match (a.min, b.min) {
            (Some(x), Some(y)) => Some(x.min(y)),
            (x, None) => x,
            (None, y) => y,
        };

        Timer {
            start: None,
            last_split: None,
            last_value: Duration::ZERO,
            elapsed_total: a.elapsed_total + b.elapsed_total,
            min,
            max: a.max.max(b.max),
            events: a.events + b.events,
        }
    }

    pub fn events(&self) -> u64 {
        self.events
    }

    /// Total time spent inside completed operations.
    pub fn sum_time(&self) -> Duration {
        self.elapsed_total
    }

    /// Shortest completed interval, zero when no operation completed.
    pub fn min_time(&self) -> Duration {
        self.min.unwrap_or(Duration::ZERO)
    }

    pub fn max_time(&self) -> Duration {
        self.max
    }

    /// Mean interval, zero when no operation completed.
    pub fn avg_time(&self) -> Duration {
        if self.events == 0 {
            return Duration::ZERO;
        }
        let nanos = self.elapsed_total.as_nanos() / u128::from(self.events);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer_with(intervals_ms: &[u64]) -> Timer {
        let base = Instant::now();
        let mut timer = Timer::new();
        for &ms in intervals_ms {
            timer.start_at(base);
            timer.stop_at(base + Duration::from_millis(ms)).unwrap();
        }
        timer
    }

    #[test]
    fn test_start_stop_accounting() {
        let mut timer = Timer::new();
        let mut sum = Duration::ZERO;

        for _ in 0..5 {
            timer.start();
            std::thread::sleep(Duration::from_micros(200));
            sum += timer.stop().unwrap();
        }

        assert_eq!(timer.events(), 5);
        assert_eq!(timer.sum_time(), sum);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_first_sample_sets_min_and_max() {
        let timer = timer_with(&[7]);
        assert_eq!(timer.min_time(), Duration::from_millis(7));
        assert_eq!(timer.max_time(), Duration::from_millis(7));
        assert_eq!(timer.value(), Duration::from_millis(7));

        let timer = timer_with(&[7, 3, 12]);
        assert_eq!(timer.min_time(), Duration::from_millis(3));
        assert_eq!(timer.max_time(), Duration::from_millis(12));
        assert_eq!(timer.avg_time(), Duration::from_nanos(22_000_000 / 3));
        assert_eq!(timer.value(), Duration::from_millis(12));
    }

    #[test]
    fn test_stop_requires_running() {
        let mut timer = Timer::new();
        assert!(matches!(timer.stop(), Err(StatsError::TimerNotRunning)));
        assert_eq!(timer.events(), 0);
    }

    #[test]
    fn test_start_while_running_restarts() {
        let base = Instant::now();
        let mut timer = Timer::new();
        timer.start_at(base);
        timer.start_at(base + Duration::from_millis(10));
        let value = timer.stop_at(base + Duration::from_millis(15)).unwrap();

        assert_eq!(value, Duration::from_millis(5));
        assert_eq!(timer.events(), 1);
    }

    #[test]
    fn test_reset_keeps_running_state() {
        let base = Instant::now();
        let mut timer = timer_with(&[4, 5]);
        timer.start_at(base);
        timer.reset();

        assert!(timer.is_running());
        assert_eq!(timer.events(), 0);
        assert_eq!(timer.sum_time(), Duration::ZERO);
        assert_eq!(timer.min_time(), Duration::ZERO);

        let value = timer.stop_at(base + Duration::from_millis(2)).unwrap();
        assert_eq!(value, Duration::from_millis(2));
        assert_eq!(timer.events(), 1);
    }

    #[test]
    fn test_merge_is_associative_and_commutative() {
        let a = timer_with(&[3, 9]);
        let b = timer_with(&[1]);
        let c = timer_with(&[20, 2, 5]);

        let left = Timer::merge(&Timer::merge(&a, &b), &c);
        let right = Timer::merge(&a, &Timer::merge(&b, &c));
        let swapped = Timer::merge(&a, &Timer::merge(&c, &b));

        assert_eq!(left, right);
        assert_eq!(right, swapped);
        assert_eq!(left.events(), 6);
        assert_eq!(left.min_time(), Duration::from_millis(1));
        assert_eq!(left.max_time(), Duration::from_millis(20));
        assert_eq!(left.sum_time(), Duration::from_millis(40));
    }

    #[test]
    fn test_merge_ignores_unset_min() {
        let empty = Timer::new();
        let a = timer_with(&[6]);

        assert_eq!(Timer::merge(&empty, &a).min_time(), Duration::from_millis(6));
        assert_eq!(Timer::merge(&a, &empty).min_time(), Duration::from_millis(6));
        assert_eq!(Timer::merge(&empty, &empty).min_time(), Duration::ZERO);
    }

    #[test]
    fn test_split() {
        let base = Instant::now();
        let mut timer = Timer::new();
        assert_eq!(timer.split_at(base), Duration::ZERO);

        timer.start_at(base);
        assert_eq!(
            timer.split_at(base + Duration::from_secs(2)),
            Duration::from_secs(2)
        );
        assert_eq!(
            timer.split_at(base + Duration::from_secs(5)),
            Duration::from_secs(3)
        );
    }
}
