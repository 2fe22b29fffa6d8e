//! # Approximate Percentile Estimator
//!
//! Latency samples span many orders of magnitude (1ns up to hours), so the
//! estimator maps the value domain onto a fixed number of buckets on a
//! logarithmic scale. Bucket width grows geometrically, which keeps the
//! relative error of every estimate bounded across the whole range:
//! with `granularity` buckets over `[min, max]` each bucket spans a factor
//! of `(max / min)^(1 / (granularity - 1))`.
//!
//! ## Thread Safety
//!
//! Buckets are atomic counters. [`PercentileEstimator::update`] is lock-free
//! and may run concurrently with [`PercentileEstimator::calculate`],
//! [`PercentileEstimator::reset`] and [`PercentileEstimator::drain`]; no
//! external lock is needed on the update path. `drain` swaps every bucket
//! to zero as it reads it, so a sample recorded while a report is being
//! taken lands either in that report or in the next one and is never lost.
//!
//! ## Clamping
//!
//! Values below `min` or above `max` are clamped to the nearest bound, so
//! every update increments exactly one bucket.

use crate::error::{Result, StatsError};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct PercentileEstimator {
    buckets: Box<[AtomicU64]>,
    min: u64,
    max: u64,
    /// ln(min), subtracted before scaling
    range_deduct: f64,
    /// buckets per unit of ln(value)
    range_mult: f64,
}

impl PercentileEstimator {
    /// Create an estimator with `granularity` buckets covering `[min, max]`.
    ///
    /// ## Errors
    ///
    /// [`StatsError::Config`] if `granularity` is zero, `min` is zero (the
    /// scale is logarithmic) or `min >= max`.
    pub fn new(granularity: usize, min: u64, max: u64) -> Result<Self> {
        if granularity == 0 {
            return Err(StatsError::Config(
                "percentile granularity must be greater than 0".into(),
            ));
        }
        if min == 0 {
            return Err(StatsError::Config(
                "percentile range minimum must be at least 1".into(),
            ));
        }
        if min >= max {
            return Err(StatsError::Config(format!(
                "percentile range minimum ({}) must be below maximum ({})",
                min, max
            )));
        }

        let range_deduct = (min as f64).ln();
        let span = (max as f64).ln() - range_deduct;
        // A single bucket holds everything; scale collapses to zero.
        let range_mult = if granularity > 1 {
            (granularity - 1) as f64 / span
        } else {
            0.0
        };

        let buckets = (0..granularity).map(|_| AtomicU64::new(0)).collect();

        Ok(Self {
            buckets,
            min,
            max,
            range_deduct,
            range_mult,
        })
    }

    pub fn granularity(&self) -> usize {
        self.buckets.len()
    }

    pub fn range(&self) -> (u64, u64) {
        (self.min, self.max)
    }

    /// Record one sample.
    #[inline]
    pub fn update(&self, value: u64) {
        let idx = self.bucket_index(value);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    /// Number of samples currently recorded.
    pub fn count(&self) -> u64 {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .sum()
    }

    /// Value at percentile `rank`, or 0 when nothing was recorded.
    ///
    /// `rank` is clamped to `1..=100`. The returned value is the upper
    /// bound of the bucket the rank falls into, so `calculate(100)` is never
    /// below the largest in-range sample.
    pub fn calculate(&self, rank: u32) -> u64 {
        let counts: Vec<u64> = self
            .buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        self.value_at_rank(&counts, rank)
    }

    pub fn reset(&self) {
        for bucket in self.buckets.iter() {
            bucket.store(0, Ordering::Relaxed);
        }
    }

    /// Calculate the value at `rank` and reset, as one pass over the buckets.
    pub fn drain(&self, rank: u32) -> u64 {
        let counts: Vec<u64> = self
            .buckets
            .iter()
            .map(|b| b.swap(0, Ordering::Relaxed))
            .collect();
        self.value_at_rank(&counts, rank)
    }

    fn bucket_index(&self, value: u64) -> usize {
        let clamped = value.clamp(self.min, self.max) as f64;
        let scaled = ((clamped.ln() - self.range_deduct) * self.range_mult + 0.5).floor();
        if scaled <= 0.0 {
            0
        } else {
            (scaled as usize).min(self.buckets.len() - 1)
        }
    }

    fn bucket_upper_bound(&self, idx: usize) -> u64 {
        if idx + 1 >= self.buckets.len() {
            return self.max;
        }
        let bound = ((idx as f64 + 0.5) / self.range_mult + self.range_deduct)
            .exp()
            .ceil();
        (bound as u64).clamp(self.min, self.max)
    }

    fn value_at_rank(&self, counts: &[u64], rank: u32) -> u64 {
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return 0;
        }

        let rank = rank.clamp(1, 100);
        let target = ((total as f64 * f64::from(rank) / 100.0 + 0.5).floor() as u64).max(1);

        let mut cumulative = 0u64;
        for (idx, &count) in counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                return self.bucket_upper_bound(idx);
            }
        }

        self.max
    }
}
