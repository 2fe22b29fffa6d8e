//! # Utility Functions
//!
//! Helpers shared by the report renderer, the configuration layer and the
//! demo driver.
//!
//! - **Unit conversion**: nanosecond durations to seconds and milliseconds,
//!   the two units every report line uses
//! - **Formatting**: human-readable durations for diagnostics
//! - **Statistics**: population mean and standard deviation for the thread
//!   fairness figures
//! - **Validation**: range checks for the numeric options with the error
//!   messages users see
//!
//! ## Usage Examples
//!
//! ```rust
//! use bench_stats::utils::*;
//! use std::time::Duration;
//!
//! assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
//! assert_eq!(as_millis_f64(Duration::from_micros(1500)), 1.5);
//!
//! let (mean, std_dev) = mean_and_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
//! assert_eq!((mean, std_dev), (5.0, 2.0));
//! ```

use crate::error::{Result, StatsError};
use crate::message::Priority;
use std::time::Duration;

/// Seconds as a float, the unit of every `total time` figure.
#[inline]
pub fn as_secs_f64(duration: Duration) -> f64 {
    duration.as_secs_f64()
}

/// Milliseconds as a float, the unit of the response-time figures.
#[inline]
pub fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Saturating conversion of a duration to whole nanoseconds.
#[inline]
pub fn as_nanos_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Format a duration in a human-readable way
///
/// Picks the most appropriate unit for the magnitude:
///
/// - **Nanoseconds**: < 1,000 ns (e.g., "500ns")
/// - **Microseconds**: < 1,000,000 ns (e.g., "1.50μs")
/// - **Milliseconds**: < 1,000,000,000 ns (e.g., "25.75ms")
/// - **Seconds**: < 60 seconds (e.g., "5.25s")
/// - **Minutes and Hours**: compound form (e.g., "5m 30s", "2h 15m 30s")
///
/// ## Examples
///
/// ```rust
/// # use bench_stats::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Population mean and standard deviation of `values`.
///
/// The divisor is the number of values, not `n - 1`: the inputs are the
/// complete set of worker threads rather than a sample of them. An empty
/// slice yields `(0.0, 0.0)`.
pub fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count;

    (mean, variance.sqrt())
}

/// Number of logical CPUs, the default worker count.
pub fn get_cpu_cores() -> usize {
    num_cpus::get()
}

pub fn validate_verbosity(verbosity: i64) -> Result<u8> {
    u8::try_from(verbosity)
        .ok()
        .filter(|v| *v <= Priority::MAX_VERBOSITY)
        .ok_or_else(|| StatsError::Config(format!("Invalid value for verbosity: {}", verbosity)))
}

pub fn validate_percentile_rank(rank: i64) -> Result<u32> {
    u32::try_from(rank)
        .ok()
        .filter(|r| (1..=100).contains(r))
        .ok_or_else(|| {
            StatsError::Config(format!("Invalid value for percentile option: {}", rank))
        })
}

pub fn validate_threads(threads: i64) -> Result<usize> {
    usize::try_from(threads)
        .ok()
        .filter(|t| *t > 0)
        .ok_or_else(|| {
            StatsError::Config(format!("Number of threads must be at least 1, got {}", threads))
        })
}
