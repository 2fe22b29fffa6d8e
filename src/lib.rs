//! # Bench Stats Library
//!
//! Runtime statistics collection and structured reporting for multi-threaded
//! workload benchmarks. Worker threads mark the start and end of every
//! operation; the library keeps per-thread latency figures at minimal cost,
//! merges them into global statistics on demand (also mid-run, while the
//! workers keep going), estimates a latency percentile over a range from
//! nanoseconds to hours, and renders every report through any number of
//! pluggable sinks.
//!
//! ## Built-in Sinks
//!
//! - **Text**: console output with verbosity filtering, duplicate-line
//!   suppression and severity prefixes on the error stream
//! - **XML**: `<?xml version="1.0"?>` document rooted at `<sysbench>`
//! - **JSON**: strict JSON document (or the legacy layout) rooted at a
//!   `sysbench` object
//! - **Operation**: feeds start/stop events into the per-thread timers and
//!   the percentile estimator
//!
//! ## Architecture Overview
//!
//! ```text
//! worker ──event_start/stop──► LoggingContext ──► HandlerRegistry ──► OperationSink
//!                                   │                                    │
//!                                   │                             OperationStats
//!                                   │                        (Timer slots + estimator)
//!                          report / done                                 │
//!                                   └──── snapshot ◄─────────────────────┘
//!                                   │
//!                          GlobalStats::emit ──► text / structured messages ──► all sinks
//! ```
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use bench_stats::{LoggingContext, StatsConfig};
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = StatsConfig {
//!         threads: 4,
//!         xml_file: Some("report.xml".into()),
//!         ..StatsConfig::default()
//!     };
//!
//!     let mut ctx = LoggingContext::new(config)?;
//!     ctx.init()?;
//!     let ctx = Arc::new(ctx);
//!
//!     let workers: Vec<_> = (0..4)
//!         .map(|id| {
//!             let ctx = ctx.clone();
//!             std::thread::spawn(move || -> bench_stats::Result<()> {
//!                 for _ in 0..1000 {
//!                     ctx.event_start(id)?;
//!                     std::thread::sleep(std::time::Duration::from_millis(1));
//!                     ctx.event_stop(id)?;
//!                 }
//!                 Ok(())
//!             })
//!         })
//!         .collect();
//!     for worker in workers {
//!         worker.join().expect("worker panicked")?;
//!     }
//!
//!     ctx.done()?;
//!     Ok(())
//! }
//! ```

/// Periodic checkpoint reports on a dedicated thread
pub mod checkpoint;

/// Command-line interface for the demo driver
///
/// Argument parsing with clap; the parsed arguments double as an
/// [`OptionStore`] so the statistics configuration reads them by name.
pub mod cli;

/// Configuration and the option-store abstraction
pub mod config;

/// The logging context: registration, emission, reporting and teardown
pub mod context;

/// Error types
pub mod error;

/// Handler capability trait
pub mod handler;

/// Internal diagnostics through `tracing`
pub mod logging;

/// Messages routed to handlers
pub mod message;

/// Logarithmic-bucket latency percentile estimator
///
/// Approximates percentiles over a very wide value range with bounded
/// relative error and lock-free updates.
pub mod percentile;

/// Ordered handler chains and best-effort dispatch
pub mod registry;

/// Global statistics aggregation, fairness and rendering
pub mod report;

/// Built-in sinks and output targets
pub mod sinks;

/// Timer slots and estimator shared between workers and the reporter
pub mod stats;

/// Per-thread operation timer
pub mod timer;

pub mod utils;

pub use checkpoint::CheckpointScheduler;
pub use config::{MapOptions, OptionStore, StatsConfig};
pub use context::{ConfigEntry, LoggingContext, OptionValue, SinkTargets};
pub use error::{Result, StatsError};
pub use handler::{Handler, InitStatus, OptionSpec};
pub use message::{Message, MessageKind, OperAction, Priority};
pub use percentile::PercentileEstimator;
pub use registry::HandlerRegistry;
pub use report::{fairness, Fairness, GlobalStats, ThreadStats};
pub use sinks::{JsonSink, JsonStyle, OperationSink, OutputTarget, SharedBuffer, TextSink, XmlSink};
pub use stats::{OperationStats, Snapshot, WorkerId};
pub use timer::Timer;

/// The current version of the library
///
/// Populated from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Default text verbosity: notices and everything more severe.
    pub const VERBOSITY: u8 = 3;

    /// Default percentile rank reported for operation latencies.
    pub const PERCENTILE_RANK: u32 = 95;

    /// Number of buckets in the latency estimator.
    ///
    /// With the default range each bucket spans a factor of about 1.0003,
    /// so an estimate is within 0.03% of the true sample value.
    pub const PERCENTILE_GRANULARITY: usize = 100_000;

    /// Smallest latency the estimator distinguishes, in nanoseconds.
    pub const PERCENTILE_MIN_VALUE: u64 = 1;

    /// Largest latency the estimator distinguishes, in nanoseconds
    /// (about 2.8 hours).
    pub const PERCENTILE_MAX_VALUE: u64 = 10_000_000_000_000;
}
