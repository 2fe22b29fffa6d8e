//! # Global Statistics Reporter
//!
//! Turns a [`Snapshot`] of the per-thread timers into [`GlobalStats`] and
//! renders it through the logging context, once as human-readable text and
//! once as structured values, nested as:
//!
//! ```text
//! general_statistics
//! ├── total_time, total_events, total_time_event_execution
//! ├── response_time
//! │   └── min, avg, max, percentile_rank, percentile
//! ├── threads_fairness
//! │   └── events_avg, events_stddev, execution_time_avg, execution_time_stddev
//! └── threads            (per-thread statistics, debug only)
//!     └── thread_<n>
//!         └── thread, min, avg, max, events, total_time_event_execution
//! ```
//!
//! ## Forced Shutdown
//!
//! When the run is being torn down forcibly some workers may be stuck inside
//! an operation. Their snapshot copies are stopped at report time so the
//! truncated operation still counts towards the totals, and the number of
//! such operations is reported as unfinished. The live timers are left
//! alone.
//!
//! ## Fairness
//!
//! Fairness is reported as the population standard deviation (divisor =
//! thread count) of the per-thread event counts and of the per-thread
//! execution times, next to their averages.

use crate::context::LoggingContext;
use crate::error::{Result, StatsError};
use crate::message::Priority;
use crate::stats::Snapshot;
use crate::timer::Timer;
use crate::utils::{as_millis_f64, as_secs_f64, mean_and_stddev};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Statistics of a single worker over the reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadStats {
    pub thread: usize,
    pub events: u64,
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
    pub execution_time: Duration,
}

/// How evenly work was spread across the workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fairness {
    pub events_avg: f64,
    pub events_stddev: f64,
    /// Seconds.
    pub execution_time_avg: f64,
    /// Seconds.
    pub execution_time_stddev: f64,
}

/// One report: either a checkpoint or the final statistics of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub timestamp: DateTime<Utc>,
    /// Wall-clock length of the reporting period.
    pub total_time: Duration,
    pub total_events: u64,
    /// Time spent inside operations, summed over all workers.
    pub execution_time: Duration,
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
    pub percentile_rank: u32,
    /// Approximate latency at `percentile_rank`; `None` when no operation
    /// completed.
    pub percentile: Option<Duration>,
    /// Operations still running when a forced shutdown report was taken.
    pub unfinished: u32,
    pub fairness: Fairness,
    pub threads: Vec<ThreadStats>,
}

/// Average and population standard deviation of per-thread event counts
/// and execution times.
pub fn fairness(timers: &[Timer]) -> Fairness {
    let events: Vec<f64> = timers.iter().map(|t| t.events() as f64).collect();
    let times: Vec<f64> = timers.iter().map(|t| as_secs_f64(t.sum_time())).collect();

    let (events_avg, events_stddev) = mean_and_stddev(&events);
    let (execution_time_avg, execution_time_stddev) = mean_and_stddev(&times);

    Fairness {
        events_avg,
        events_stddev,
        execution_time_avg,
        execution_time_stddev,
    }
}

impl GlobalStats {
    /// Aggregate a snapshot. With `forced_shutdown`, operations still in
    /// flight are stopped at `now` and counted as unfinished.
    pub fn from_snapshot(
        snapshot: Snapshot,
        percentile_rank: u32,
        forced_shutdown: bool,
        now: Instant,
    ) -> Self {
        let mut timers = snapshot.timers;
        let mut unfinished = 0;

        if forced_shutdown {
            for timer in timers.iter_mut().filter(|t| t.is_running()) {
                if timer.stop_at(now).is_ok() {
                    unfinished += 1;
                }
            }
        }

        let total = timers
            .iter()
            .fold(Timer::new(), |acc, t| Timer::merge(&acc, t));

        let percentile = (total.events() > 0).then(|| Duration::from_nanos(snapshot.percentile_ns));

        let threads = timers
            .iter()
            .enumerate()
            .map(|(thread, t)| ThreadStats {
                thread,
                events: t.events(),
                min: t.min_time(),
                avg: t.avg_time(),
                max: t.max_time(),
                execution_time: t.sum_time(),
            })
            .collect();

        GlobalStats {
            timestamp: Utc::now(),
            total_time: snapshot.period,
            total_events: total.events(),
            execution_time: total.sum_time(),
            min: total.min_time(),
            avg: total.avg_time(),
            max: total.max_time(),
            percentile_rank,
            percentile,
            unfinished,
            fairness: fairness(&timers),
            threads,
        }
    }

    /// Render through every sink of `ctx`. Rendering continues past sink
    /// failures so sections stay balanced; the first failure is returned.
    pub(crate) fn emit(&self, ctx: &LoggingContext, per_thread: bool) -> Result<()> {
        let mut out = ReportWriter {
            ctx,
            first_error: None,
        };

        if self.unfinished > 0 {
            out.text(Priority::Notice, format_args!(""));
            out.text(
                Priority::Notice,
                format_args!(
                    "Number of unfinished transactions on forced shutdown: {}",
                    self.unfinished
                ),
            );
        }

        out.begin("general_statistics");
        out.text(Priority::Notice, format_args!(""));
        out.text(Priority::Notice, format_args!("General statistics:"));
        let s1 = out.value("total_time", format_args!("{:.4}", as_secs_f64(self.total_time)));
        out.text(
            Priority::Notice,
            format_args!("    total time:                          {}s", s1),
        );
        let s1 = out.value("total_events", format_args!("{}", self.total_events));
        out.text(
            Priority::Notice,
            format_args!("    total number of events:              {}", s1),
        );
        let s1 = out.value(
            "total_time_event_execution",
            format_args!("{:.4}", as_secs_f64(self.execution_time)),
        );
        out.text(
            Priority::Notice,
            format_args!("    total time taken by event execution: {}s", s1),
        );

        out.begin("response_time");
        out.text(Priority::Notice, format_args!("    response time:"));
        for (tag, value) in [("min", self.min), ("avg", self.avg), ("max", self.max)] {
            let s1 = out.value(tag, format_args!("{:10.2}", as_millis_f64(value)));
            out.text(
                Priority::Notice,
                format_args!("         {}:                            {}ms", tag, s1),
            );
        }
        if let Some(percentile) = self.percentile {
            let s1 = out.value("percentile_rank", format_args!("{:3}", self.percentile_rank));
            let s2 = out.value("percentile", format_args!("{:10.2}", as_millis_f64(percentile)));
            out.text(
                Priority::Notice,
                format_args!("         approx. {} percentile:         {}ms", s1, s2),
            );
        }
        out.end("response_time");
        out.text(Priority::Notice, format_args!(""));

        out.begin("threads_fairness");
        out.text(Priority::Notice, format_args!("Threads fairness:"));
        let s1 = out.value("events_avg", format_args!("{:.4}", self.fairness.events_avg));
        let s2 = out.value("events_stddev", format_args!("{:3.2}", self.fairness.events_stddev));
        out.text(
            Priority::Notice,
            format_args!("    events (avg/stddev):           {}/{}", s1, s2),
        );
        let s1 = out.value(
            "execution_time_avg",
            format_args!("{:.4}", self.fairness.execution_time_avg),
        );
        let s2 = out.value(
            "execution_time_stddev",
            format_args!("{:3.2}", self.fairness.execution_time_stddev),
        );
        out.text(
            Priority::Notice,
            format_args!("    execution time (avg/stddev):   {}/{}", s1, s2),
        );
        out.text(Priority::Notice, format_args!(""));
        out.end("threads_fairness");

        if per_thread {
            self.emit_threads(&mut out);
        }
        out.end("general_statistics");

        out.finish()
    }

    fn emit_threads(&self, out: &mut ReportWriter<'_>) {
        out.begin("threads");
        out.text(Priority::Debug, format_args!("Verbose per-thread statistics:"));
        for t in &self.threads {
            let section = format!("thread_{}", t.thread);
            out.begin(&section);
            let id = out.debug_value("thread", format_args!("{:3}", t.thread));
            let min = out.debug_value("min", format_args!("{:.4}", as_secs_f64(t.min)));
            let avg = out.debug_value("avg", format_args!("{:.4}", as_secs_f64(t.avg)));
            let max = out.debug_value("max", format_args!("{:.4}", as_secs_f64(t.max)));
            let events = out.debug_value("events", format_args!("{}", t.events));
            out.text(
                Priority::Debug,
                format_args!(
                    "    thread #{}: min: {}s  avg: {}s  max: {}s  events: {}",
                    id, min, avg, max, events
                ),
            );
            let total = out.debug_value(
                "total_time_event_execution",
                format_args!("{:.4}", as_secs_f64(t.execution_time)),
            );
            out.text(
                Priority::Debug,
                format_args!("                 total time taken by event execution: {}s", total),
            );
            out.end(&section);
        }
        out.text(Priority::Notice, format_args!(""));
        out.end("threads");
    }
}

/// Emission helper that keeps going after a sink failure.
struct ReportWriter<'a> {
    ctx: &'a LoggingContext,
    first_error: Option<StatsError>,
}

impl ReportWriter<'_> {
    fn text(&mut self, priority: Priority, args: fmt::Arguments<'_>) {
        let line = args.to_string();
        if let Err(e) = self.ctx.emit_text(priority, &line) {
            self.first_error.get_or_insert(e);
        }
    }

    fn value(&mut self, tag: &str, args: fmt::Arguments<'_>) -> String {
        self.structured(Priority::Notice, tag, args)
    }

    fn debug_value(&mut self, tag: &str, args: fmt::Arguments<'_>) -> String {
        self.structured(Priority::Debug, tag, args)
    }

    fn structured(&mut self, priority: Priority, tag: &str, args: fmt::Arguments<'_>) -> String {
        match self.ctx.try_emit_structured(priority, tag, args) {
            Ok(value) => value,
            Err((value, e)) => {
                self.first_error.get_or_insert(e);
                value
            }
        }
    }

    fn begin(&mut self, name: &str) {
        self.ctx.begin_section(name);
    }

    fn end(&mut self, name: &str) {
        self.ctx.end_section(name);
    }

    fn finish(self) -> Result<()> {
        self.first_error.map_or(Ok(()), Err)
    }
}
