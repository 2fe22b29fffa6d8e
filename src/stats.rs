//! # Shared Operation Statistics
//!
//! [`OperationStats`] is the only state shared between worker threads and
//! the reporter: one [`Timer`] slot per worker, the run-wide latency
//! [`PercentileEstimator`], and the execution clock the reporter splits to
//! measure each reporting period.
//!
//! ## Locking Discipline
//!
//! Every slot sits behind its own mutex, which only its worker and the
//! reporter ever take, so the worker path is uncontended in practice. When
//! checkpointing is configured an additional checkpoint lock is held around
//! every start/stop and around the reporter's copy-and-reset, which makes a
//! mid-run snapshot consistent across all slots. Without checkpointing the
//! checkpoint lock does not exist and workers never wait on each other.
//!
//! The critical sections copy or update a handful of fields; sample
//! recording into the estimator happens after the slot lock is released.

use crate::defaults;
use crate::error::{Result, StatsError};
use crate::percentile::PercentileEstimator;
use crate::timer::Timer;
use crate::utils::as_nanos_u64;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Index of a worker thread's timer slot, `0..threads`.
pub type WorkerId = usize;

/// Timers and percentile data taken by one report.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Per-worker timers as they were at snapshot time, running state
    /// included.
    pub timers: Vec<Timer>,
    /// Estimated latency at the requested rank, in nanoseconds; 0 when no
    /// samples were recorded.
    pub percentile_ns: u64,
    /// Wall-clock length of the reporting period.
    pub period: Duration,
}

#[derive(Debug)]
pub struct OperationStats {
    timers: Box<[Mutex<Timer>]>,
    percentile: PercentileEstimator,
    checkpoint_lock: Option<Mutex<()>>,
    clock: Mutex<Timer>,
}

impl OperationStats {
    /// Storage for `threads` workers with the default estimator range.
    pub fn new(threads: usize, checkpointing: bool) -> Result<Self> {
        let percentile = PercentileEstimator::new(
            defaults::PERCENTILE_GRANULARITY,
            defaults::PERCENTILE_MIN_VALUE,
            defaults::PERCENTILE_MAX_VALUE,
        )?;
        Self::with_estimator(threads, checkpointing, percentile)
    }

    pub fn with_estimator(
        threads: usize,
        checkpointing: bool,
        percentile: PercentileEstimator,
    ) -> Result<Self> {
        if threads == 0 {
            return Err(StatsError::Config(
                "Number of threads must be at least 1".into(),
            ));
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(threads)
            .map_err(|e| StatsError::Resource(format!("timers for {} threads: {}", threads, e)))?;
        slots.extend((0..threads).map(|_| Mutex::new(Timer::new())));

        debug!(
            "Allocated {} timer slots (checkpointing: {})",
            threads, checkpointing
        );

        Ok(Self {
            timers: slots.into_boxed_slice(),
            percentile,
            checkpoint_lock: checkpointing.then(|| Mutex::new(())),
            clock: Mutex::new(Timer::new()),
        })
    }

    pub fn threads(&self) -> usize {
        self.timers.len()
    }

    pub fn is_checkpointing(&self) -> bool {
        self.checkpoint_lock.is_some()
    }

    pub fn estimator(&self) -> &PercentileEstimator {
        &self.percentile
    }

    fn slot(&self, id: WorkerId) -> Result<&Mutex<Timer>> {
        self.timers.get(id).ok_or(StatsError::InvalidThread {
            id,
            threads: self.timers.len(),
        })
    }

    /// Mark the beginning of the run; reporting periods are measured from
    /// here.
    pub fn start_clock(&self) {
        self.start_clock_at(Instant::now());
    }

    pub fn start_clock_at(&self, now: Instant) {
        self.clock.lock().start_at(now);
    }

    /// Copy of the execution clock, running since `start_clock`.
    pub fn clock(&self) -> Timer {
        *self.clock.lock()
    }

    /// Time since the run started, including the period in progress.
    pub fn elapsed(&self) -> Duration {
        self.clock.lock().current()
    }

    /// Begin an operation on worker `id`.
    pub fn start(&self, id: WorkerId) -> Result<()> {
        self.start_at(id, Instant::now())
    }

    pub fn start_at(&self, id: WorkerId, now: Instant) -> Result<()> {
        let slot = self.slot(id)?;
        let _checkpoint = self.checkpoint_lock.as_ref().map(|lock| lock.lock());
        slot.lock().start_at(now);
        Ok(())
    }

    /// Finish the operation on worker `id` and record its latency.
    pub fn stop(&self, id: WorkerId) -> Result<Duration> {
        self.stop_at(id, Instant::now())
    }

    pub fn stop_at(&self, id: WorkerId, now: Instant) -> Result<Duration> {
        let slot = self.slot(id)?;
        let latency = {
            let _checkpoint = self.checkpoint_lock.as_ref().map(|lock| lock.lock());
            slot.lock().stop_at(now)?
        };
        self.percentile.update(as_nanos_u64(latency));
        Ok(latency)
    }

    /// Copy of worker `id`'s timer.
    pub fn timer(&self, id: WorkerId) -> Result<Timer> {
        Ok(*self.slot(id)?.lock())
    }

    /// Copy and reset every slot, drain the estimator at `rank` and split
    /// the execution clock.
    pub fn snapshot(&self, rank: u32) -> Snapshot {
        self.snapshot_at(rank, Instant::now())
    }

    pub fn snapshot_at(&self, rank: u32, now: Instant) -> Snapshot {
        let _checkpoint = self.checkpoint_lock.as_ref().map(|lock| lock.lock());

        let timers = self
            .timers
            .iter()
            .map(|slot| {
                let mut timer = slot.lock();
                let copy = *timer;
                timer.reset();
                copy
            })
            .collect();
        let period = self.clock.lock().split_at(now);
        let percentile_ns = self.percentile.drain(rank);

        Snapshot {
            timers,
            percentile_ns,
            period,
        }
    }
}
