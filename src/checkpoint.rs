//! # Checkpoint Scheduler
//!
//! Runs [`LoggingContext::report_checkpoint`] on a dedicated thread at a
//! fixed interval while the workers keep running. The scheduler is the only
//! mid-run reporter; the final report is taken by `LoggingContext::done`
//! after the scheduler has been stopped.

use crate::context::LoggingContext;
use crate::error::{Result, StatsError};
use crossbeam::channel::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

pub struct CheckpointScheduler {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<u64>>,
}

impl CheckpointScheduler {
    /// Start reporting every `interval`.
    pub fn spawn(ctx: Arc<LoggingContext>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(StatsError::Config(
                "checkpoint interval must be greater than 0".into(),
            ));
        }

        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let ticker = channel::tick(interval);

        let handle = thread::Builder::new()
            .name("checkpoint".into())
            .spawn(move || {
                let mut reports = 0u64;
                loop {
                    channel::select! {
                        recv(ticker) -> _ => {
                            if let Err(e) = ctx.report_checkpoint() {
                                warn!("Checkpoint report failed: {}", e);
                            }
                            reports += 1;
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
                debug!("Checkpoint scheduler stopped after {} reports", reports);
                reports
            })
            .map_err(|e| StatsError::Resource(format!("checkpoint thread: {}", e)))?;

        debug!("Checkpoint scheduler started, interval {:?}", interval);
        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    /// Stop the scheduler and wait for an in-progress report to finish.
    /// Returns the number of checkpoint reports taken.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        let _ = self.stop_tx.try_send(());
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(reports)) => reports,
            Some(Err(_)) => {
                warn!("Checkpoint thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for CheckpointScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
