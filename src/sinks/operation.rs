//! Operation sink: turns start/stop events into timer and percentile data.

use crate::error::Result;
use crate::handler::{Handler, InitStatus, OptionSpec};
use crate::message::{Message, OperAction};
use crate::stats::OperationStats;
use crate::utils::validate_percentile_rank;
use std::sync::Arc;

const OPTIONS: &[OptionSpec] = &[OptionSpec {
    name: "percentile",
    description: "percentile rank of query response times to count",
    default: "95",
}];

pub struct OperationSink {
    stats: Arc<OperationStats>,
    percentile_rank: i64,
}

impl OperationSink {
    pub fn new(stats: Arc<OperationStats>, percentile_rank: i64) -> Self {
        Self {
            stats,
            percentile_rank,
        }
    }

    pub fn stats(&self) -> &Arc<OperationStats> {
        &self.stats
    }
}

impl Handler for OperationSink {
    fn name(&self) -> &'static str {
        "operation"
    }

    fn options(&self) -> &'static [OptionSpec] {
        OPTIONS
    }

    fn init(&self) -> Result<InitStatus> {
        validate_percentile_rank(self.percentile_rank)?;
        Ok(InitStatus::Ready)
    }

    fn process(&self, msg: &Message<'_>) -> Result<()> {
        let Message::Operation { thread_id, action } = *msg else {
            return Ok(());
        };
        match action {
            OperAction::Start => self.stats.start(thread_id),
            OperAction::Stop => self.stats.stop(thread_id).map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatsError;

    fn oper(thread_id: usize, action: OperAction) -> Message<'static> {
        Message::Operation { thread_id, action }
    }

    #[test]
    fn test_start_stop_updates_stats() {
        let stats = Arc::new(OperationStats::new(2, false).unwrap());
        let sink = OperationSink::new(stats.clone(), 95);
        sink.init().unwrap();

        sink.process(&oper(1, OperAction::Start)).unwrap();
        sink.process(&oper(1, OperAction::Stop)).unwrap();

        assert_eq!(stats.timer(1).unwrap().events(), 1);
        assert_eq!(stats.timer(0).unwrap().events(), 0);
        assert_eq!(stats.estimator().count(), 1);
    }

    #[test]
    fn test_invalid_percentile_rank() {
        let stats = Arc::new(OperationStats::new(1, false).unwrap());
        for rank in [0, 101, -5] {
            let sink = OperationSink::new(stats.clone(), rank);
            assert!(matches!(sink.init(), Err(StatsError::Config(_))));
        }
        assert!(OperationSink::new(stats, 100).init().is_ok());
    }

    #[test]
    fn test_unknown_worker_rejected() {
        let stats = Arc::new(OperationStats::new(1, false).unwrap());
        let sink = OperationSink::new(stats, 95);

        let err = sink.process(&oper(3, OperAction::Start)).unwrap_err();
        assert!(matches!(err, StatsError::InvalidThread { id: 3, threads: 1 }));
    }
}
