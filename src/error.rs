//! Error taxonomy for the statistics core.
//!
//! Library code returns [`StatsError`]; the binary wraps it in
//! `anyhow::Error` at the edges. A sink withdrawing itself because its
//! option was not supplied is not an error and is reported through
//! [`crate::handler::InitStatus::Deselected`] instead.

use std::io;
use thiserror::Error;

/// Errors raised while configuring, running or tearing down the logger.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Invalid configuration value (verbosity, percentile, estimator range, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A sink could not open, write, flush or close its output target.
    #[error("I/O error on {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Per-thread storage could not be allocated.
    #[error("resource allocation failure: {0}")]
    Resource(String),

    /// A raw message kind outside the valid range.
    #[error("invalid message kind: {0}")]
    InvalidKind(u8),

    /// An operation event referenced a worker slot that does not exist.
    #[error("invalid worker id {id} (configured threads: {threads})")]
    InvalidThread { id: usize, threads: usize },

    /// `stop` was called on a timer that is not running.
    #[error("timer is not running")]
    TimerNotRunning,

    /// Section begin/end calls on a structured sink did not nest.
    #[error("unbalanced section in {sink} output: {detail}")]
    UnbalancedSection { sink: &'static str, detail: String },
}

impl StatsError {
    /// Build an [`StatsError::Io`] for the given target description.
    pub fn io(target: impl Into<String>, source: io::Error) -> Self {
        StatsError::Io {
            target: target.into(),
            source,
        }
    }

    /// Whether this error aborts process startup when raised by `init`.
    ///
    /// Errors tied to a single event or section only withdraw the handler
    /// that raised them.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            StatsError::TimerNotRunning
                | StatsError::InvalidThread { .. }
                | StatsError::UnbalancedSection { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StatsError>;
