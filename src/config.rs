//! # Configuration
//!
//! [`StatsConfig`] carries every setting the statistics core reads. It can be
//! built directly, deserialized, or read by option name from any
//! [`OptionStore`], which is how the command-line front end and embedding
//! programs hand their options over without the core knowing how they were
//! parsed.
//!
//! ## Option Names
//!
//! | name | type | default |
//! |---|---|---|
//! | `threads` | int | number of CPUs |
//! | `verbosity` | int, 0..=5 | 3 |
//! | `percentile` | int, 1..=100 | 95 |
//! | `xml-file` | string, `-` = stdout | disabled |
//! | `json-file` | string, `-` = stdout | disabled |
//! | `report-checkpoint-interval` | int, seconds, 0 = off | 0 |
//! | `debug` | flag | off |
//! | `json-legacy` | flag | off |
//! | `color` | flag | off |

use crate::defaults;
use crate::error::{Result, StatsError};
use crate::sinks::JsonStyle;
use crate::utils::{validate_percentile_rank, validate_threads, validate_verbosity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Read access to options by name.
///
/// Lookups return `None` for options that were never set; callers fall
/// back to their documented default.
pub trait OptionStore {
    fn get_int(&self, name: &str) -> Option<i64>;
    fn get_string(&self, name: &str) -> Option<String>;
    fn get_flag(&self, name: &str) -> Option<bool>;
}

/// In-memory option store, mostly for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    values: HashMap<String, String>,
}

impl MapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: impl ToString) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

impl OptionStore for MapOptions {
    fn get_int(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(|v| v.trim().parse().ok())
    }

    fn get_string(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn get_flag(&self, name: &str) -> Option<bool> {
        self.values
            .get(name)
            .map(|v| matches!(v.trim(), "on" | "true" | "1" | "yes"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Number of worker threads, one timer slot each.
    pub threads: usize,

    /// Text sink verbosity, 0 (fatal only) to 5 (debug).
    pub verbosity: i64,

    /// Rank reported as the approximate latency percentile.
    pub percentile: i64,

    /// XML report target; `None` disables the XML sink.
    pub xml_file: Option<String>,

    /// JSON report target; `None` disables the JSON sink.
    pub json_file: Option<String>,

    /// Seconds between checkpoint reports; 0 disables checkpoints.
    pub checkpoint_interval: u64,

    /// Include per-thread statistics in every report.
    pub per_thread_stats: bool,

    pub json_style: JsonStyle,

    /// Color severity prefixes in text output.
    pub color: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            threads: crate::utils::get_cpu_cores(),
            verbosity: i64::from(defaults::VERBOSITY),
            percentile: i64::from(defaults::PERCENTILE_RANK),
            xml_file: None,
            json_file: None,
            checkpoint_interval: 0,
            per_thread_stats: false,
            json_style: JsonStyle::Strict,
            color: false,
        }
    }
}

impl StatsConfig {
    /// Read every option by name, falling back to defaults for unset ones.
    pub fn from_options(store: &dyn OptionStore) -> Result<Self> {
        let base = Self::default();

        let threads = match store.get_int("threads") {
            Some(t) => validate_threads(t)?,
            None => base.threads,
        };
        let checkpoint_interval = match store.get_int("report-checkpoint-interval") {
            Some(secs) => u64::try_from(secs).map_err(|_| {
                StatsError::Config(format!(
                    "Invalid value for report-checkpoint-interval: {}",
                    secs
                ))
            })?,
            None => 0,
        };
        let json_style = if store.get_flag("json-legacy").unwrap_or(false) {
            JsonStyle::Legacy
        } else {
            JsonStyle::Strict
        };

        let config = Self {
            threads,
            verbosity: store.get_int("verbosity").unwrap_or(base.verbosity),
            percentile: store.get_int("percentile").unwrap_or(base.percentile),
            xml_file: store.get_string("xml-file").filter(|s| !s.is_empty()),
            json_file: store.get_string("json-file").filter(|s| !s.is_empty()),
            checkpoint_interval,
            per_thread_stats: store.get_flag("debug").unwrap_or(false),
            json_style,
            color: store.get_flag("color").unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    /// Range-check the numeric settings.
    pub fn validate(&self) -> Result<()> {
        validate_threads(i64::try_from(self.threads).unwrap_or(i64::MAX))?;
        validate_verbosity(self.verbosity)?;
        validate_percentile_rank(self.percentile)?;
        Ok(())
    }

    pub fn checkpointing(&self) -> bool {
        self.checkpoint_interval > 0
    }

    pub fn checkpoint_period(&self) -> Option<Duration> {
        self.checkpointing()
            .then(|| Duration::from_secs(self.checkpoint_interval))
    }

    /// Validated percentile rank.
    pub fn percentile_rank(&self) -> u32 {
        validate_percentile_rank(self.percentile).unwrap_or(defaults::PERCENTILE_RANK)
    }
}
