use crate::config::OptionStore;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Bench Stats - latency statistics for a multi-threaded synthetic workload
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Number of worker threads
    #[clap(short = 't', long, default_value_t = crate::utils::get_cpu_cores(), help_heading = "Core Options")]
    pub threads: usize,

    /// How long the workload runs
    #[clap(short = 'd', long, value_parser = parse_duration, default_value = "10s", help_heading = "Core Options")]
    pub time: Duration,

    /// Stop after this many events in total (0 = limited by time only)
    #[clap(short = 'e', long, default_value_t = 0, help_heading = "Core Options")]
    pub events: u64,

    /// Base duration of one synthetic operation
    #[clap(long, value_parser = parse_duration, default_value = "1ms", help_heading = "Workload")]
    pub op_time: Duration,

    /// Random extra time added to each operation, up to this much
    #[clap(long, value_parser = parse_duration, default_value = "0ms", help_heading = "Workload")]
    pub op_jitter: Duration,

    /// Verbosity level {5 - debug, 0 - only critical messages}
    #[clap(short = 'v', long, default_value_t = crate::defaults::VERBOSITY as i64, help_heading = "Reporting")]
    pub verbosity: i64,

    /// Percentile rank of operation latencies to report
    #[clap(short = 'p', long, default_value_t = crate::defaults::PERCENTILE_RANK as i64, help_heading = "Reporting")]
    pub percentile: i64,

    /// XML report file ("-" for standard output)
    #[clap(long, help_heading = "Reporting")]
    pub xml_file: Option<String>,

    /// JSON report file ("-" for standard output)
    #[clap(long, help_heading = "Reporting")]
    pub json_file: Option<String>,

    /// Write the historical, non-strict JSON layout
    #[clap(long, default_value_t = false, help_heading = "Reporting")]
    pub json_legacy: bool,

    /// Seconds between intermediate reports (0 = off)
    #[clap(long, default_value_t = 0, help_heading = "Reporting")]
    pub report_checkpoint_interval: u64,

    /// Include per-thread statistics in reports
    #[clap(long, default_value_t = false, help_heading = "Reporting")]
    pub debug: bool,

    /// Write the final statistics as JSON to this file
    #[clap(long, help_heading = "Reporting")]
    pub stats_json: Option<PathBuf>,

    /// After the run time elapses, wait this long for workers to finish
    /// before reporting with operations still in flight
    #[clap(long, value_parser = parse_duration, help_heading = "Core Options")]
    pub forced_shutdown: Option<Duration>,

    /// Color severity prefixes
    #[clap(long, default_value_t = false)]
    pub color: bool,

    /// Write internal diagnostics to this file instead of standard error
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// List the options consumed by the report sinks and exit
    #[clap(long, default_value_t = false)]
    pub list_options: bool,
}

impl OptionStore for Args {
    fn get_int(&self, name: &str) -> Option<i64> {
        match name {
            "threads" => i64::try_from(self.threads).ok(),
            "verbosity" => Some(self.verbosity),
            "percentile" => Some(self.percentile),
            "report-checkpoint-interval" => i64::try_from(self.report_checkpoint_interval).ok(),
            _ => None,
        }
    }

    fn get_string(&self, name: &str) -> Option<String> {
        match name {
            "xml-file" => self.xml_file.clone(),
            "json-file" => self.json_file.clone(),
            _ => None,
        }
    }

    fn get_flag(&self, name: &str) -> Option<bool> {
        match name {
            "debug" => Some(self.debug),
            "json-legacy" => Some(self.json_legacy),
            "color" => Some(self.color),
            _ => None,
        }
    }
}

/// Parse duration from string (e.g., "10s", "5m", "1h", "250ms", "50us")
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix("us") {
        (stripped, "us")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s") // Default to seconds
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    let unit_nanos = match unit {
        "us" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3600e9,
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    let nanos = (num * unit_nanos).round();
    if !(0.0..=u64::MAX as f64).contains(&nanos) {
        return Err(format!("Duration out of range: {}", s));
    }
    Ok(Duration::from_nanos(nanos as u64))
}
