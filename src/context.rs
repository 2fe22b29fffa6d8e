//! # Logging Context
//!
//! [`LoggingContext`] owns the handler registry, the shared operation
//! statistics and the run-wide flags. It is the single entry point workers,
//! the checkpoint scheduler and the driver program talk to.
//!
//! ## Lifecycle
//!
//! ```text
//! new / with_targets ──► register_handler* ──► init ──► Arc::new
//!                                                         │
//!            workers: event_start / event_stop ◄──────────┤
//!            scheduler: report_checkpoint ◄───────────────┤
//!            anyone: emit_* / begin_section / end_section ◄┤
//!                                                         ▼
//!                                                        done
//! ```
//!
//! Registration and initialization take `&mut self` and therefore happen
//! before the context is shared. Everything after `init` takes `&self`.
//!
//! ## Final Report
//!
//! `done` emits the final statistics exactly once, before any sink is torn
//! down, so structured reports enclose them inside their root element.

use crate::config::StatsConfig;
use crate::error::{Result, StatsError};
use crate::handler::{Handler, OptionSpec};
use crate::message::{Message, MessageKind, OperAction, Priority};
use crate::registry::HandlerRegistry;
use crate::report::GlobalStats;
use crate::sinks::{JsonSink, OperationSink, OutputTarget, TextSink, XmlSink};
use crate::stats::{OperationStats, WorkerId};
use crate::timer::Timer;
use parking_lot::Mutex;
use std::fmt::{self, Display};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Output targets of the built-in sinks.
#[derive(Debug, Clone)]
pub struct SinkTargets {
    pub stdout: OutputTarget,
    pub stderr: OutputTarget,
    pub xml: OutputTarget,
    pub json: OutputTarget,
}

impl SinkTargets {
    /// Standard streams for text, configured files for XML and JSON.
    pub fn from_config(config: &StatsConfig) -> Self {
        Self {
            stdout: OutputTarget::Stdout,
            stderr: OutputTarget::Stderr,
            xml: OutputTarget::from_option(config.xml_file.as_deref()),
            json: OutputTarget::from_option(config.json_file.as_deref()),
        }
    }
}

/// Value of one option in a configuration dump.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Flag(bool),
    Int(i64),
    Size(u64),
    Float(f64),
    Str(String),
    /// Rendered as a nested section with one entry per element.
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub name: String,
    pub value: OptionValue,
}

impl ConfigEntry {
    pub fn new(name: impl Into<String>, value: OptionValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

pub struct LoggingContext {
    registry: HandlerRegistry,
    config: StatsConfig,
    stats: Arc<OperationStats>,
    initialized: AtomicBool,
    finished: AtomicBool,
    forced_shutdown: AtomicBool,
    report_lock: Mutex<()>,
    last_report: Mutex<Option<GlobalStats>>,
}

impl LoggingContext {
    /// Context with the built-in sinks writing where `config` says.
    pub fn new(config: StatsConfig) -> Result<Self> {
        let targets = SinkTargets::from_config(&config);
        Self::with_targets(config, targets)
    }

    /// Context with the built-in sinks writing to `targets`.
    pub fn with_targets(config: StatsConfig, targets: SinkTargets) -> Result<Self> {
        let mut ctx = Self::empty(config)?;

        let text = TextSink::with_targets(ctx.config.verbosity, targets.stdout, targets.stderr)
            .colored(ctx.config.color);
        let xml = XmlSink::new(targets.xml);
        let json = JsonSink::with_style(targets.json, ctx.config.json_style);
        let oper = OperationSink::new(ctx.stats.clone(), ctx.config.percentile);

        ctx.register_handler(MessageKind::Text, Arc::new(text));
        ctx.register_handler(MessageKind::Structured, Arc::new(xml));
        ctx.register_handler(MessageKind::Structured, Arc::new(json));
        ctx.register_handler(MessageKind::Operation, Arc::new(oper));
        Ok(ctx)
    }

    /// Context without any handlers registered.
    pub fn empty(config: StatsConfig) -> Result<Self> {
        let stats = OperationStats::new(config.threads, config.checkpointing())?;

        Ok(Self {
            registry: HandlerRegistry::new(),
            config,
            stats: Arc::new(stats),
            initialized: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            forced_shutdown: AtomicBool::new(false),
            report_lock: Mutex::new(()),
            last_report: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<OperationStats> {
        &self.stats
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn register_handler(&mut self, kind: MessageKind, handler: Arc<dyn Handler>) {
        self.registry.register(kind, handler);
    }

    /// Register against a raw kind number (1 = text, 2 = structured,
    /// 3 = operation).
    pub fn register_raw(&mut self, kind: u8, handler: Arc<dyn Handler>) -> Result<()> {
        self.registry.register_raw(kind, handler)
    }

    pub fn unregister_handler(&mut self, kind: MessageKind, handler: &Arc<dyn Handler>) -> usize {
        self.registry.unregister(kind, handler)
    }

    /// Options of every registered handler, for help output.
    pub fn option_specs(&self) -> Vec<OptionSpec> {
        self.registry.option_specs()
    }

    /// Initialize every handler and start the execution clock.
    ///
    /// On failure the error is also reported as a fatal text message
    /// through whatever text handlers survived.
    pub fn init(&mut self) -> Result<()> {
        let result = self.registry.init_all();
        self.initialized.store(true, Ordering::SeqCst);

        if let Err(e) = result {
            error!("Handler initialization failed: {}", e);
            let line = e.to_string();
            if self.registry.handlers(MessageKind::Text).is_empty() {
                eprintln!("{}{}", Priority::Fatal.prefix(), line);
            } else {
                let _ = self.emit_text(Priority::Fatal, &line);
            }
            return Err(e);
        }

        self.stats.start_clock();
        info!(
            "Statistics initialized for {} threads (checkpointing: {})",
            self.config.threads,
            self.stats.is_checkpointing()
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn dispatch(&self, msg: &Message<'_>) -> Result<()> {
        self.registry.dispatch(msg)
    }

    /// Emit a line of text. Before `init` the line goes straight to
    /// standard output.
    pub fn emit_text(&self, priority: Priority, text: &str) -> Result<()> {
        self.emit_line(priority, text, false)
    }

    fn emit_line(&self, priority: Priority, text: &str, allow_duplicates: bool) -> Result<()> {
        if !self.is_initialized() {
            println!("{}", text);
            return Ok(());
        }
        self.dispatch(&Message::Text {
            priority,
            text,
            allow_duplicates,
        })
    }

    /// Emit a line prefixed with the time accumulated by `timer`, e.g.
    /// `[  10s] text`. A running timer counts its operation in flight.
    ///
    /// The elapsed time is also emitted as a structured `time` value, and
    /// the line bypasses duplicate suppression.
    pub fn emit_timestamped_text(
        &self,
        priority: Priority,
        timer: &Timer,
        text: &str,
    ) -> Result<()> {
        let elapsed = timer.current();
        let time = match self.try_emit_structured(
            priority,
            "time",
            format_args!("{:4.0}", elapsed.as_secs_f64()),
        ) {
            Ok(time) => time,
            Err((time, e)) => {
                debug!("timestamp value not delivered: {}", e);
                time
            }
        };
        self.emit_line(priority, &format!("[{}s] {}", time, text), true)
    }

    /// Emit `text` followed by the details of the last OS error.
    pub fn emit_system_error(&self, priority: Priority, text: &str) -> Result<()> {
        self.emit_io_error(priority, text, &io::Error::last_os_error())
    }

    /// Emit `text` followed by ` errno = N (description)` for `err`.
    pub fn emit_io_error(&self, priority: Priority, text: &str, err: &io::Error) -> Result<()> {
        let code = err.raw_os_error().unwrap_or(0);
        let full = err.to_string();
        let suffix = format!(" (os error {})", code);
        let description = full.strip_suffix(&suffix).unwrap_or(&full);

        self.emit_text(
            priority,
            &format!("{} errno = {} ({})", text, code, description),
        )
    }

    /// Format `value`, deliver it to the structured sinks under `tag` and
    /// return the rendered string for use in text output.
    ///
    /// Sink failures are logged by the registry and do not prevent the
    /// value from being returned.
    pub fn emit_structured(&self, priority: Priority, tag: &str, value: impl Display) -> String {
        match self.try_emit_structured(priority, tag, format_args!("{}", value)) {
            Ok(rendered) | Err((rendered, _)) => rendered,
        }
    }

    pub(crate) fn try_emit_structured(
        &self,
        priority: Priority,
        tag: &str,
        value: fmt::Arguments<'_>,
    ) -> std::result::Result<String, (String, StatsError)> {
        let rendered = value.to_string();
        if !self.is_initialized() {
            return Ok(rendered);
        }
        match self.dispatch(&Message::Structured {
            tag,
            value: &rendered,
            priority,
        }) {
            Ok(()) => Ok(rendered),
            Err(e) => Err((rendered, e)),
        }
    }

    pub fn begin_section(&self, name: &str) {
        if self.is_initialized() {
            self.registry.begin_section(name);
        }
    }

    pub fn end_section(&self, name: &str) {
        if self.is_initialized() {
            self.registry.end_section(name);
        }
    }

    /// Dump option values as a `configuration` section.
    pub fn emit_config(&self, entries: &[ConfigEntry]) {
        self.begin_section("configuration");
        for entry in entries {
            match &entry.value {
                OptionValue::Flag(on) => {
                    self.emit_structured(Priority::Notice, &entry.name, u8::from(*on));
                }
                OptionValue::Int(v) => {
                    self.emit_structured(Priority::Notice, &entry.name, v);
                }
                OptionValue::Size(v) => {
                    self.emit_structured(Priority::Notice, &entry.name, v);
                }
                OptionValue::Float(v) => {
                    self.emit_structured(Priority::Notice, &entry.name, format_args!("{:.6}", v));
                }
                OptionValue::Str(v) => {
                    self.emit_structured(Priority::Notice, &entry.name, v);
                }
                OptionValue::List(items) => {
                    self.begin_section(&entry.name);
                    for item in items {
                        self.emit_structured(Priority::Notice, item, item);
                    }
                    self.end_section(&entry.name);
                }
            }
        }
        self.end_section("configuration");
    }

    /// Worker `thread_id` begins an operation.
    pub fn event_start(&self, thread_id: WorkerId) -> Result<()> {
        self.dispatch(&Message::Operation {
            thread_id,
            action: OperAction::Start,
        })
    }

    /// Worker `thread_id` finished its operation.
    pub fn event_stop(&self, thread_id: WorkerId) -> Result<()> {
        self.dispatch(&Message::Operation {
            thread_id,
            action: OperAction::Stop,
        })
    }

    /// Mark the run as being torn down forcibly. Subsequent reports count
    /// operations still in flight as unfinished.
    pub fn request_forced_shutdown(&self) {
        if !self.forced_shutdown.swap(true, Ordering::SeqCst) {
            info!("Forced shutdown requested");
        }
    }

    pub fn is_forced_shutdown(&self) -> bool {
        self.forced_shutdown.load(Ordering::SeqCst)
    }

    /// Report statistics for the period since the previous report.
    pub fn report(&self) -> Result<GlobalStats> {
        let _reporter = self.report_lock.lock();

        let rank = self.config.percentile_rank();
        let snapshot = self.stats.snapshot(rank);
        let stats =
            GlobalStats::from_snapshot(snapshot, rank, self.is_forced_shutdown(), Instant::now());

        let emitted = stats.emit(self, self.config.per_thread_stats);
        *self.last_report.lock() = Some(stats.clone());
        emitted.map(|()| stats)
    }

    /// Statistics of the most recent report, checkpoint or final.
    pub fn last_report(&self) -> Option<GlobalStats> {
        self.last_report.lock().clone()
    }

    /// Mid-run report, announced with a timestamped header line.
    pub fn report_checkpoint(&self) -> Result<GlobalStats> {
        let clock = self.stats.clock();
        let header = self.emit_timestamped_text(Priority::Notice, &clock, "Checkpoint report:");
        let stats = self.report()?;
        header.map(|()| stats)
    }

    /// Emit the final report and tear down every handler.
    ///
    /// Only the first call does anything. All handlers are torn down even
    /// when the report or an earlier handler fails; the first failure is
    /// returned.
    pub fn done(&self) -> Result<()> {
        if !self.is_initialized() || self.finished.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let report = self.report().map(|_| ());
        let teardown = self.registry.done_all();
        self.initialized.store(false, Ordering::SeqCst);
        debug!("All handlers torn down");

        report.and(teardown)
    }
}

impl fmt::Debug for LoggingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingContext")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .field("forced_shutdown", &self.is_forced_shutdown())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::SharedBuffer;

    struct Captured {
        out: SharedBuffer,
        err: SharedBuffer,
        xml: SharedBuffer,
    }

    fn context(threads: usize, verbosity: i64) -> (LoggingContext, Captured) {
        let captured = Captured {
            out: SharedBuffer::new(),
            err: SharedBuffer::new(),
            xml: SharedBuffer::new(),
        };
        let targets = SinkTargets {
            stdout: OutputTarget::Buffer(captured.out.clone()),
            stderr: OutputTarget::Buffer(captured.err.clone()),
            xml: OutputTarget::Buffer(captured.xml.clone()),
            json: OutputTarget::Disabled,
        };
        let config = StatsConfig {
            threads,
            verbosity,
            ..StatsConfig::default()
        };
        let mut ctx = LoggingContext::with_targets(config, targets).unwrap();
        ctx.init().unwrap();
        (ctx, captured)
    }

    #[test]
    fn test_disabled_json_sink_is_deselected() {
        let (ctx, _) = context(1, 3);
        assert_eq!(ctx.registry().handlers(MessageKind::Structured).len(), 1);
        assert_eq!(ctx.registry().handlers(MessageKind::Structured)[0].name(), "xml");
    }

    #[test]
    fn test_event_start_stop_reach_stats() {
        let (ctx, _) = context(2, 3);
        ctx.event_start(1).unwrap();
        ctx.event_stop(1).unwrap();

        assert_eq!(ctx.stats().timer(1).unwrap().events(), 1);
        assert!(matches!(
            ctx.event_start(2),
            Err(StatsError::InvalidThread { .. })
        ));
    }

    #[test]
    fn test_structured_value_is_returned_and_delivered() {
        let (ctx, captured) = context(1, 3);
        ctx.begin_section("stats");
        let rendered = ctx.emit_structured(Priority::Notice, "latency", format_args!("{:.1}", 12.5));
        ctx.end_section("stats");

        assert_eq!(rendered, "12.5");
        assert!(captured
            .xml
            .contents()
            .contains("    <stats>\n        <latency>12.5</latency>\n    </stats>\n"));
    }

    #[test]
    fn test_timestamped_text_allows_duplicates() {
        let (ctx, captured) = context(1, 3);
        let clock = ctx.stats().clock();
        ctx.emit_timestamped_text(Priority::Notice, &clock, "tick").unwrap();
        ctx.emit_timestamped_text(Priority::Notice, &clock, "tick").unwrap();

        let lines = captured.out.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.starts_with("[") && l.ends_with("s] tick")));
        assert!(captured.xml.contents().contains("<time>"));
    }

    #[test]
    fn test_timestamp_uses_caller_timer() {
        let (ctx, captured) = context(1, 3);
        let mut timer = Timer::new();
        let started = Instant::now() - std::time::Duration::from_secs(5);
        timer.start_at(started);

        ctx.emit_timestamped_text(Priority::Notice, &timer, "warmup done")
            .unwrap();

        assert_eq!(captured.out.lines(), vec!["[   5s] warmup done"]);
        assert!(captured.xml.contents().contains("<time>   5</time>"));

        timer.stop_at(started + std::time::Duration::from_secs(12)).unwrap();
        ctx.emit_timestamped_text(Priority::Notice, &timer, "warmup done")
            .unwrap();
        assert_eq!(captured.out.lines()[1], "[  12s] warmup done");
    }

    #[test]
    fn test_io_error_suffix() {
        let (ctx, captured) = context(1, 3);
        let err = io::Error::from_raw_os_error(2);
        ctx.emit_io_error(Priority::Alert, "Failed to open file", &err)
            .unwrap();

        let line = captured.err.contents();
        assert!(line.starts_with("ALERT: Failed to open file errno = 2 ("));
        assert!(!line.contains("os error"));
    }

    #[test]
    fn test_config_dump() {
        let (ctx, captured) = context(1, 3);
        ctx.emit_config(&[
            ConfigEntry::new("threads", OptionValue::Int(4)),
            ConfigEntry::new("debug", OptionValue::Flag(true)),
            ConfigEntry::new("rate", OptionValue::Float(0.5)),
            ConfigEntry::new("tests", OptionValue::List(vec!["oltp".into()])),
        ]);

        let xml = captured.xml.contents();
        assert!(xml.contains("    <configuration>\n"));
        assert!(xml.contains("        <threads>4</threads>\n"));
        assert!(xml.contains("        <debug>1</debug>\n"));
        assert!(xml.contains("        <rate>0.500000</rate>\n"));
        assert!(xml.contains("        <tests>\n            <oltp>oltp</oltp>\n        </tests>\n"));
    }

    #[test]
    fn test_done_emits_final_report_once() {
        let (ctx, captured) = context(1, 3);
        ctx.event_start(0).unwrap();
        ctx.event_stop(0).unwrap();

        ctx.done().unwrap();
        ctx.done().unwrap();

        let out = captured.out.contents();
        assert_eq!(out.matches("General statistics:").count(), 1);
        assert!(out.contains("    total number of events:              1\n"));

        let xml = captured.xml.contents();
        assert!(xml.ends_with("    </general_statistics>\n</sysbench>\n"));
        assert!(!ctx.is_initialized());
    }

    #[test]
    fn test_pre_init_text_is_not_dispatched() {
        let out = SharedBuffer::new();
        let targets = SinkTargets {
            stdout: OutputTarget::Buffer(out.clone()),
            stderr: OutputTarget::Disabled,
            xml: OutputTarget::Disabled,
            json: OutputTarget::Disabled,
        };
        let config = StatsConfig {
            threads: 1,
            ..StatsConfig::default()
        };
        let ctx = LoggingContext::with_targets(config, targets).unwrap();

        ctx.emit_text(Priority::Notice, "early").unwrap();
        assert!(out.contents().is_empty());
        assert!(ctx.done().is_ok());
    }

    #[test]
    fn test_init_failure_reported_as_fatal() {
        let err = SharedBuffer::new();
        let targets = SinkTargets {
            stdout: OutputTarget::Disabled,
            stderr: OutputTarget::Buffer(err.clone()),
            xml: OutputTarget::Disabled,
            json: OutputTarget::Disabled,
        };
        let config = StatsConfig {
            threads: 1,
            percentile: 0,
            ..StatsConfig::default()
        };
        let mut ctx = LoggingContext::with_targets(config, targets).unwrap();

        assert!(matches!(ctx.init(), Err(StatsError::Config(_))));
        assert!(err
            .contents()
            .starts_with("FATAL: invalid configuration: Invalid value for percentile option: 0"));
        assert!(ctx.registry().handlers(MessageKind::Operation).is_empty());
    }
}
