//! # Diagnostics Logging
//!
//! Internal diagnostics of the statistics core (handler registration,
//! sink failures, checkpoint scheduling) are emitted through `tracing`.
//! They are separate from the benchmark's own text output, which goes
//! through the text sink.
//!
//! [`init_diagnostics`] installs a subscriber that writes one line per
//! event, prefixed with the same severity labels the text sink uses and
//! colored by level when writing to a terminal. The filter defaults to a
//! level derived from the configured verbosity and can be overridden with
//! `RUST_LOG`.

use crate::error::{Result, StatsError};
use colored::*;
use std::fmt;
use std::path::Path;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Event formatter producing `PREFIX: message` lines.
///
/// The prefix mirrors the text sink: errors are reported as `FATAL`,
/// warnings as `WARNING`, debug and trace as `DEBUG`; info events are
/// unprefixed.
pub struct DiagnosticFormatter {
    color: bool,
}

impl DiagnosticFormatter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

fn level_prefix(level: Level) -> &'static str {
    match level {
        Level::ERROR => "FATAL: ",
        Level::WARN => "WARNING: ",
        Level::INFO => "",
        Level::DEBUG | Level::TRACE => "DEBUG: ",
    }
}

impl<S, N> FormatEvent<S, N> for DiagnosticFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        // Fields are buffered so the whole line can be colored at once.
        let level = *event.metadata().level();
        let mut buffer = String::from(level_prefix(level));
        let mut buf_writer = Writer::new(&mut buffer);
        ctx.format_fields(buf_writer.by_ref(), event)?;

        if !self.color {
            return writeln!(writer, "{}", buffer);
        }

        let colored_output = match level {
            Level::INFO => buffer.white(),
            Level::WARN => buffer.yellow(),
            Level::ERROR => buffer.red(),
            Level::DEBUG => buffer.blue(),
            Level::TRACE => buffer.purple(),
        };
        writeln!(writer, "{}", colored_output)
    }
}

/// Default diagnostics filter for a text verbosity level.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 | 1 => "error",
        2 | 3 => "warn",
        4 => "info",
        _ => "debug",
    }
}

/// Install the global diagnostics subscriber.
///
/// With `log_file` set, diagnostics go through a non-blocking file writer;
/// keep the returned guard alive until exit so buffered lines are flushed.
/// Otherwise they go to standard error.
pub fn init_diagnostics(
    verbosity: u8,
    color: bool,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let (writer, guard, color) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path.file_name().ok_or_else(|| {
                StatsError::Config(format!("invalid log file path: {}", path.display()))
            })?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(name.to_string_lossy().into_owned())
                .build(dir.unwrap_or(Path::new(".")))
                .map_err(|e| {
                    StatsError::Config(format!("cannot open log file {}: {}", path.display(), e))
                })?;
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), None, color),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .event_format(DiagnosticFormatter::new(color))
        .try_init()
        .map_err(|e| StatsError::Config(format!("diagnostics already initialized: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::SharedBuffer;
    use tracing::subscriber::with_default;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(0), "error");
        assert_eq!(default_directive(3), "warn");
        assert_eq!(default_directive(4), "info");
        assert_eq!(default_directive(5), "debug");
    }

    #[test]
    fn test_formatter_prefixes() {
        let buffer = SharedBuffer::new();
        let sink = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_writer(move || sink.clone())
            .event_format(DiagnosticFormatter::new(false))
            .finish();

        with_default(subscriber, || {
            tracing::error!("cannot open report");
            tracing::warn!("handler failed");
            tracing::info!("started");
            tracing::debug!("details");
        });

        assert_eq!(
            buffer.lines(),
            vec![
                "FATAL: cannot open report",
                "WARNING: handler failed",
                "started",
                "DEBUG: details"
            ]
        );
    }
}
