//! Console text sink.
//!
//! Messages above the configured verbosity are dropped. A line identical to
//! the previous one is counted instead of printed, and the count is
//! reported as `(last message repeated N times)` before the next distinct
//! line or at teardown. Fatal, alert, warning and debug messages go to the
//! error stream with a severity prefix; everything else goes to standard
//! output unprefixed.

use super::OutputTarget;
use crate::error::{Result, StatsError};
use crate::handler::{Handler, InitStatus, OptionSpec};
use crate::message::{Message, Priority};
use colored::{ColoredString, Colorize};
use parking_lot::Mutex;
use std::io::Write;

const OPTIONS: &[OptionSpec] = &[OptionSpec {
    name: "verbosity",
    description: "verbosity level {5 - debug, 0 - only critical messages}",
    default: "3",
}];

struct TextState {
    out: Option<Box<dyn Write + Send>>,
    err: Option<Box<dyn Write + Send>>,
    /// Verbosity validated at init; nothing is visible before that.
    level: u8,
    last_line: String,
    repeats: u32,
}

pub struct TextSink {
    verbosity: i64,
    color: bool,
    stdout_target: OutputTarget,
    stderr_target: OutputTarget,
    state: Mutex<TextState>,
}

impl TextSink {
    /// Text sink writing to the process's standard streams.
    pub fn new(verbosity: i64) -> Self {
        Self::with_targets(verbosity, OutputTarget::Stdout, OutputTarget::Stderr)
    }

    pub fn with_targets(verbosity: i64, stdout: OutputTarget, stderr: OutputTarget) -> Self {
        Self {
            verbosity,
            color: false,
            stdout_target: stdout,
            stderr_target: stderr,
            state: Mutex::new(TextState {
                out: None,
                err: None,
                level: 0,
                last_line: String::new(),
                repeats: 0,
            }),
        }
    }

    /// Color severity prefixes on the error stream.
    pub fn colored(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn verbosity(&self) -> i64 {
        self.verbosity
    }

    fn styled_prefix(&self, priority: Priority) -> ColoredString {
        let prefix = priority.prefix();
        if !self.color {
            return prefix.normal();
        }
        match priority {
            Priority::Fatal | Priority::Alert => prefix.red().bold(),
            Priority::Warning => prefix.yellow(),
            Priority::Debug => prefix.blue(),
            Priority::Notice | Priority::Info => prefix.normal(),
        }
    }
}

impl TextState {
    fn flush_repeats(&mut self) -> std::io::Result<()> {
        if self.repeats > 0 {
            if let Some(out) = self.out.as_mut() {
                writeln!(out, "(last message repeated {} times)", self.repeats)?;
            }
        }
        self.repeats = 0;
        Ok(())
    }
}

impl Handler for TextSink {
    fn name(&self) -> &'static str {
        "text"
    }

    fn options(&self) -> &'static [OptionSpec] {
        OPTIONS
    }

    fn init(&self) -> Result<InitStatus> {
        let level = crate::utils::validate_verbosity(self.verbosity)?;

        let mut state = self.state.lock();
        state.level = level;
        state.out = self.stdout_target.open()?;
        state.err = self.stderr_target.open()?;
        state.last_line.clear();
        state.repeats = 0;
        Ok(InitStatus::Ready)
    }

    fn process(&self, msg: &Message<'_>) -> Result<()> {
        let Message::Text {
            priority,
            text,
            allow_duplicates,
        } = *msg
        else {
            return Ok(());
        };

        let mut state = self.state.lock();
        if !priority.is_visible_at(state.level) {
            return Ok(());
        }
        let io_err = |e| StatsError::io("text output", e);

        if !allow_duplicates {
            if state.last_line == text {
                state.repeats += 1;
                return Ok(());
            }
            state.flush_repeats().map_err(io_err)?;
            state.last_line.clear();
            state.last_line.push_str(text);
        }

        let prefix = self.styled_prefix(priority);
        let stream = if priority.uses_error_stream() {
            state.err.as_mut()
        } else {
            state.out.as_mut()
        };
        if let Some(stream) = stream {
            writeln!(stream, "{}{}", prefix, text).map_err(io_err)?;
        }
        Ok(())
    }

    fn done(&self) -> Result<()> {
        let mut state = self.state.lock();
        let io_err = |e| StatsError::io("text output", e);

        state.flush_repeats().map_err(io_err)?;
        state.last_line.clear();
        if let Some(out) = state.out.as_mut() {
            out.flush().map_err(io_err)?;
        }
        if let Some(err) = state.err.as_mut() {
            err.flush().map_err(io_err)?;
        }
        Ok(())
    }
}
