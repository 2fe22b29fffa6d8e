//! JSON report sink.
//!
//! Two layouts are supported. [`JsonStyle::Strict`] (the default) produces
//! a document any JSON parser accepts:
//!
//! ```text
//! {
//!     "sysbench": {
//!         "general_statistics": {
//!             "total_time": "10.0012",
//!             "total_events": "4000"
//!         }
//!     }
//! }
//! ```
//!
//! [`JsonStyle::Legacy`] reproduces the historical byte layout
//! (`sysbench : {` header, no separator before a section that follows a
//! value) for consumers that scrape it with fixed patterns. It is not valid
//! JSON.

use super::{OutputTarget, SectionWriter, INDENT_INCREMENT};
use crate::error::{Result, StatsError};
use crate::handler::{Handler, InitStatus, OptionSpec};
use crate::message::Message;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::xml::ROOT_SECTION;

const OPTIONS: &[OptionSpec] = &[OptionSpec {
    name: "json-file",
    description: "Output filename",
    default: "",
}];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonStyle {
    #[default]
    Strict,
    Legacy,
}

struct JsonState {
    writer: SectionWriter,
    /// Strict layout: whether the object at each depth is still empty.
    /// Index 0 is the outer document object.
    empty: Vec<bool>,
    /// Legacy layout: a single flag reset on every section start.
    first_element: bool,
}

impl JsonState {
    /// Separator owed before the next member of the innermost object.
    fn separator(&mut self) -> &'static str {
        match self.empty.last_mut() {
            Some(empty) if *empty => {
                *empty = false;
                ""
            }
            Some(_) => ",",
            None => "",
        }
    }
}

pub struct JsonSink {
    target: OutputTarget,
    style: JsonStyle,
    state: Mutex<Option<JsonState>>,
}

impl JsonSink {
    pub fn new(target: OutputTarget) -> Self {
        Self::with_style(target, JsonStyle::default())
    }

    pub fn with_style(target: OutputTarget, style: JsonStyle) -> Self {
        Self {
            target,
            style,
            state: Mutex::new(None),
        }
    }

    pub fn style(&self) -> JsonStyle {
        self.style
    }

    fn open_section(&self, state: &mut JsonState, name: &str) -> Result<()> {
        match self.style {
            JsonStyle::Strict => {
                let sep = state.separator();
                let indent = state.writer.indent() + INDENT_INCREMENT;
                state.writer.write_raw(format_args!(
                    "{}\n{:indent$}{}: {{",
                    sep,
                    "",
                    Value::from(name),
                    indent = indent
                ))?;
                state.empty.push(true);
            }
            JsonStyle::Legacy => {
                let indent = state.writer.indent();
                state.writer.write_raw(format_args!(
                    "\n{:indent$}\"{}\" : {{",
                    "",
                    name,
                    indent = indent
                ))?;
                state.first_element = true;
            }
        }
        state.writer.push(name);
        Ok(())
    }

    fn close_section(&self, state: &mut JsonState, name: &str) -> Result<()> {
        if !state.writer.pop(name) {
            return Ok(());
        }
        let indent = match self.style {
            JsonStyle::Strict => {
                state.empty.pop();
                state.writer.indent() + INDENT_INCREMENT
            }
            JsonStyle::Legacy => state.writer.indent(),
        };
        state
            .writer
            .write_raw(format_args!("\n{:indent$}}}", "", indent = indent))
    }
}

impl Handler for JsonSink {
    fn name(&self) -> &'static str {
        "json"
    }

    fn options(&self) -> &'static [OptionSpec] {
        OPTIONS
    }

    fn init(&self) -> Result<InitStatus> {
        let Some(out) = self.target.open()? else {
            return Ok(InitStatus::Deselected);
        };

        let mut state = JsonState {
            writer: SectionWriter::new(out, self.target.describe()),
            empty: Vec::new(),
            first_element: true,
        };
        match self.style {
            JsonStyle::Strict => {
                state.writer.write_raw(format_args!("{{"))?;
                state.empty.push(true);
                self.open_section(&mut state, ROOT_SECTION)?;
            }
            JsonStyle::Legacy => {
                state
                    .writer
                    .write_raw(format_args!("{} : {{", ROOT_SECTION))?;
                state.writer.push(ROOT_SECTION);
            }
        }

        *self.state.lock() = Some(state);
        Ok(InitStatus::Ready)
    }

    fn process(&self, msg: &Message<'_>) -> Result<()> {
        let Message::Structured { tag, value, .. } = *msg else {
            return Ok(());
        };
        let mut guard = self.state.lock();
        let Some(state) = guard.as_mut() else {
            return Ok(());
        };

        match self.style {
            JsonStyle::Strict => {
                let sep = state.separator();
                let indent = state.writer.indent() + INDENT_INCREMENT;
                state.writer.write_raw(format_args!(
                    "{}\n{:indent$}{}: {}",
                    sep,
                    "",
                    Value::from(tag),
                    Value::from(value),
                    indent = indent
                ))
            }
            JsonStyle::Legacy => {
                let sep = if state.first_element { "" } else { "," };
                state.first_element = false;
                let indent = state.writer.indent();
                state.writer.write_raw(format_args!(
                    "{}\n{:indent$}\"{}\": \"{}\"",
                    sep,
                    "",
                    tag,
                    value,
                    indent = indent
                ))
            }
        }
    }

    fn begin_section(&self, name: &str) {
        if let Some(state) = self.state.lock().as_mut() {
            if let Err(e) = self.open_section(state, name) {
                tracing::warn!("json handler failed to open section {}: {}", name, e);
            }
        }
    }

    fn end_section(&self, name: &str) {
        if let Some(state) = self.state.lock().as_mut() {
            if let Err(e) = self.close_section(state, name) {
                tracing::warn!("json handler failed to close section {}: {}", name, e);
            }
        }
    }

    fn done(&self) -> Result<()> {
        let Some(mut state) = self.state.lock().take() else {
            return Ok(());
        };

        match self.style {
            JsonStyle::Strict => {
                self.close_section(&mut state, ROOT_SECTION)?;
                state.writer.write_raw(format_args!("\n}}\n"))?;
            }
            JsonStyle::Legacy => {
                state.writer.write_raw(format_args!("\n"))?;
                self.close_section(&mut state, ROOT_SECTION)?;
            }
        }
        state.writer.flush()?;

        match state.writer.take_violation() {
            Some(detail) => Err(StatsError::UnbalancedSection {
                sink: "json",
                detail,
            }),
            None => Ok(()),
        }
    }
}
