//! XML report sink.
//!
//! ```text
//! <?xml version="1.0"?>
//! <sysbench>
//!     <general_statistics>
//!         <total_time>10.0012</total_time>
//!     </general_statistics>
//! </sysbench>
//! ```

use super::{OutputTarget, SectionWriter};
use crate::error::{Result, StatsError};
use crate::handler::{Handler, InitStatus, OptionSpec};
use crate::message::Message;
use parking_lot::Mutex;

pub(crate) const ROOT_SECTION: &str = "sysbench";

const OPTIONS: &[OptionSpec] = &[OptionSpec {
    name: "xml-file",
    description: "Output filename",
    default: "",
}];

pub struct XmlSink {
    target: OutputTarget,
    writer: Mutex<Option<SectionWriter>>,
}

impl XmlSink {
    pub fn new(target: OutputTarget) -> Self {
        Self {
            target,
            writer: Mutex::new(None),
        }
    }
}

/// Escape the characters XML reserves in text content.
fn escape(text: &str) -> std::borrow::Cow<'_, str> {
    if !text.contains(['&', '<', '>']) {
        return text.into();
    }
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .into()
}

fn open_section(writer: &mut SectionWriter, name: &str) -> Result<()> {
    let indent = writer.indent();
    writer.write_line(format_args!("{:indent$}<{}>", "", escape(name), indent = indent))?;
    writer.push(name);
    Ok(())
}

fn close_section(writer: &mut SectionWriter, name: &str) -> Result<()> {
    if writer.pop(name) {
        let indent = writer.indent();
        writer.write_line(format_args!("{:indent$}</{}>", "", escape(name), indent = indent))?;
    }
    Ok(())
}

impl Handler for XmlSink {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn options(&self) -> &'static [OptionSpec] {
        OPTIONS
    }

    fn init(&self) -> Result<InitStatus> {
        let Some(out) = self.target.open()? else {
            return Ok(InitStatus::Deselected);
        };

        let mut writer = SectionWriter::new(out, self.target.describe());
        writer.write_line(format_args!("<?xml version=\"1.0\"?>"))?;
        open_section(&mut writer, ROOT_SECTION)?;
        *self.writer.lock() = Some(writer);
        Ok(InitStatus::Ready)
    }

    fn process(&self, msg: &Message<'_>) -> Result<()> {
        let Message::Structured { tag, value, .. } = *msg else {
            return Ok(());
        };
        let mut guard = self.writer.lock();
        let Some(writer) = guard.as_mut() else {
            return Ok(());
        };

        let indent = writer.indent();
        let tag = escape(tag);
        writer.write_line(format_args!(
            "{:indent$}<{}>{}</{}>",
            "",
            tag,
            escape(value),
            tag,
            indent = indent
        ))
    }

    fn begin_section(&self, name: &str) {
        if let Some(writer) = self.writer.lock().as_mut() {
            if let Err(e) = open_section(writer, name) {
                tracing::warn!("xml handler failed to open section {}: {}", name, e);
            }
        }
    }

    fn end_section(&self, name: &str) {
        if let Some(writer) = self.writer.lock().as_mut() {
            if let Err(e) = close_section(writer, name) {
                tracing::warn!("xml handler failed to close section {}: {}", name, e);
            }
        }
    }

    fn done(&self) -> Result<()> {
        let Some(mut writer) = self.writer.lock().take() else {
            return Ok(());
        };

        close_section(&mut writer, ROOT_SECTION)?;
        writer.flush()?;

        match writer.take_violation() {
            Some(detail) => Err(StatsError::UnbalancedSection { sink: "xml", detail }),
            None => Ok(()),
        }
    }
}
