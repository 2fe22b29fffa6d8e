//! # Built-in Sinks
//!
//! - [`TextSink`]: console output with verbosity filtering and duplicate
//!   suppression
//! - [`XmlSink`] / [`JsonSink`]: structured report files
//! - [`OperationSink`]: feeds operation start/stop events into the
//!   per-thread timers and the percentile estimator
//!
//! Output-side sinks write to an [`OutputTarget`], resolved from the
//! configured option value when the sink is initialized.

pub mod json;
pub mod operation;
pub mod text;
pub mod xml;

pub use json::{JsonSink, JsonStyle};
pub use operation::OperationSink;
pub use text::TextSink;
pub use xml::XmlSink;

use crate::error::{Result, StatsError};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Spaces added per nesting level in structured output.
pub(crate) const INDENT_INCREMENT: usize = 4;

/// Where a sink writes.
#[derive(Debug, Clone, Default)]
pub enum OutputTarget {
    /// No target configured; the sink deselects itself.
    #[default]
    Disabled,
    Stdout,
    Stderr,
    File(PathBuf),
    /// In-memory capture, shared with whoever created it.
    Buffer(SharedBuffer),
}

impl OutputTarget {
    /// Interpret a file option value: absent or empty disables the sink,
    /// `-` selects standard output, anything else is a path.
    pub fn from_option(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => OutputTarget::Disabled,
            Some("-") => OutputTarget::Stdout,
            Some(path) => OutputTarget::File(PathBuf::from(path)),
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, OutputTarget::Disabled)
    }

    pub fn describe(&self) -> String {
        match self {
            OutputTarget::Disabled => "<disabled>".to_string(),
            OutputTarget::Stdout => "<stdout>".to_string(),
            OutputTarget::Stderr => "<stderr>".to_string(),
            OutputTarget::File(path) => path.display().to_string(),
            OutputTarget::Buffer(_) => "<buffer>".to_string(),
        }
    }

    /// Open the target for writing. Files are created or truncated.
    pub fn open(&self) -> Result<Option<Box<dyn Write + Send>>> {
        let writer: Box<dyn Write + Send> = match self {
            OutputTarget::Disabled => return Ok(None),
            OutputTarget::Stdout => Box::new(io::stdout()),
            OutputTarget::Stderr => Box::new(io::stderr()),
            OutputTarget::File(path) => {
                let file = File::create(path).map_err(|e| StatsError::io(self.describe(), e))?;
                Box::new(BufWriter::new(file))
            }
            OutputTarget::Buffer(buffer) => Box::new(buffer.clone()),
        };
        Ok(Some(writer))
    }
}

/// A cloneable in-memory writer; every clone appends to the same bytes.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An opened structured output plus the nesting stack shared by the XML
/// and JSON sinks.
pub(crate) struct SectionWriter {
    pub out: Box<dyn Write + Send>,
    pub target: String,
    sections: Vec<String>,
    violation: Option<String>,
}

impl SectionWriter {
    pub fn new(out: Box<dyn Write + Send>, target: String) -> Self {
        Self {
            out,
            target,
            sections: Vec::new(),
            violation: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.sections.len()
    }

    pub fn indent(&self) -> usize {
        self.depth() * INDENT_INCREMENT
    }

    pub fn push(&mut self, name: &str) {
        self.sections.push(name.to_string());
    }

    /// Pop the innermost section if it is `name`.
    ///
    /// A mismatched or unmatched close is recorded and nothing is popped.
    pub fn pop(&mut self, name: &str) -> bool {
        match self.sections.last() {
            Some(open) if open == name => {
                self.sections.pop();
                true
            }
            Some(open) => {
                let detail = format!("end of '{}' while '{}' is open", name, open);
                self.record_violation(detail);
                false
            }
            None => {
                let detail = format!("end of '{}' with no open section", name);
                self.record_violation(detail);
                false
            }
        }
    }

    fn record_violation(&mut self, detail: String) {
        tracing::error!("Unbalanced section in {}: {}", self.target, detail);
        self.violation.get_or_insert(detail);
    }

    /// First nesting violation, or sections left open.
    pub fn take_violation(&mut self) -> Option<String> {
        self.violation.take().or_else(|| {
            (!self.sections.is_empty())
                .then(|| format!("sections left open: {}", self.sections.join(" > ")))
        })
    }

    pub fn write_line(&mut self, line: std::fmt::Arguments<'_>) -> Result<()> {
        writeln!(self.out, "{}", line).map_err(|e| StatsError::io(self.target.clone(), e))
    }

    pub fn write_raw(&mut self, text: std::fmt::Arguments<'_>) -> Result<()> {
        write!(self.out, "{}", text).map_err(|e| StatsError::io(self.target.clone(), e))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|e| StatsError::io(self.target.clone(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_option() {
        assert!(OutputTarget::from_option(None).is_disabled());
        assert!(OutputTarget::from_option(Some("")).is_disabled());
        assert!(matches!(
            OutputTarget::from_option(Some("-")),
            OutputTarget::Stdout
        ));
        assert!(matches!(
            OutputTarget::from_option(Some("report.xml")),
            OutputTarget::File(ref p) if p == &PathBuf::from("report.xml")
        ));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let target = OutputTarget::File(PathBuf::from("/nonexistent-dir/for/sure/out.xml"));
        assert!(matches!(target.open(), Err(StatsError::Io { .. })));
    }

    #[test]
    fn test_shared_buffer_clones_share_bytes() {
        let buffer = SharedBuffer::new();
        let mut writer = buffer.clone();
        writeln!(writer, "one").unwrap();
        writeln!(writer, "two").unwrap();

        assert_eq!(buffer.lines(), vec!["one", "two"]);
        buffer.clear();
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_section_writer_nesting() {
        let mut writer = SectionWriter::new(Box::new(SharedBuffer::new()), "test".into());
        writer.push("a");
        writer.push("b");
        assert_eq!(writer.indent(), 2 * INDENT_INCREMENT);

        assert!(!writer.pop("a"));
        assert!(writer.pop("b"));
        assert!(writer.pop("a"));
        assert!(!writer.pop("a"));

        let violation = writer.take_violation().unwrap();
        assert!(violation.contains("'a' while 'b' is open"));
    }

    #[test]
    fn test_section_writer_reports_open_sections() {
        let mut writer = SectionWriter::new(Box::new(SharedBuffer::new()), "test".into());
        writer.push("outer");
        assert_eq!(
            writer.take_violation().as_deref(),
            Some("sections left open: outer")
        );
    }
}
