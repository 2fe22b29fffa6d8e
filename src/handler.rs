//! # Handler Capability Trait
//!
//! A handler is any sink or consumer registered against one
//! [`MessageKind`](crate::message::MessageKind). Every capability has a
//! no-op default so a handler only implements what it needs: the operation
//! sink never sees section boundaries, the text sink has nothing to tear
//! down, and so on.
//!
//! ## Lifecycle
//!
//! 1. `init` is called once during single-threaded setup. Returning
//!    [`InitStatus::Deselected`] withdraws the handler without affecting the
//!    others; returning an error aborts setup.
//! 2. `process`, `begin_section` and `end_section` are called from any
//!    thread for the rest of the run, which is why handlers are `Send + Sync`
//!    and keep their mutable state behind their own locks.
//! 3. `done` is called once at teardown; the handler flushes and closes its
//!    output there.

use crate::error::Result;
use crate::message::Message;

/// Outcome of a successful [`Handler::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Ready,
    /// The handler's required option was not supplied; remove it quietly.
    Deselected,
}

/// Description of an option a handler reads from the option store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub default: &'static str,
}

pub trait Handler: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Options this handler consumes, for help output.
    fn options(&self) -> &'static [OptionSpec] {
        &[]
    }

    fn init(&self) -> Result<InitStatus> {
        Ok(InitStatus::Ready)
    }

    fn process(&self, _msg: &Message<'_>) -> Result<()> {
        Ok(())
    }

    fn begin_section(&self, _name: &str) {}

    fn end_section(&self, _name: &str) {}

    fn done(&self) -> Result<()> {
        Ok(())
    }
}
