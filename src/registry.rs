//! # Handler Registry & Dispatcher
//!
//! Holds one ordered handler chain per [`MessageKind`]. Chains are built
//! during single-threaded setup (`register`, `unregister`, `init_all`) and
//! are read-only once workers start, so dispatch walks a plain slice with no
//! locking.
//!
//! ## Failure Policy
//!
//! - `init_all` fails fast: the first handler that returns a fatal error
//!   (see [`StatsError::is_fatal`]) is withdrawn and the error is returned
//!   without initializing the rest. Non-fatal init errors only withdraw
//!   the handler.
//! - `dispatch` and `done_all` are best-effort: a failing handler is logged
//!   and skipped, the remaining handlers still run, and the first failure is
//!   returned to the caller.
//! - Section boundaries are broadcast to every structured handler and have
//!   no failure result.

use crate::error::{Result, StatsError};
use crate::handler::{Handler, InitStatus, OptionSpec};
use crate::message::{Message, MessageKind};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Default)]
pub struct HandlerRegistry {
    chains: [Vec<Arc<dyn Handler>>; 3],
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the chain for `kind`.
    pub fn register(&mut self, kind: MessageKind, handler: Arc<dyn Handler>) {
        debug!("Registering {} handler for {:?} messages", handler.name(), kind);
        self.chains[kind.index()].push(handler);
    }

    /// Register against a raw kind number, rejecting boundary values.
    pub fn register_raw(&mut self, kind: u8, handler: Arc<dyn Handler>) -> Result<()> {
        let kind = MessageKind::try_from(kind)?;
        self.register(kind, handler);
        Ok(())
    }

    /// Remove every registration of `handler` from the chain for `kind`.
    ///
    /// Returns the number of entries removed.
    pub fn unregister(&mut self, kind: MessageKind, handler: &Arc<dyn Handler>) -> usize {
        let chain = &mut self.chains[kind.index()];
        let before = chain.len();
        chain.retain(|h| !Arc::ptr_eq(h, handler));
        let removed = before - chain.len();
        if removed > 0 {
            debug!("Removed {} handler from {:?} messages", handler.name(), kind);
        }
        removed
    }

    pub fn handlers(&self, kind: MessageKind) -> &[Arc<dyn Handler>] {
        &self.chains[kind.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.chains.iter().all(Vec::is_empty)
    }

    /// Options of every registered handler, in registration order.
    pub fn option_specs(&self) -> Vec<OptionSpec> {
        MessageKind::ALL
            .iter()
            .flat_map(|&kind| self.handlers(kind).iter())
            .flat_map(|h| h.options().iter().copied())
            .collect()
    }

    /// Initialize every handler, kind by kind in registration order.
    ///
    /// Deselected handlers are removed from their chain, as are handlers
    /// failing with a non-fatal error. On the first fatal error the failing
    /// handler is removed too and the error is returned; handlers after it
    /// are left uninitialized.
    pub fn init_all(&mut self) -> Result<()> {
        for kind in MessageKind::ALL {
            let mut idx = 0;
            while idx < self.chains[kind.index()].len() {
                let handler = self.chains[kind.index()][idx].clone();
                match handler.init() {
                    Ok(InitStatus::Ready) => idx += 1,
                    Ok(InitStatus::Deselected) => {
                        debug!("{} handler deselected itself", handler.name());
                        self.chains[kind.index()].remove(idx);
                    }
                    Err(e) if e.is_fatal() => {
                        self.chains[kind.index()].remove(idx);
                        return Err(e);
                    }
                    Err(e) => {
                        warn!("{} handler withdrawn during init: {}", handler.name(), e);
                        self.chains[kind.index()].remove(idx);
                    }
                }
            }
        }
        Ok(())
    }

    /// Route `msg` to every handler registered for its kind.
    pub fn dispatch(&self, msg: &Message<'_>) -> Result<()> {
        let mut first_error: Option<StatsError> = None;

        for handler in self.handlers(msg.kind()) {
            if let Err(e) = handler.process(msg) {
                warn!("{} handler failed to process message: {}", handler.name(), e);
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    pub fn begin_section(&self, name: &str) {
        for handler in self.handlers(MessageKind::Structured) {
            handler.begin_section(name);
        }
    }

    pub fn end_section(&self, name: &str) {
        for handler in self.handlers(MessageKind::Structured) {
            handler.end_section(name);
        }
    }

    /// Tear down every handler, continuing past failures.
    pub fn done_all(&self) -> Result<()> {
        let mut first_error: Option<StatsError> = None;

        for kind in MessageKind::ALL {
            for handler in self.handlers(kind) {
                if let Err(e) = handler.done() {
                    warn!("{} handler failed during teardown: {}", handler.name(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
