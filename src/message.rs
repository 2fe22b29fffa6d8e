//! Messages routed through the handler registry.
//!
//! Messages are transient: they borrow their text and are discarded after
//! dispatch.

use crate::error::StatsError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// system is unusable
    Fatal = 0,
    /// user action must be taken
    Alert = 1,
    Warning = 2,
    /// normal but significant
    Notice = 3,
    Info = 4,
    Debug = 5,
}

impl Priority {
    pub const MAX_VERBOSITY: u8 = Priority::Debug as u8;

    pub fn level(self) -> u8 {
        self as u8
    }

    /// Whether a message of this priority passes the given verbosity threshold.
    pub fn is_visible_at(self, verbosity: u8) -> bool {
        self.level() <= verbosity
    }

    /// Tag prepended by the text sink; empty for routine priorities.
    pub fn prefix(self) -> &'static str {
        match self {
            Priority::Fatal => "FATAL: ",
            Priority::Alert => "ALERT: ",
            Priority::Warning => "WARNING: ",
            Priority::Debug => "DEBUG: ",
            Priority::Notice | Priority::Info => "",
        }
    }

    /// Whether the text sink routes this priority to the error stream.
    pub fn uses_error_stream(self) -> bool {
        !self.prefix().is_empty()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Fatal => "fatal",
            Priority::Alert => "alert",
            Priority::Warning => "warning",
            Priority::Notice => "notice",
            Priority::Info => "info",
            Priority::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// The handler chain a message is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Text,
    Structured,
    Operation,
}

impl MessageKind {
    pub const ALL: [MessageKind; 3] = [
        MessageKind::Text,
        MessageKind::Structured,
        MessageKind::Operation,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            MessageKind::Text => 0,
            MessageKind::Structured => 1,
            MessageKind::Operation => 2,
        }
    }
}

/// Raw kinds are numbered from 1; 0 and anything past the last kind are
/// boundary values and rejected.
impl TryFrom<u8> for MessageKind {
    type Error = StatsError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(MessageKind::Text),
            2 => Ok(MessageKind::Structured),
            3 => Ok(MessageKind::Operation),
            other => Err(StatsError::InvalidKind(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message<'a> {
    Text {
        priority: Priority,
        text: &'a str,
        allow_duplicates: bool,
    },
    Structured {
        tag: &'a str,
        value: &'a str,
        priority: Priority,
    },
    Operation {
        thread_id: usize,
        action: OperAction,
    },
}

impl<'a> Message<'a> {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Text { .. } => MessageKind::Text,
            Message::Structured { .. } => MessageKind::Structured,
            Message::Operation { .. } => MessageKind::Operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_routing() {
        assert!(Priority::Fatal.uses_error_stream());
        assert!(Priority::Alert.uses_error_stream());
        assert!(Priority::Warning.uses_error_stream());
        assert!(Priority::Debug.uses_error_stream());
        assert!(!Priority::Notice.uses_error_stream());
        assert!(!Priority::Info.uses_error_stream());
    }

    #[test]
    fn test_verbosity_threshold() {
        assert!(Priority::Fatal.is_visible_at(0));
        assert!(!Priority::Alert.is_visible_at(0));
        assert!(Priority::Notice.is_visible_at(3));
        assert!(!Priority::Info.is_visible_at(3));
        assert!(Priority::Debug.is_visible_at(Priority::MAX_VERBOSITY));
    }

    #[test]
    fn test_raw_kind_bounds() {
        assert_eq!(MessageKind::try_from(1).unwrap(), MessageKind::Text);
        assert_eq!(MessageKind::try_from(3).unwrap(), MessageKind::Operation);
        assert!(matches!(
            MessageKind::try_from(0),
            Err(StatsError::InvalidKind(0))
        ));
        assert!(matches!(
            MessageKind::try_from(4),
            Err(StatsError::InvalidKind(4))
        ));
    }

    #[test]
    fn test_message_kind() {
        let msg = Message::Operation {
            thread_id: 2,
            action: OperAction::Stop,
        };
        assert_eq!(msg.kind(), MessageKind::Operation);

        let msg = Message::Structured {
            tag: "latency",
            value: "12.5",
            priority: Priority::Notice,
        };
        assert_eq!(msg.kind(), MessageKind::Structured);
    }
}
