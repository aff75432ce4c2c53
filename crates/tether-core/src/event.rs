//! Application-facing events.
//!
//! Raw transport callbacks are normalized into a small closed set of
//! [`EventKind`]s. The set is fixed at compile time; text names are only
//! accepted at the [`FromStr`] boundary, where unknown names are rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::model::ChatMessage;

// ============================================================================
// Event Kind
// ============================================================================

/// The closed set of events consumers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// The connection is up and the client cache had time to settle.
    Ready,
    /// Diagnostic chatter from the transport client.
    Debug,
    /// A chat message arrived.
    Message,
    /// An otherwise unhandled failure was intercepted.
    Error,
    /// The connection was re-established after a failure.
    Reconnected,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Ready,
        EventKind::Debug,
        EventKind::Message,
        EventKind::Error,
        EventKind::Reconnected,
    ];

    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Debug => "DEBUG",
            Self::Message => "MESSAGE",
            Self::Error => "ERROR",
            Self::Reconnected => "RECONNECTED",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(Self::Ready),
            "DEBUG" => Ok(Self::Debug),
            "MESSAGE" => Ok(Self::Message),
            "ERROR" => Ok(Self::Error),
            "RECONNECT" | "RECONNECTED" => Ok(Self::Reconnected),
            other => Err(DispatchError::InvalidEventKind {
                name: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Error Reports
// ============================================================================

/// Where an intercepted failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    /// A panic anywhere in the process.
    Panic,
    /// A subscriber returned an error.
    Callback,
}

/// Description of a failure that was intercepted instead of crashing the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Failure source.
    pub origin: ErrorOrigin,
    /// Human readable message, including the error chain for callback errors.
    pub message: String,
    /// `file:line:column` for panics, when known.
    #[serde(default)]
    pub location: Option<String>,
}

impl ErrorReport {
    /// Creates a report for a failing subscriber.
    pub fn callback(message: impl Into<String>) -> Self {
        Self {
            origin: ErrorOrigin::Callback,
            message: message.into(),
            location: None,
        }
    }

    /// Creates a report for a panic.
    pub fn panic(message: impl Into<String>, location: Option<String>) -> Self {
        Self {
            origin: ErrorOrigin::Panic,
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {}", self.message, location),
            None => f.write_str(&self.message),
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// An event together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// See [`EventKind::Ready`].
    Ready,
    /// See [`EventKind::Debug`].
    Debug(String),
    /// See [`EventKind::Message`].
    Message(ChatMessage),
    /// See [`EventKind::Error`].
    Error(ErrorReport),
    /// See [`EventKind::Reconnected`].
    Reconnected,
}

impl Event {
    /// The kind this event is published under.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready => EventKind::Ready,
            Self::Debug(_) => EventKind::Debug,
            Self::Message(_) => EventKind::Message,
            Self::Error(_) => EventKind::Error,
            Self::Reconnected => EventKind::Reconnected,
        }
    }

    /// The message payload, if this is a message event.
    pub fn as_message(&self) -> Option<&ChatMessage> {
        match self {
            Self::Message(msg) => Some(msg),
            _ => None,
        }
    }

    /// The error payload, if this is an error event.
    pub fn as_error(&self) -> Option<&ErrorReport> {
        match self {
            Self::Error(report) => Some(report),
            _ => None,
        }
    }
}
