//! Unified error types for the tether core.
//!
//! Runtime-level errors (configuration, bootstrap) live in `tether-runtime`.

use thiserror::Error;

use crate::event::EventKind;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors reported by a transport client.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The platform rejected the login credentials.
    #[error("login rejected: {reason}")]
    AuthRejected {
        /// Reason given by the platform.
        reason: String,
    },

    /// The peer reset the connection.
    #[error("connection reset by peer")]
    ConnectionReset,

    /// Any other network-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The platform sent something the client could not handle.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No client is connected.
    #[error("transport is not connected")]
    NotConnected,

    /// The client was destroyed and can no longer be used.
    #[error("transport has been destroyed")]
    Destroyed,

    /// Message send failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),
}

impl TransportError {
    /// Returns `true` for faults that usually clear up on their own
    /// (resets, route flaps).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionReset | Self::Network(_))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionReset => Self::ConnectionReset,
            _ => Self::Network(err.to_string()),
        }
    }
}

// =============================================================================
// Connection Errors
// =============================================================================

/// Errors returned when the supervisor cannot bring a connection up.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// Credentials were rejected. This is a misconfiguration and is never retried.
    #[error("credentials rejected: {reason}")]
    AuthRejected {
        /// Reason given by the platform.
        reason: String,
    },

    /// Login failed for a reason other than credentials.
    #[error("login failed: {0}")]
    Login(#[source] TransportError),

    /// `start` was called while a connection is already up or in progress.
    #[error("supervisor is already running")]
    AlreadyRunning,

    /// The supervisor was stopped while the connection was being established.
    #[error("supervisor was stopped")]
    Stopped,

    /// The connection closed cleanly while login was still in progress.
    #[error("connection closed during login")]
    Closed,
}

impl From<TransportError> for ConnectionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::AuthRejected { reason } => Self::AuthRejected { reason },
            other => Self::Login(other),
        }
    }
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors raised by the [`EventDispatcher`](crate::EventDispatcher).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The event name is not part of the closed event set.
    #[error("unknown event '{name}'")]
    InvalidEventKind {
        /// The rejected name.
        name: String,
    },

    /// A subscriber returned an error; later subscribers were not invoked.
    #[error("subscriber #{position} for {kind} failed: {source}")]
    CallbackFailed {
        /// Kind of the event being published.
        kind: EventKind,
        /// Zero-based registration position of the failing subscriber.
        position: usize,
        /// The subscriber's error.
        #[source]
        source: anyhow::Error,
    },
}

// =============================================================================
// Resolution Errors
// =============================================================================

/// Errors returned by the [`ResourceResolver`](crate::ResourceResolver).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The guild never became available within the retry budget.
    #[error("could not get guild '{guild_id}' after {attempts} attempt(s)")]
    GuildUnavailable {
        /// The guild that was looked up.
        guild_id: String,
        /// Number of lookups performed.
        attempts: u32,
    },

    /// The guild resolved but the member is not part of it.
    #[error("member '{user_id}' not found in guild '{guild_id}'")]
    MemberNotFound {
        /// The user that was looked up.
        user_id: String,
        /// The guild that was searched.
        guild_id: String,
    },
}

impl ResolutionError {
    /// Whether the calling operation must give up.
    ///
    /// An unavailable guild means a wrong id or a broken connection; a missing
    /// member is a routine miss.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::GuildUnavailable { .. })
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for dispatcher operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type for resolver operations.
pub type ResolutionResult<T> = Result<T, ResolutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_maps_to_auth_rejected() {
        let err = ConnectionError::from(TransportError::AuthRejected {
            reason: "invalid token".into(),
        });
        assert!(matches!(err, ConnectionError::AuthRejected { .. }));

        let err = ConnectionError::from(TransportError::ConnectionReset);
        assert!(matches!(
            err,
            ConnectionError::Login(TransportError::ConnectionReset)
        ));
    }

    #[test]
    fn test_io_reset_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = TransportError::from(io);
        assert!(matches!(err, TransportError::ConnectionReset));
        assert!(err.is_transient());
        assert!(!TransportError::Protocol("bad opcode".into()).is_transient());
    }
}
