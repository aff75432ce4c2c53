//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use tether_core::{ConnectionError, DispatchError, TransportError};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded, generated or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The connection could not be brought up.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A transport call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Subscribing failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The operation spawns tasks and must run inside a Tokio runtime.
    #[error("no Tokio runtime is active")]
    NoAsyncRuntime,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
