//! Error types for the dispatcher facade

use thiserror::Error;

use crate::core::bluetooth::TransportError;
use crate::core::dispatch::Lane;

/// Errors returned synchronously by the dispatcher
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Address is not six colon-separated hex pairs
    #[error("Invalid device address: {0:?}")]
    InvalidAddress(String),

    /// Hex payload has odd length or non-hex characters
    #[error("Invalid hex payload: {0}")]
    InvalidHex(String),

    /// Service or characteristic identifier is not a short or full UUID
    #[error("Invalid UUID: {0:?}")]
    InvalidUuid(String),

    /// MTU outside of what ATT allows
    #[error("MTU {requested} out of range ({min}..={max})")]
    MtuOutOfRange { requested: i64, min: u16, max: u16 },

    /// The queue no longer accepts commands
    #[error("The {0} queue is closed")]
    QueueClosed(Lane),

    /// Inline operation attempted after shutdown
    #[error("Dispatcher has been shut down")]
    Stopped,

    /// The worker went away without reporting a result
    #[error("Command was dropped before it completed")]
    Abandoned,

    /// The internal runtime or a worker thread could not be started
    #[error("Failed to start dispatcher: {0}")]
    Runtime(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// True for errors caused by bad caller input, detected before anything was enqueued
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            DispatchError::InvalidAddress(_)
                | DispatchError::InvalidHex(_)
                | DispatchError::InvalidUuid(_)
                | DispatchError::MtuOutOfRange { .. }
        )
    }
}
