//! Error types for hedgerpc

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Dispatch Errors ===
    /// No replica produced a successful response before the caller's deadline.
    #[error("Deadline of {timeout:?} exceeded without a successful replica response")]
    Deadline { timeout: Duration },

    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Config Errors ===
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Is this the client-visible deadline failure?
    pub fn is_deadline(&self) -> bool {
        matches!(self, Error::Deadline { .. })
    }
}
