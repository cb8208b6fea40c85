//! Error types for the sweep engine.

use thiserror::Error;

/// Errors raised by rule compilation, the transport, and the scan driver.
///
/// Only `Connection` is fatal once a run has started. `Folder` is recovered by
/// the orchestrator and `Protocol` by the folder scanner's retry policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Invalid configuration, detected before any folder is touched.
    #[error("configuration error: {0}")]
    Config(String),

    /// The session is gone.
    #[error("connection error: {0}")]
    Connection(String),

    /// A folder could not be opened.
    #[error("folder '{folder}' unavailable: {reason}")]
    Folder { folder: String, reason: String },

    /// A single command failed on an otherwise healthy session.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn folder(folder: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Folder {
            folder: folder.into(),
            reason: reason.into(),
        }
    }

    /// Whether the run has to stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
