//! Engine error types
//!
//! Every control-surface operation returns a [`MashupResult`]. The variants
//! carry enough context for logging; [`MashupError::kind`] collapses them to
//! the stable [`ErrorKind`] that callers branch on.

use thiserror::Error;

/// Stable classification of engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation called in the wrong lifecycle phase (e.g. double start)
    InvalidState,
    /// Track index outside the channel's catalog
    OutOfRange,
    /// Audio clock not running or not ready
    ClockUnavailable,
    /// Asset failed to load or decode
    LoadFailure,
    /// Playback has not been started
    NotStarted,
    /// No channel with the requested name
    UnknownChannel,
    /// Configuration rejected by validation
    InvalidConfig,
    /// Command queue to the audio thread is full
    QueueFull,
}

/// Errors produced by the mashup engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MashupError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Track index {index} out of range for channel '{channel}' ({len} tracks)")]
    OutOfRange {
        channel: String,
        index: usize,
        len: usize,
    },

    #[error("Audio clock unavailable: {0}")]
    ClockUnavailable(String),

    #[error("Failed to load {path}: {reason}")]
    LoadFailure { path: String, reason: String },

    #[error("Playback has not been started")]
    NotStarted,

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Command queue is full")]
    QueueFull,
}

impl MashupError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MashupError::InvalidState(_) => ErrorKind::InvalidState,
            MashupError::OutOfRange { .. } => ErrorKind::OutOfRange,
            MashupError::ClockUnavailable(_) => ErrorKind::ClockUnavailable,
            MashupError::LoadFailure { .. } => ErrorKind::LoadFailure,
            MashupError::NotStarted => ErrorKind::NotStarted,
            MashupError::UnknownChannel(_) => ErrorKind::UnknownChannel,
            MashupError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            MashupError::QueueFull => ErrorKind::QueueFull,
        }
    }

    pub(crate) fn load_failure(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        MashupError::LoadFailure {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for engine operations
pub type MashupResult<T> = Result<T, MashupError>;
