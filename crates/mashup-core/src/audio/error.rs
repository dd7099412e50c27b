//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while opening or running the audio output
#[derive(Error, Debug)]
pub enum AudioError {
    /// No default output device
    #[error("No default audio output device")]
    NoDefaultDevice,

    /// Failed to get or negotiate a device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build the output stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start the output stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Failed to spawn the render thread
    #[error("Failed to spawn audio thread: {0}")]
    ThreadSpawnError(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
