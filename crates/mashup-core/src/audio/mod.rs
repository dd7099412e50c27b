//! Real-time audio output for the mashup engine
//!
//! The audio system follows a lock-free design:
//!
//! - **UI Thread**: sends commands through [`PlayerHandle`] (rtrb ring)
//! - **Audio Thread**: owns the `AudioEngine` exclusively, drains commands
//!   at the start of each block, renders, publishes state
//! - **Atomics**: the UI reads playback state via relaxed atomics
//!
//! Backends:
//! - **CPAL** (`cpal-backend` feature): default system output device
//! - **Paced thread**: no device, rendered blocks are discarded
//!
//! ```ignore
//! let output = open_output(&config.audio)?;
//! // ... load stems at output.sample_rate() ...
//! let mut system = start_audio_system(output, controller, 64)?;
//! system.player.start()?;
//! system.player.select_track("beat", 2)?;
//! let bar = system.player.atomics().bar();
//! ```

mod backend;
mod error;
mod handle;
mod thread_backend;

#[cfg(feature = "cpal-backend")]
mod cpal_backend;

pub use backend::{
    open_output, open_paced_output, start_audio_system, AudioHandle, AudioOutput,
    AudioSystemResult, CommandSender, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE, MIN_BUFFER_SIZE,
};
pub use error::{AudioError, AudioResult};
pub use handle::{ChannelLayout, PlayerHandle};
pub use thread_backend::ThreadAudioHandle;

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::{CpalAudioHandle, DeviceOutput};
