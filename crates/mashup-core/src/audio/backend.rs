//! Audio system startup
//!
//! Two ways to drive the engine, same lock-free architecture for both:
//! - **CPAL** (`cpal-backend` feature): the device callback owns the engine
//! - **Paced thread**: a render thread clocked by wall time, no device
//!
//! In both cases:
//! - the UI sends commands through the rtrb ring ([`CommandSender`])
//! - the audio thread owns the [`AudioEngine`] exclusively
//! - the UI reads [`EngineAtomics`] and drains the beat event queue
//!
//! The output is opened before the stems are loaded so they can be decoded
//! at the output sample rate:
//!
//! ```ignore
//! let output = open_output(&config.audio)?;
//! let mut host = SoftwareHost::new(output.sample_rate());
//! let mixer = runtime.block_on(load_mixer(&loader, &mut host, &config))?;
//! let controller = PlaybackController::new(host, mixer, config.bar_config()?);
//! let system = start_audio_system(output, controller, config.audio.tick_queue_capacity)?;
//! ```

use std::sync::Arc;

use crossbeam::channel::Receiver;

use crate::config::AudioSettings;
use crate::engine::{command_channel, AudioEngine, BeatEvent, EngineAtomics, EngineCommand};
use crate::engine::PlaybackController;
use crate::host::{AudioHost, SoftwareHost};
use crate::types::SAMPLE_RATE;

use super::error::{AudioError, AudioResult};
use super::handle::{ChannelLayout, PlayerHandle};
use super::thread_backend::{self, ThreadAudioHandle};

/// Frames per block when the config leaves it unset
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Smallest block the backends accept
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Largest block; render buffers are pre-allocated at this size
pub const MAX_BUFFER_SIZE: usize = 4096;

/// Requested block size clamped to what the backends accept
pub(crate) fn resolve_buffer_size(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_BUFFER_SIZE)
        .clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE as u32)
}

/// Block size to request from a sound device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockSize {
    /// Let the device pick
    DeviceDefault,
    Fixed(u32),
}

impl BlockSize {
    /// Unset means the device default; explicit sizes are clamped
    pub(crate) fn from_request(requested: Option<u32>) -> Self {
        match requested {
            None => BlockSize::DeviceDefault,
            Some(frames) => BlockSize::Fixed(resolve_buffer_size(Some(frames))),
        }
    }

    /// Frames per block for latency reporting
    ///
    /// The device default is not known up front; [`DEFAULT_BUFFER_SIZE`]
    /// stands in for it.
    pub(crate) fn nominal_frames(self) -> u32 {
        match self {
            BlockSize::DeviceDefault => DEFAULT_BUFFER_SIZE,
            BlockSize::Fixed(frames) => frames,
        }
    }
}

enum OutputTarget {
    #[cfg(feature = "cpal-backend")]
    Device(super::cpal_backend::DeviceOutput),
    Paced,
}

/// An opened but not yet running output
pub struct AudioOutput {
    target: OutputTarget,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioOutput {
    /// Sample rate the engine must run at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Whether this output renders to a sound device
    pub fn is_device(&self) -> bool {
        !matches!(self.target, OutputTarget::Paced)
    }
}

/// Open the default output device
///
/// Without the `cpal-backend` feature this is the paced thread.
pub fn open_output(settings: &AudioSettings) -> AudioResult<AudioOutput> {
    #[cfg(feature = "cpal-backend")]
    {
        let device = super::cpal_backend::open_default(settings)?;
        Ok(AudioOutput {
            sample_rate: device.sample_rate(),
            buffer_size: device.buffer_size(),
            target: OutputTarget::Device(device),
        })
    }
    #[cfg(not(feature = "cpal-backend"))]
    {
        Ok(open_paced_output(settings))
    }
}

/// Open a device-less output clocked by a render thread
pub fn open_paced_output(settings: &AudioSettings) -> AudioOutput {
    AudioOutput {
        target: OutputTarget::Paced,
        sample_rate: settings.sample_rate.unwrap_or(SAMPLE_RATE),
        buffer_size: resolve_buffer_size(settings.buffer_size),
    }
}

/// Result of starting the audio system
///
/// Contains everything the UI needs to drive and observe playback.
pub struct AudioSystemResult {
    /// Handle to keep audio alive (drop to stop)
    pub handle: AudioHandle,
    /// Validating command interface for the UI thread
    pub player: PlayerHandle,
    /// Beat events for visualizers (bounded, lossy)
    pub beat_events: Receiver<BeatEvent>,
    pub sample_rate: u32,
    /// Actual buffer size in frames
    pub buffer_size: u32,
    /// One-way output latency in milliseconds
    pub latency_ms: f32,
}

/// Handle to the running audio system
///
/// Keeps the stream or render thread alive. Drop this to stop audio.
pub enum AudioHandle {
    #[cfg(feature = "cpal-backend")]
    Cpal(super::cpal_backend::CpalAudioHandle),
    Thread(ThreadAudioHandle),
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        match self {
            #[cfg(feature = "cpal-backend")]
            AudioHandle::Cpal(h) => h.sample_rate(),
            AudioHandle::Thread(h) => h.sample_rate(),
        }
    }

    pub fn buffer_size(&self) -> u32 {
        match self {
            #[cfg(feature = "cpal-backend")]
            AudioHandle::Cpal(h) => h.buffer_size(),
            AudioHandle::Thread(h) => h.buffer_size(),
        }
    }

    /// Audio latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size() as f32 / self.sample_rate() as f32) * 1000.0
    }
}

/// Command sender for the UI thread
///
/// Wraps the lock-free producer feeding the audio thread. Never blocks.
pub struct CommandSender {
    pub(crate) producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    /// Queue a command for the next audio block
    ///
    /// Returns the command back when the queue is full.
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }
}

/// Start rendering `controller` on `output`
///
/// The controller's host must run at the output sample rate. The session
/// is not started: send [`EngineCommand::Start`] (or call
/// [`PlayerHandle::start`]) when the user asks for playback.
pub fn start_audio_system(
    output: AudioOutput,
    controller: PlaybackController<SoftwareHost>,
    tick_queue_capacity: usize,
) -> AudioResult<AudioSystemResult> {
    let host_rate = controller.host().sample_rate();
    if host_rate != output.sample_rate {
        return Err(AudioError::ConfigError(format!(
            "engine runs at {}Hz but the output runs at {}Hz",
            host_rate, output.sample_rate
        )));
    }

    let layout = ChannelLayout::from_mixer(controller.mixer());
    let mut engine = AudioEngine::new(controller, tick_queue_capacity);
    engine.open_clock();
    let atomics: Arc<EngineAtomics> = engine.atomics();
    let beat_events = engine.beat_events();

    let (command_tx, command_rx) = command_channel();

    let AudioOutput {
        target,
        sample_rate,
        buffer_size,
    } = output;
    let handle = match target {
        #[cfg(feature = "cpal-backend")]
        OutputTarget::Device(device) => {
            AudioHandle::Cpal(super::cpal_backend::start(device, engine, command_rx)?)
        }
        OutputTarget::Paced => AudioHandle::Thread(thread_backend::start(
            engine,
            command_rx,
            sample_rate,
            buffer_size,
        )?),
    };

    let latency_ms = handle.latency_ms();
    log::info!(
        "Audio system running: {}Hz, {} frames (~{:.1}ms latency), {} channels",
        sample_rate,
        buffer_size,
        latency_ms,
        layout.len()
    );

    Ok(AudioSystemResult {
        handle,
        player: PlayerHandle::new(
            CommandSender {
                producer: command_tx,
            },
            atomics,
            layout,
        ),
        beat_events,
        sample_rate,
        buffer_size,
        latency_ms,
    })
}
