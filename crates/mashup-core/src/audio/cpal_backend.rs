//! CPAL audio backend
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │     UI Thread    │───push()───────────►│   Command Queue     │
//! │                  │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         │                                           │
//!         │ Relaxed atomics                           │ pop()
//!         ▼                                           ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  EngineAtomics   │◄────────────────────│  CPAL Audio Thread  │
//! │   (lock-free)    │     sync writes     │  (owns AudioEngine) │
//! └──────────────────┘                     └─────────────────────┘
//! ```

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use crate::config::AudioSettings;
use crate::engine::{AudioEngine, EngineCommand};
use crate::types::{StereoBuffer, SAMPLE_RATE};

use super::backend::{BlockSize, MAX_BUFFER_SIZE};
use super::error::{AudioError, AudioResult};

/// A negotiated device configuration, not yet streaming
pub struct DeviceOutput {
    device: cpal::Device,
    config: StreamConfig,
    buffer_size: u32,
}

impl DeviceOutput {
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }
}

/// Keeps the output stream alive. Drop this to stop audio.
pub struct CpalAudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl CpalAudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }
}

/// Open the default output device and negotiate an f32 stereo config
pub(super) fn open_default(settings: &AudioSettings) -> AudioResult<DeviceOutput> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or(AudioError::NoDefaultDevice)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    let target_rate = settings.sample_rate.unwrap_or(SAMPLE_RATE);
    let in_range = |c: &cpal::SupportedStreamConfigRange| {
        target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0
    };

    let best = supported_configs
        .iter()
        .find(|c| c.channels() >= 2 && in_range(*c))
        .or_else(|| supported_configs.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported_configs.first())
        .ok_or_else(|| {
            AudioError::ConfigError("No f32 output configuration available".to_string())
        })?;

    let sample_rate = if in_range(best) {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz (stems will be resampled)",
            target_rate,
            fallback.0
        );
        fallback
    };

    let supported = best.clone().with_sample_rate(sample_rate);
    let block = BlockSize::from_request(settings.buffer_size);
    let config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: match block {
            BlockSize::DeviceDefault => CpalBufferSize::Default,
            BlockSize::Fixed(frames) => CpalBufferSize::Fixed(frames),
        },
    };
    let buffer_size = block.nominal_frames();

    log::info!(
        "Audio config: {} channels, {}Hz, {:?}",
        config.channels,
        config.sample_rate.0,
        block
    );

    Ok(DeviceOutput {
        device,
        config,
        buffer_size,
    })
}

/// State moved into the device callback
struct CallbackState {
    engine: AudioEngine,
    command_rx: rtrb::Consumer<EngineCommand>,
    /// Pre-allocated render buffer
    buffer: StereoBuffer,
}

impl CallbackState {
    /// Render `data` (interleaved, `channels` wide) in chunks that fit the buffer
    fn fill(&mut self, data: &mut [f32], channels: usize) {
        self.engine.process_commands(&mut self.command_rx);

        for chunk in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
            let n_frames = chunk.len() / channels;
            self.buffer.set_len_from_capacity(n_frames);
            self.engine.process(&mut self.buffer);

            if channels == 2 {
                chunk.copy_from_slice(self.buffer.as_interleaved());
                continue;
            }
            for (frame, sample) in chunk.chunks_mut(channels).zip(self.buffer.iter()) {
                frame[0] = sample.left;
                if channels > 1 {
                    frame[1] = sample.right;
                }
                for ch in frame.iter_mut().skip(2) {
                    *ch = 0.0;
                }
            }
        }
    }
}

pub(super) fn start(
    output: DeviceOutput,
    engine: AudioEngine,
    command_rx: rtrb::Consumer<EngineCommand>,
) -> AudioResult<CpalAudioHandle> {
    let DeviceOutput {
        device,
        config,
        buffer_size,
    } = output;
    let channels = config.channels as usize;
    let mut state = CallbackState {
        engine,
        command_rx,
        buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                state.fill(data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");
    Ok(CpalAudioHandle {
        _stream: stream,
        sample_rate: config.sample_rate.0,
        buffer_size,
    })
}
