//! Mashup session configuration
//!
//! ```yaml
//! bpm: 160.0
//! subdivisions_per_bar: 32
//! track_gain: 0.5
//! start_master_gain: 0.5
//! channels:
//!   - name: beat
//!     tracks: [stems/beats/backseat.wav, stems/beats/yonkers.wav]
//!   - name: melody
//!     gain: 0.8
//!     tracks: [stems/melodies/1994.wav]
//! audio:
//!   buffer_size: 512
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::{
    BarConfig, Subdivisions, DEFAULT_START_MASTER_GAIN, DEFAULT_TICK_QUEUE_CAPACITY,
    DEFAULT_TRACK_GAIN,
};
use crate::error::{MashupError, MashupResult};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MashupConfig {
    /// Tempo in beats per minute
    /// Default: 160
    pub bpm: f64,
    /// Slices per bar (4, 8, 16 or 32)
    /// Default: 32
    pub subdivisions_per_bar: u32,
    /// Level of the selected track in each channel
    /// Default: 0.5
    pub track_gain: f32,
    /// Master level applied when playback starts
    /// Default: 0.5
    pub start_master_gain: f32,
    /// Channels in display order
    pub channels: Vec<ChannelDefinition>,
    pub audio: AudioSettings,
}

/// One channel and its interchangeable tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDefinition {
    pub name: String,
    /// Track files, in selection order
    pub tracks: Vec<PathBuf>,
    /// Channel-level gain
    #[serde(default = "unity_gain")]
    pub gain: f32,
}

fn unity_gain() -> f32 {
    1.0
}

impl ChannelDefinition {
    pub fn new(name: impl Into<String>, tracks: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            tracks,
            gain: 1.0,
        }
    }
}

/// Audio output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Preferred output sample rate (device default when unset)
    pub sample_rate: Option<u32>,
    /// Frames per block (device default when unset)
    pub buffer_size: Option<u32>,
    /// Beat events buffered for the UI before dropping
    pub tick_queue_capacity: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: None,
            buffer_size: None,
            tick_queue_capacity: DEFAULT_TICK_QUEUE_CAPACITY,
        }
    }
}

fn stems(dir: &str, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| Path::new("stems").join(dir).join(format!("{}.wav", name)))
        .collect()
}

impl Default for MashupConfig {
    fn default() -> Self {
        Self {
            bpm: 160.0,
            subdivisions_per_bar: 32,
            track_gain: DEFAULT_TRACK_GAIN,
            start_master_gain: DEFAULT_START_MASTER_GAIN,
            channels: vec![
                ChannelDefinition::new("beat", stems("beats", &["backseat", "yonkers", "so_fresh"])),
                ChannelDefinition::new("melody", stems("melodies", &["1994", "lullaby", "mercy_me"])),
                ChannelDefinition::new("acapella", stems("acapellas", &["bob", "green_light", "gucci"])),
            ],
            audio: AudioSettings::default(),
        }
    }
}

impl MashupConfig {
    /// Check every constraint the engine relies on
    pub fn validate(&self) -> MashupResult<()> {
        self.bar_config()?;

        // The selected track of every channel must stay audible
        if !(self.track_gain > 0.0 && self.track_gain <= 1.0) {
            return Err(MashupError::InvalidConfig(format!(
                "track_gain must be within (0.0, 1.0] (got {})",
                self.track_gain
            )));
        }
        if !(0.0..=1.0).contains(&self.start_master_gain) {
            return Err(MashupError::InvalidConfig(format!(
                "start_master_gain must be within 0.0..=1.0 (got {})",
                self.start_master_gain
            )));
        }

        if self.channels.is_empty() {
            return Err(MashupError::InvalidConfig(
                "at least one channel is required".to_string(),
            ));
        }
        let mut names = HashSet::new();
        for channel in &self.channels {
            if channel.name.trim().is_empty() {
                return Err(MashupError::InvalidConfig(
                    "channel names cannot be empty".to_string(),
                ));
            }
            if !names.insert(channel.name.as_str()) {
                return Err(MashupError::InvalidConfig(format!(
                    "duplicate channel name '{}'",
                    channel.name
                )));
            }
            if channel.tracks.is_empty() {
                return Err(MashupError::InvalidConfig(format!(
                    "channel '{}' has no tracks",
                    channel.name
                )));
            }
            if !(0.0..=1.0).contains(&channel.gain) {
                return Err(MashupError::InvalidConfig(format!(
                    "channel '{}' gain must be within 0.0..=1.0 (got {})",
                    channel.name, channel.gain
                )));
            }
        }

        if self.audio.tick_queue_capacity == 0 {
            return Err(MashupError::InvalidConfig(
                "audio.tick_queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Bar timing described by this config
    pub fn bar_config(&self) -> MashupResult<BarConfig> {
        BarConfig::new(self.bpm, Subdivisions::from_count(self.subdivisions_per_bar)?)
    }

    /// Make relative track paths relative to `base` (usually the config dir)
    pub fn resolve_paths(&mut self, base: &Path) {
        for channel in &mut self.channels {
            for track in &mut channel.tracks {
                if track.is_relative() {
                    *track = base.join(&*track);
                }
            }
        }
    }
}
