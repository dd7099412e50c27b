//! Mixer - all channels plus the master gain
//!
//! The mixer is the only writer of track gains. It enforces that, once
//! unmuted, each channel has exactly one audible track.

use crate::error::{MashupError, MashupResult};
use crate::host::{AudioHost, NodeId};

use super::channel::{Channel, ChannelSnapshot};
use super::track::{ChannelId, TrackSource};

/// Read-only view of the whole mixer
#[derive(Debug, Clone, PartialEq)]
pub struct MixerSnapshot {
    pub master_gain: f32,
    pub channels: Vec<ChannelSnapshot>,
}

impl MixerSnapshot {
    pub fn channel(&self, name: &str) -> Option<&ChannelSnapshot> {
        self.channels.iter().find(|c| c.name == name)
    }
}

pub struct Mixer {
    channels: Vec<Channel>,
    master_node: NodeId,
    master_gain: f32,
    track_gain: f32,
}

impl Mixer {
    /// Create an empty mixer whose master stage feeds the destination
    ///
    /// Master starts silent; playback start raises it.
    pub fn new(host: &mut dyn AudioHost) -> Self {
        let master_node = host.create_gain(None);
        host.set_gain(master_node, 0.0);
        Self {
            channels: Vec::new(),
            master_node,
            master_gain: 0.0,
            track_gain: super::channel::DEFAULT_TRACK_GAIN,
        }
    }

    /// Level applied to the selected track of channels added after this call
    ///
    /// Floored like [`Channel::with_track_gain`].
    pub fn with_track_gain(mut self, level: f32) -> Self {
        self.track_gain = super::channel::clamp_track_gain(level);
        self
    }

    /// Add a channel in catalog order
    ///
    /// Channel names must be unique; a channel needs at least one track.
    pub fn add_channel(
        &mut self,
        host: &mut dyn AudioHost,
        name: impl Into<String>,
        sources: Vec<TrackSource>,
    ) -> MashupResult<ChannelId> {
        let name = name.into();
        if self.channel(&name).is_some() {
            return Err(MashupError::InvalidConfig(format!(
                "duplicate channel name '{}'",
                name
            )));
        }

        let id = ChannelId(self.channels.len());
        let channel = Channel::new(host, id, name, sources, self.master_node)?
            .with_track_gain(self.track_gain);
        log::info!(
            "Mixer: added channel '{}' with {} tracks",
            channel.name(),
            channel.len()
        );
        self.channels.push(channel);
        Ok(id)
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name() == name)
    }

    pub fn channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.name() == name)
    }

    pub fn channel_at(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id.0)
    }

    pub fn channel_at_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(id.0)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Set the master gain (clamped to 0.0..=1.0)
    pub fn set_master_gain(&mut self, host: &mut dyn AudioHost, level: f32) {
        self.master_gain = level.clamp(0.0, 1.0);
        host.set_gain(self.master_node, self.master_gain);
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    /// Apply every channel's pending selection at once
    ///
    /// Returns the number of channels that switched.
    pub fn apply_all_pending(&mut self, host: &mut dyn AudioHost) -> usize {
        let mut switched = 0;
        for channel in &mut self.channels {
            if channel.apply_pending(&mut *host) {
                switched += 1;
            }
        }
        switched
    }

    pub fn mute_all(&mut self, host: &mut dyn AudioHost) {
        for channel in &mut self.channels {
            channel.mute_all(&mut *host);
        }
    }

    pub fn unmute_selected(&mut self, host: &mut dyn AudioHost) {
        for channel in &mut self.channels {
            channel.unmute_selected(&mut *host);
        }
    }

    /// Start every track of every channel at clock time `when`
    pub fn start_tracks(&mut self, host: &mut dyn AudioHost, when: f64) -> MashupResult<()> {
        for channel in &mut self.channels {
            channel.start_tracks(&mut *host, when)?;
        }
        Ok(())
    }

    pub fn stop_tracks(&mut self, host: &mut dyn AudioHost) {
        for channel in &mut self.channels {
            channel.stop_tracks(&mut *host);
        }
    }

    pub fn snapshot(&self) -> MixerSnapshot {
        MixerSnapshot {
            master_gain: self.master_gain,
            channels: self.channels.iter().map(Channel::snapshot).collect(),
        }
    }
}
