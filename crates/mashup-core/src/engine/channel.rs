//! Channel - a group of mutually exclusive tracks
//!
//! Selection is two-phase: `request_select` only records a pending index, and
//! `apply_pending` (called at the bar boundary) performs the audible switch.

use crate::error::{MashupError, MashupResult};
use crate::host::{AudioHost, NodeId};

use super::track::{ChannelId, Track, TrackSource};

/// Default level applied to the selected track
pub const DEFAULT_TRACK_GAIN: f32 = 0.5;

/// Lowest level for the selected track; it must stay audible
pub const MIN_TRACK_GAIN: f32 = 0.001;

/// Selected-track level within `MIN_TRACK_GAIN..=1.0`
pub(crate) fn clamp_track_gain(level: f32) -> f32 {
    if level.is_nan() {
        DEFAULT_TRACK_GAIN
    } else {
        level.clamp(MIN_TRACK_GAIN, 1.0)
    }
}

/// Read-only view of one track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSnapshot {
    pub name: String,
    pub gain: f32,
    pub started: bool,
}

/// Read-only view of one channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSnapshot {
    pub name: String,
    pub selected: usize,
    pub pending: Option<usize>,
    pub gain: f32,
    pub tracks: Vec<TrackSnapshot>,
}

impl ChannelSnapshot {
    /// Number of tracks currently audible
    pub fn audible_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.gain > 0.0).count()
    }
}

/// A named set of interchangeable tracks sharing one gain stage
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    name: String,
    gain_node: NodeId,
    tracks: Vec<Track>,
    selected: usize,
    pending: Option<usize>,
    gain: f32,
    track_gain: f32,
}

impl Channel {
    /// Create a channel and bind its tracks to the graph below `output`
    ///
    /// Fails with `InvalidConfig` for a channel without tracks.
    pub fn new(
        host: &mut dyn AudioHost,
        id: ChannelId,
        name: impl Into<String>,
        sources: Vec<TrackSource>,
        output: NodeId,
    ) -> MashupResult<Self> {
        let name = name.into();
        if sources.is_empty() {
            return Err(MashupError::InvalidConfig(format!(
                "channel '{}' has no tracks",
                name
            )));
        }

        let gain_node = host.create_gain(Some(output));
        let mut tracks = Vec::with_capacity(sources.len());
        for (idx, source) in sources.into_iter().enumerate() {
            tracks.push(Track::new(&mut *host, idx, id, source, gain_node));
        }

        Ok(Self {
            id,
            name,
            gain_node,
            tracks,
            selected: 0,
            pending: None,
            gain: 1.0,
            track_gain: DEFAULT_TRACK_GAIN,
        })
    }

    /// Level applied to the selected track on unmute/switch
    ///
    /// Floored at [`MIN_TRACK_GAIN`]; NaN falls back to the default.
    pub fn with_track_gain(mut self, level: f32) -> Self {
        self.track_gain = clamp_track_gain(level);
        self
    }

    /// Record a selection to apply at the next bar boundary
    ///
    /// A later request before the boundary replaces an earlier one. Audible
    /// gains are never touched here.
    pub fn request_select(&mut self, index: usize) -> MashupResult<()> {
        if index >= self.tracks.len() {
            return Err(MashupError::OutOfRange {
                channel: self.name.clone(),
                index,
                len: self.tracks.len(),
            });
        }
        self.pending = Some(index);
        Ok(())
    }

    /// Switch to the pending track, if any
    ///
    /// Returns true when the audible track changed.
    pub fn apply_pending(&mut self, host: &mut dyn AudioHost) -> bool {
        let Some(next) = self.pending.take() else {
            return false;
        };
        if next == self.selected {
            return false;
        }

        let level = self.track_gain;
        self.tracks[self.selected].set_gain(host, 0.0);
        self.tracks[next].set_gain(host, level);
        log::debug!(
            "Channel '{}': {} -> {}",
            self.name,
            self.tracks[self.selected].name(),
            self.tracks[next].name()
        );
        self.selected = next;
        true
    }

    /// Silence every track
    pub fn mute_all(&mut self, host: &mut dyn AudioHost) {
        for track in &mut self.tracks {
            track.set_gain(host, 0.0);
        }
    }

    /// Make only the selected track audible
    pub fn unmute_selected(&mut self, host: &mut dyn AudioHost) {
        let level = self.track_gain;
        for (idx, track) in self.tracks.iter_mut().enumerate() {
            track.set_gain(host, if idx == self.selected { level } else { 0.0 });
        }
    }

    /// Set the channel-level gain (clamped to 0.0..=1.0)
    pub fn set_gain(&mut self, host: &mut dyn AudioHost, level: f32) {
        self.gain = level.clamp(0.0, 1.0);
        host.set_gain(self.gain_node, self.gain);
    }

    /// Start every track at clock time `when`
    pub fn start_tracks(&mut self, host: &mut dyn AudioHost, when: f64) -> MashupResult<()> {
        for track in &mut self.tracks {
            track.start(host, when)?;
        }
        Ok(())
    }

    pub fn stop_tracks(&mut self, host: &mut dyn AudioHost) {
        for track in &mut self.tracks {
            track.stop(host);
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn pending(&self) -> Option<usize> {
        self.pending
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn track_gain(&self) -> f32 {
        self.track_gain
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            name: self.name.clone(),
            selected: self.selected,
            pending: self.pending,
            gain: self.gain,
            tracks: self
                .tracks
                .iter()
                .map(|t| TrackSnapshot {
                    name: t.name().to_string(),
                    gain: t.gain(),
                    started: t.is_started(),
                })
                .collect(),
        }
    }
}
