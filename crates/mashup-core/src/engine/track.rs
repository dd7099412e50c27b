//! Track - one loopable stem and its gain control

use std::sync::Arc;

use crate::error::{MashupError, MashupResult};
use crate::host::{AudioHost, NodeId};
use crate::types::StereoBuffer;

/// Channel identifier (index in the mixer, catalog order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub usize);

/// A decoded stem ready to be bound into the graph
#[derive(Debug, Clone)]
pub struct TrackSource {
    /// Display name (file stem of the source path)
    pub name: String,
    /// Decoded audio at the host sample rate
    pub buffer: Arc<StereoBuffer>,
}

impl TrackSource {
    pub fn new(name: impl Into<String>, buffer: StereoBuffer) -> Self {
        Self {
            name: name.into(),
            buffer: Arc::new(buffer),
        }
    }
}

/// One playable stem belonging to exactly one channel
///
/// The source node and the gain node are owned by the host; the track keeps
/// their handles plus the last gain it applied, so the mixer state can be
/// inspected without querying the audio graph.
#[derive(Debug)]
pub struct Track {
    id: usize,
    channel: ChannelId,
    name: String,
    source: NodeId,
    gain_node: NodeId,
    gain: f32,
    started: bool,
}

impl Track {
    /// Bind a decoded stem into the graph, feeding `channel_gain`
    ///
    /// New tracks are muted until their channel selects them.
    pub fn new(
        host: &mut dyn AudioHost,
        id: usize,
        channel: ChannelId,
        source: TrackSource,
        channel_gain: NodeId,
    ) -> Self {
        let gain_node = host.create_gain(Some(channel_gain));
        host.set_gain(gain_node, 0.0);
        let source_node = host.create_source(source.buffer, gain_node);
        Self {
            id,
            channel,
            name: source.name,
            source: source_node,
            gain_node,
            gain: 0.0,
            started: false,
        }
    }

    /// Begin looping playback from offset zero at clock time `when`
    pub fn start(&mut self, host: &mut dyn AudioHost, when: f64) -> MashupResult<()> {
        if self.started {
            return Err(MashupError::InvalidState(format!(
                "track '{}' already started",
                self.name
            )));
        }
        host.start_source(self.source, when)?;
        self.started = true;
        Ok(())
    }

    /// Stop playback so the track can be started again
    pub fn stop(&mut self, host: &mut dyn AudioHost) {
        if self.started {
            host.stop_source(self.source);
            self.started = false;
        }
    }

    /// Set the track gain (clamped to 0.0..=1.0), applied instantly
    pub fn set_gain(&mut self, host: &mut dyn AudioHost, level: f32) {
        self.gain = level.clamp(0.0, 1.0);
        host.set_gain(self.gain_node, self.gain);
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last applied gain
    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn is_audible(&self) -> bool {
        self.gain > 0.0
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Gain node handle (for hosts that expose per-node metering)
    pub fn gain_node(&self) -> NodeId {
        self.gain_node
    }
}
