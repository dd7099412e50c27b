//! Host audio subsystem interface
//!
//! The engine never touches samples directly. It asks the host for:
//! - looping source nodes bound to a decoded buffer, started at a clock time
//! - gain nodes chained source → track gain → channel gain → master gain
//! - the current audio-clock time
//! - suspend/resume of the whole graph (pause without losing the timeline)
//!
//! [`SoftwareHost`] is the in-process implementation rendered by the audio
//! backends. Tests substitute a recording double so gain switches can be
//! observed without producing audio.

mod software;

#[cfg(test)]
pub(crate) mod manual;

use std::sync::Arc;

use crate::error::MashupResult;
use crate::types::{StereoBuffer, StereoSample};

pub use software::{ClockState, SoftwareHost};

/// Handle to a node in the host audio graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Create a node handle from a host-specific index
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Host-specific index of this node
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Read access to the monotonic audio clock
pub trait AudioClock {
    /// Current clock time in seconds
    ///
    /// Fails with `ClockUnavailable` when the clock is not running or not
    /// ready yet. A suspended clock still reports its (frozen) time.
    fn current_time(&self) -> MashupResult<f64>;
}

/// Audio graph operations the engine needs from its host
pub trait AudioHost: AudioClock {
    /// Sample rate of the graph
    fn sample_rate(&self) -> u32;

    /// Create a gain node feeding `output`, or the destination when `None`
    fn create_gain(&mut self, output: Option<NodeId>) -> NodeId;

    /// Create a looping source bound to `buffer`, feeding `output`
    fn create_source(&mut self, buffer: Arc<StereoBuffer>, output: NodeId) -> NodeId;

    /// Start a source at clock time `when` from offset zero
    ///
    /// Times in the past start immediately.
    fn start_source(&mut self, source: NodeId, when: f64) -> MashupResult<()>;

    /// Stop a source and rewind it to offset zero
    fn stop_source(&mut self, source: NodeId);

    /// Set a gain node's level, effective immediately (no ramp)
    fn set_gain(&mut self, node: NodeId, level: f32);

    /// Freeze the clock and silence the output
    fn suspend(&mut self) -> MashupResult<()>;

    /// Continue a suspended clock from where it stopped
    fn resume(&mut self) -> MashupResult<()>;
}

/// A host whose output is pulled block by block by an audio backend
pub trait RenderHost: AudioHost {
    /// Render `out.len()` frames, advancing the clock unless suspended
    fn render(&mut self, out: &mut [StereoSample]);
}
