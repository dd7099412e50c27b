//! In-process audio graph
//!
//! A minimal graph of looping sources and gain nodes, rendered into a stereo
//! block by the audio callback. The clock is derived from the number of frames
//! rendered while running, so it is sample-accurate and never drifts against
//! the output.
//!
//! ```text
//! Source ──► Track gain ──► Channel gain ──► Master gain ──► destination
//! ```
//!
//! Muted sources keep advancing: every stem in the mashup loops from the same
//! start frame, so switching tracks never changes their phase.

use std::sync::Arc;

use crate::error::{MashupError, MashupResult};
use crate::types::{StereoBuffer, StereoSample};

use super::{AudioClock, AudioHost, NodeId, RenderHost};

/// Lifecycle of the host clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    /// Output not opened yet; the clock cannot be read
    #[default]
    Closed,
    /// Clock advances with every rendered frame
    Running,
    /// Clock frozen, output silent
    Suspended,
}

enum Node {
    Gain {
        level: f32,
        output: Option<NodeId>,
    },
    Source {
        buffer: Arc<StereoBuffer>,
        output: NodeId,
        /// Frame at which playback begins (None = stopped)
        start_frame: Option<u64>,
        /// Read position inside the buffer
        position: usize,
    },
}

/// Software implementation of [`AudioHost`]
pub struct SoftwareHost {
    sample_rate: u32,
    state: ClockState,
    /// Frames rendered while running
    frame: u64,
    nodes: Vec<Node>,
}

impl SoftwareHost {
    /// Create a closed host for the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            state: ClockState::Closed,
            frame: 0,
            nodes: Vec::new(),
        }
    }

    /// Open the output so the clock starts running
    pub fn open(&mut self) {
        if self.state == ClockState::Closed {
            log::debug!("SoftwareHost: clock opened at {} Hz", self.sample_rate);
            self.state = ClockState::Running;
        }
    }

    /// Current clock state
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Frames rendered while running
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Current level of a gain node (None for sources or unknown nodes)
    pub fn gain(&self, node: NodeId) -> Option<f32> {
        match self.nodes.get(node.index()) {
            Some(Node::Gain { level, .. }) => Some(*level),
            _ => None,
        }
    }

    fn seconds_to_frame(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate as f64).round() as u64
    }

    /// Product of gains from `node` to the destination
    fn path_gain(&self, mut node: Option<NodeId>) -> f32 {
        let mut gain = 1.0;
        // A cycle would be a construction bug; bound the walk by the node count
        for _ in 0..=self.nodes.len() {
            match node.and_then(|id| self.nodes.get(id.index())) {
                Some(Node::Gain { level, output }) => {
                    gain *= *level;
                    node = *output;
                }
                _ => break,
            }
        }
        gain
    }
}

impl AudioClock for SoftwareHost {
    fn current_time(&self) -> MashupResult<f64> {
        match self.state {
            ClockState::Closed => Err(MashupError::ClockUnavailable(
                "audio output is not open".to_string(),
            )),
            _ => Ok(self.frame as f64 / self.sample_rate as f64),
        }
    }
}

impl AudioHost for SoftwareHost {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn create_gain(&mut self, output: Option<NodeId>) -> NodeId {
        self.nodes.push(Node::Gain { level: 1.0, output });
        NodeId::new(self.nodes.len() - 1)
    }

    fn create_source(&mut self, buffer: Arc<StereoBuffer>, output: NodeId) -> NodeId {
        self.nodes.push(Node::Source {
            buffer,
            output,
            start_frame: None,
            position: 0,
        });
        NodeId::new(self.nodes.len() - 1)
    }

    fn start_source(&mut self, source: NodeId, when: f64) -> MashupResult<()> {
        let frame = self.seconds_to_frame(when).max(self.frame);
        match self.nodes.get_mut(source.index()) {
            Some(Node::Source {
                start_frame,
                position,
                ..
            }) => {
                *start_frame = Some(frame);
                *position = 0;
                Ok(())
            }
            _ => Err(MashupError::InvalidState(format!(
                "node {} is not a source",
                source.index()
            ))),
        }
    }

    fn stop_source(&mut self, source: NodeId) {
        if let Some(Node::Source {
            start_frame,
            position,
            ..
        }) = self.nodes.get_mut(source.index())
        {
            *start_frame = None;
            *position = 0;
        }
    }

    fn set_gain(&mut self, node: NodeId, level: f32) {
        if let Some(Node::Gain { level: current, .. }) = self.nodes.get_mut(node.index()) {
            *current = level;
        }
    }

    fn suspend(&mut self) -> MashupResult<()> {
        match self.state {
            ClockState::Closed => Err(MashupError::ClockUnavailable(
                "cannot suspend a closed output".to_string(),
            )),
            _ => {
                self.state = ClockState::Suspended;
                Ok(())
            }
        }
    }

    fn resume(&mut self) -> MashupResult<()> {
        match self.state {
            ClockState::Closed => Err(MashupError::ClockUnavailable(
                "cannot resume a closed output".to_string(),
            )),
            _ => {
                self.state = ClockState::Running;
                Ok(())
            }
        }
    }
}

impl RenderHost for SoftwareHost {
    fn render(&mut self, out: &mut [StereoSample]) {
        out.fill(StereoSample::silence());
        if self.state != ClockState::Running {
            return;
        }

        let block_start = self.frame;
        let block_len = out.len();

        for idx in 0..self.nodes.len() {
            let (output, start) = match &self.nodes[idx] {
                Node::Source {
                    output,
                    start_frame: Some(start),
                    ..
                } => (*output, *start),
                _ => continue,
            };
            let gain = self.path_gain(Some(output));

            let Node::Source {
                buffer, position, ..
            } = &mut self.nodes[idx]
            else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }

            let first = start.saturating_sub(block_start).min(block_len as u64) as usize;
            for sample in &mut out[first..] {
                // Always advance so muted tracks stay phase-locked
                *sample += buffer[*position] * gain;
                *position += 1;
                if *position >= buffer.len() {
                    *position = 0;
                }
            }
        }

        self.frame += block_len as u64;
    }
}
