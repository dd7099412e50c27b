//! Recording host double for tests
//!
//! Keeps gains in a map, lets the test set the clock, and records every
//! source start/stop so tests can assert on graph side effects.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{MashupError, MashupResult};
use crate::types::StereoBuffer;

use super::{AudioClock, AudioHost, NodeId};

pub(crate) struct ManualHost {
    pub time: f64,
    pub ready: bool,
    pub suspended: bool,
    pub gains: HashMap<NodeId, f32>,
    pub started: Vec<(NodeId, f64)>,
    pub stopped: Vec<NodeId>,
    next_node: usize,
}

impl ManualHost {
    pub fn new() -> Self {
        Self {
            time: 0.0,
            ready: true,
            suspended: false,
            gains: HashMap::new(),
            started: Vec::new(),
            stopped: Vec::new(),
            next_node: 0,
        }
    }

    pub fn gain(&self, node: NodeId) -> f32 {
        self.gains.get(&node).copied().unwrap_or(1.0)
    }

    fn next_id(&mut self) -> NodeId {
        self.next_node += 1;
        NodeId::new(self.next_node - 1)
    }
}

impl AudioClock for ManualHost {
    fn current_time(&self) -> MashupResult<f64> {
        if self.ready {
            Ok(self.time)
        } else {
            Err(MashupError::ClockUnavailable("test clock not ready".to_string()))
        }
    }
}

impl AudioHost for ManualHost {
    fn sample_rate(&self) -> u32 {
        48000
    }

    fn create_gain(&mut self, _output: Option<NodeId>) -> NodeId {
        let id = self.next_id();
        self.gains.insert(id, 1.0);
        id
    }

    fn create_source(&mut self, _buffer: Arc<StereoBuffer>, _output: NodeId) -> NodeId {
        self.next_id()
    }

    fn start_source(&mut self, source: NodeId, when: f64) -> MashupResult<()> {
        self.started.push((source, when));
        Ok(())
    }

    fn stop_source(&mut self, source: NodeId) {
        self.stopped.push(source);
    }

    fn set_gain(&mut self, node: NodeId, level: f32) {
        self.gains.insert(node, level);
    }

    fn suspend(&mut self) -> MashupResult<()> {
        self.suspended = true;
        Ok(())
    }

    fn resume(&mut self) -> MashupResult<()> {
        self.suspended = false;
        Ok(())
    }
}
