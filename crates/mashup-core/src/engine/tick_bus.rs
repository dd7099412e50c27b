//! TickBus - fan-out of beat events to listeners
//!
//! Publishing is synchronous and unbuffered. A listener that returns an error
//! or panics is isolated: the remaining listeners still receive the event and
//! the failure is handed back to the publisher for logging.

use std::panic::{catch_unwind, AssertUnwindSafe};

/// One subdivision of the current bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub slice_index: u32,
    pub total_slices: u32,
    /// Audio clock time of the slice
    pub timestamp: f64,
    pub bar: u64,
}

impl Tick {
    /// Last slice of the bar (the visual ring restarts here)
    pub fn is_last_slice(&self) -> bool {
        self.slice_index + 1 == self.total_slices
    }
}

/// Event published on the bus
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeatEvent {
    Tick(Tick),
    /// Bar boundary, after pending selections were applied
    Reset { timestamp: f64, bar: u64 },
}

impl BeatEvent {
    pub fn timestamp(&self) -> f64 {
        match self {
            BeatEvent::Tick(tick) => tick.timestamp,
            BeatEvent::Reset { timestamp, .. } => *timestamp,
        }
    }
}

/// Receives beat events
pub trait TickListener: Send {
    fn on_beat(&mut self, event: &BeatEvent) -> anyhow::Result<()>;
}

impl<F> TickListener for F
where
    F: FnMut(&BeatEvent) -> anyhow::Result<()> + Send,
{
    fn on_beat(&mut self, event: &BeatEvent) -> anyhow::Result<()> {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A listener that failed while handling an event
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerFailure {
    pub id: SubscriptionId,
    pub message: String,
}

#[derive(Default)]
pub struct TickBus {
    listeners: Vec<(SubscriptionId, Box<dyn TickListener>)>,
    next_id: u64,
}

impl TickBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl TickListener + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    /// Deliver `event` to every listener in subscription order
    pub fn publish(&mut self, event: &BeatEvent) -> Vec<ListenerFailure> {
        let mut failures = Vec::new();
        for (id, listener) in &mut self.listeners {
            let message = match catch_unwind(AssertUnwindSafe(|| listener.on_beat(event))) {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{:#}", err),
                Err(panic) => panic_message(panic.as_ref()),
            };
            failures.push(ListenerFailure { id: *id, message });
        }
        failures
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}
