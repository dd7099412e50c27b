//! BarScheduler - self-re-arming bar timeline
//!
//! The scheduler keeps at most one bar of future events in a queue:
//!
//! ```text
//! t0          t0+s        t0+2s   ...   t0+(n-1)s     t0+n·s
//! Tick(0)     Tick(1)     Tick(2)       Tick(n-1)     Reset ──► schedule_bar(t0+n·s)
//! ```
//!
//! Events are delivered by [`BarScheduler::poll`] once the audio clock passes
//! their timestamp. A Reset re-arms the next bar from its own timestamp, so
//! bars chain without accumulating drift from delivery latency.
//!
//! Every `start` uses a new epoch. Events enqueued under an older epoch are
//! never delivered, which makes `stop` + `start` free of stale events.

use std::collections::VecDeque;

use crate::error::{MashupError, MashupResult};
use crate::host::AudioClock;

use super::bar::BarConfig;

/// Lifecycle of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    /// First bar enqueued, nothing delivered yet
    Armed,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Tick { slice: u32 },
    Reset,
}

/// An event on the bar timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    /// Audio clock time in seconds
    pub timestamp: f64,
    pub kind: EventKind,
    /// Bar number since start (0-based)
    pub bar: u64,
    pub epoch: u64,
}

pub struct BarScheduler {
    config: BarConfig,
    state: SchedulerState,
    epoch: u64,
    queue: VecDeque<ScheduledEvent>,
    /// Bar number of the most recently scheduled bar
    bar: u64,
}

impl BarScheduler {
    pub fn new(config: BarConfig) -> Self {
        Self {
            config,
            state: SchedulerState::Idle,
            epoch: 0,
            queue: VecDeque::new(),
            bar: 0,
        }
    }

    /// Capture t0 from the clock and enqueue the first bar
    ///
    /// Returns t0. Fails with `InvalidState` unless idle, and with
    /// `ClockUnavailable` when the clock cannot be read (state stays idle).
    pub fn start(&mut self, clock: &dyn AudioClock) -> MashupResult<f64> {
        if self.state != SchedulerState::Idle {
            return Err(MashupError::InvalidState(
                "scheduler already started".to_string(),
            ));
        }
        let t0 = clock.current_time()?;

        self.epoch += 1;
        self.bar = 0;
        self.queue.clear();
        self.schedule_bar(t0);
        self.state = SchedulerState::Armed;

        log::info!(
            "BarScheduler: armed at t0={:.3}s ({} slices of {:.4}s, epoch {})",
            t0,
            self.config.slices(),
            self.config.seconds_per_slice(),
            self.epoch
        );
        Ok(t0)
    }

    /// Enqueue the ticks of one bar starting at `t0` plus the closing Reset
    fn schedule_bar(&mut self, t0: f64) {
        let slices = self.config.slices();
        let sps = self.config.seconds_per_slice();
        for slice in 0..=slices {
            let kind = if slice < slices {
                EventKind::Tick { slice }
            } else {
                EventKind::Reset
            };
            self.queue.push_back(ScheduledEvent {
                timestamp: t0 + sps * slice as f64,
                kind,
                bar: self.bar,
                epoch: self.epoch,
            });
        }
    }

    /// Cancel every unfired event and return to idle
    ///
    /// Returns the number of cancelled events.
    pub fn stop(&mut self) -> usize {
        let cancelled = self.queue.len();
        self.queue.clear();
        self.epoch += 1;
        self.state = SchedulerState::Idle;
        log::debug!("BarScheduler: stopped, {} events cancelled", cancelled);
        cancelled
    }

    /// Deliver every event due at `now`, in timestamp order
    ///
    /// The handler runs before a Reset re-arms the next bar. Returns the
    /// number of delivered events.
    pub fn poll<F>(&mut self, now: f64, mut handler: F) -> usize
    where
        F: FnMut(&ScheduledEvent),
    {
        let mut delivered = 0;
        while let Some(event) = self.queue.front().copied() {
            if event.timestamp > now {
                break;
            }
            self.queue.pop_front();
            if event.epoch != self.epoch {
                continue;
            }

            if self.state == SchedulerState::Armed {
                self.state = SchedulerState::Running;
            }
            handler(&event);
            delivered += 1;

            if event.kind == EventKind::Reset {
                self.bar += 1;
                self.schedule_bar(event.timestamp);
            }
        }
        delivered
    }

    /// Timestamp of the next event to deliver
    pub fn next_event_time(&self) -> Option<f64> {
        self.queue.front().map(|e| e.timestamp)
    }

    /// Number of events waiting in the queue
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn config(&self) -> &BarConfig {
        &self.config
    }

    pub fn bar(&self) -> u64 {
        self.bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bar::Subdivisions;
    use crate::error::ErrorKind;
    use crate::host::manual::ManualHost;

    fn scheduler(subdivisions: Subdivisions) -> BarScheduler {
        BarScheduler::new(BarConfig::new(160.0, subdivisions).unwrap())
    }

    fn collect(scheduler: &mut BarScheduler, now: f64) -> Vec<ScheduledEvent> {
        let mut events = Vec::new();
        scheduler.poll(now, |e| events.push(*e));
        events
    }

    #[test]
    fn test_160_bpm_four_slices_timeline() {
        let host = ManualHost::new();
        let mut scheduler = scheduler(Subdivisions::Four);
        assert_eq!(scheduler.start(&host).unwrap(), 0.0);
        assert_eq!(scheduler.state(), SchedulerState::Armed);

        // Everything strictly before the bar boundary
        let events = collect(&mut scheduler, 1.5 - 1e-9);
        let expected = [
            (0.0, EventKind::Tick { slice: 0 }),
            (0.375, EventKind::Tick { slice: 1 }),
            (0.75, EventKind::Tick { slice: 2 }),
            (1.125, EventKind::Tick { slice: 3 }),
        ];
        assert_eq!(events.len(), expected.len());
        for (event, (ts, kind)) in events.iter().zip(expected) {
            assert!((event.timestamp - ts).abs() < 1e-9);
            assert_eq!(event.kind, kind);
            assert_eq!(event.bar, 0);
        }
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(scheduler.next_event_time(), Some(1.5));

        // The Reset and the re-armed downbeat share the boundary timestamp
        let events = collect(&mut scheduler, 1.5);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Reset);
        assert_eq!(events[0].bar, 0);
        assert_eq!(events[1].kind, EventKind::Tick { slice: 0 });
        assert_eq!(events[1].bar, 1);
        assert!(events.iter().all(|e| (e.timestamp - 1.5).abs() < 1e-9));

        // The cycle repeats from the Reset timestamp
        assert_eq!(scheduler.next_event_time(), Some(1.875));
        let events = collect(&mut scheduler, 1.9);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Tick { slice: 1 });
        assert_eq!(events[0].bar, 1);
        assert!((events[0].timestamp - 1.875).abs() < 1e-9);
    }

    #[test]
    fn test_slices_in_order_then_single_reset() {
        let host = ManualHost::new();
        let mut scheduler = scheduler(Subdivisions::Sixteen);
        scheduler.start(&host).unwrap();

        let bar = scheduler.config().bar_duration();
        let events = collect(&mut scheduler, bar * 3.0 - 1e-6);

        let mut last_ts = f64::NEG_INFINITY;
        let mut expected_slice = 0;
        let mut resets = 0;
        for event in &events {
            assert!(event.timestamp >= last_ts);
            last_ts = event.timestamp;
            match event.kind {
                EventKind::Tick { slice } => {
                    assert_eq!(slice, expected_slice);
                    expected_slice += 1;
                }
                EventKind::Reset => {
                    assert_eq!(expected_slice, 16);
                    expected_slice = 0;
                    resets += 1;
                }
            }
        }
        assert_eq!(resets, 2);
        assert_eq!(expected_slice, 16);
    }

    #[test]
    fn test_lookahead_never_exceeds_one_bar() {
        let host = ManualHost::new();
        let mut scheduler = scheduler(Subdivisions::Eight);
        scheduler.start(&host).unwrap();
        assert_eq!(scheduler.pending_events(), 9);

        let mut now = 0.0;
        while now < 10.0 {
            scheduler.poll(now, |_| {});
            assert!(scheduler.pending_events() <= 9);
            now += 0.01;
        }
    }

    #[test]
    fn test_stop_then_start_uses_fresh_t0() {
        let mut host = ManualHost::new();
        let mut scheduler = scheduler(Subdivisions::Four);
        scheduler.start(&host).unwrap();
        collect(&mut scheduler, 0.5);

        assert_eq!(scheduler.stop(), 3);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.next_event_time(), None);

        host.time = 10.0;
        assert_eq!(scheduler.start(&host).unwrap(), 10.0);
        let events = collect(&mut scheduler, 10.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Tick { slice: 0 });
        assert_eq!(events[0].bar, 0);
        assert!(events.iter().all(|e| e.epoch == scheduler.epoch()));
    }

    #[test]
    fn test_double_start_is_invalid_state() {
        let host = ManualHost::new();
        let mut scheduler = scheduler(Subdivisions::Four);
        scheduler.start(&host).unwrap();
        let err = scheduler.start(&host).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_unready_clock_stays_idle() {
        let mut host = ManualHost::new();
        host.ready = false;
        let mut scheduler = scheduler(Subdivisions::Four);
        let err = scheduler.start(&host).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClockUnavailable);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.pending_events(), 0);
    }
}
