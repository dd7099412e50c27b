//! PlaybackController - the public control surface of the engine
//!
//! Owns the host, the mixer, the bar scheduler and the tick bus, and is their
//! only writer. Two flags track the session independently of the scheduler:
//!
//! - `started`: tracks are running and the bar timeline is armed
//! - `playing`: the host clock is not suspended
//!
//! Beat events are fired by `poll` (or by `render` on hosts that are pulled by
//! an audio callback). A Reset first applies every channel's pending
//! selection, then is published, then the scheduler re-arms the next bar.

use crate::error::{MashupError, MashupResult};
use crate::host::{AudioClock, AudioHost, RenderHost};
use crate::types::StereoSample;

use super::bar::BarConfig;
use super::mixer::{Mixer, MixerSnapshot};
use super::scheduler::{BarScheduler, EventKind, SchedulerState};
use super::tick_bus::{BeatEvent, SubscriptionId, Tick, TickBus, TickListener};
use super::track::ChannelId;

/// Master level applied by `start`
pub const DEFAULT_START_MASTER_GAIN: f32 = 0.5;

/// Read-only view of the whole session
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub started: bool,
    pub playing: bool,
    pub scheduler_state: SchedulerState,
    /// Bar currently being played (0-based since start)
    pub bar: u64,
    pub mixer: MixerSnapshot,
}

pub struct PlaybackController<H: AudioHost> {
    host: H,
    mixer: Mixer,
    scheduler: BarScheduler,
    bus: TickBus,
    started: bool,
    playing: bool,
    start_master_gain: f32,
}

impl<H: AudioHost> PlaybackController<H> {
    /// Wire a loaded mixer to its host and bar timing
    pub fn new(host: H, mixer: Mixer, config: BarConfig) -> Self {
        Self {
            host,
            mixer,
            scheduler: BarScheduler::new(config),
            bus: TickBus::new(),
            started: false,
            playing: false,
            start_master_gain: DEFAULT_START_MASTER_GAIN,
        }
    }

    pub fn with_start_master_gain(mut self, level: f32) -> Self {
        self.start_master_gain = level.clamp(0.0, 1.0);
        self
    }

    /// Start every track and arm the bar timeline at the current clock time
    ///
    /// Selections made before start take effect immediately. Fails with
    /// `InvalidState` when already started and with `ClockUnavailable` when
    /// the host clock cannot be read; nothing is started in either case.
    pub fn start(&mut self) -> MashupResult<()> {
        if self.started {
            return Err(MashupError::InvalidState(
                "playback already started".to_string(),
            ));
        }

        let t0 = self.scheduler.start(&self.host)?;
        if let Err(e) = self.mixer.start_tracks(&mut self.host, t0) {
            log::error!("PlaybackController: failed to start tracks: {}", e);
            self.mixer.stop_tracks(&mut self.host);
            self.scheduler.stop();
            return Err(e);
        }

        self.mixer.apply_all_pending(&mut self.host);
        self.mixer.unmute_selected(&mut self.host);
        self.mixer
            .set_master_gain(&mut self.host, self.start_master_gain);

        self.started = true;
        self.playing = true;
        log::info!(
            "PlaybackController: started at t0={:.3}s ({} bpm, {} slices)",
            t0,
            self.scheduler.config().bpm(),
            self.scheduler.config().slices()
        );
        Ok(())
    }

    /// Pause or resume the host clock; returns the new `playing` flag
    pub fn toggle_play(&mut self) -> MashupResult<bool> {
        if !self.started {
            return Err(MashupError::NotStarted);
        }
        if self.playing {
            self.host.suspend()?;
            self.playing = false;
        } else {
            self.host.resume()?;
            self.playing = true;
        }
        log::debug!(
            "PlaybackController: {}",
            if self.playing { "resumed" } else { "paused" }
        );
        Ok(self.playing)
    }

    /// Silence and stop everything, cancelling all unfired events
    pub fn stop(&mut self) -> MashupResult<()> {
        if !self.started {
            return Err(MashupError::NotStarted);
        }

        self.mixer.set_master_gain(&mut self.host, 0.0);
        let cancelled = self.scheduler.stop();
        self.mixer.mute_all(&mut self.host);
        self.mixer.stop_tracks(&mut self.host);

        if !self.playing {
            if let Err(e) = self.host.resume() {
                log::warn!("PlaybackController: could not resume clock on stop: {}", e);
            }
        }

        self.started = false;
        self.playing = false;
        log::info!(
            "PlaybackController: stopped ({} events cancelled)",
            cancelled
        );
        Ok(())
    }

    /// Queue a track switch for the next bar boundary
    pub fn select_track(&mut self, channel: &str, index: usize) -> MashupResult<()> {
        self.mixer
            .channel_mut(channel)
            .ok_or_else(|| MashupError::UnknownChannel(channel.to_string()))?
            .request_select(index)
    }

    /// Same as `select_track`, addressing the channel by id
    pub fn select_track_at(&mut self, channel: ChannelId, index: usize) -> MashupResult<()> {
        self.mixer
            .channel_at_mut(channel)
            .ok_or_else(|| MashupError::UnknownChannel(format!("#{}", channel.0)))?
            .request_select(index)
    }

    pub fn set_master_volume(&mut self, level: f32) {
        self.mixer.set_master_gain(&mut self.host, level);
    }

    pub fn set_channel_volume(&mut self, channel: &str, level: f32) -> MashupResult<()> {
        let host = &mut self.host;
        self.mixer
            .channel_mut(channel)
            .ok_or_else(|| MashupError::UnknownChannel(channel.to_string()))?
            .set_gain(host, level);
        Ok(())
    }

    pub fn set_channel_volume_at(&mut self, channel: ChannelId, level: f32) -> MashupResult<()> {
        let host = &mut self.host;
        self.mixer
            .channel_at_mut(channel)
            .ok_or_else(|| MashupError::UnknownChannel(format!("#{}", channel.0)))?
            .set_gain(host, level);
        Ok(())
    }

    pub fn subscribe(&mut self, listener: impl TickListener + 'static) -> SubscriptionId {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Fire every event due at clock time `now`
    ///
    /// Returns the number of events fired. Listener failures are logged and
    /// never interrupt the timeline.
    pub fn poll(&mut self, now: f64) -> usize {
        let Self {
            host,
            mixer,
            scheduler,
            bus,
            ..
        } = self;
        let total_slices = scheduler.config().slices();

        scheduler.poll(now, |event| {
            let beat = match event.kind {
                EventKind::Tick { slice } => BeatEvent::Tick(Tick {
                    slice_index: slice,
                    total_slices,
                    timestamp: event.timestamp,
                    bar: event.bar,
                }),
                EventKind::Reset => {
                    let switched = mixer.apply_all_pending(&mut *host);
                    if switched > 0 {
                        log::debug!(
                            "PlaybackController: bar {} boundary, {} channel(s) switched",
                            event.bar,
                            switched
                        );
                    }
                    BeatEvent::Reset {
                        timestamp: event.timestamp,
                        bar: event.bar,
                    }
                }
            };
            for failure in bus.publish(&beat) {
                log::warn!(
                    "TickBus: listener {:?} failed: {}",
                    failure.id,
                    failure.message
                );
            }
        })
    }

    pub fn next_event_time(&self) -> Option<f64> {
        self.scheduler.next_event_time()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            started: self.started,
            playing: self.playing,
            scheduler_state: self.scheduler.state(),
            bar: self.scheduler.bar(),
            mixer: self.mixer.snapshot(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn scheduler(&self) -> &BarScheduler {
        &self.scheduler
    }
}

impl<H: RenderHost> PlaybackController<H> {
    /// Render one output block, firing events on their exact frame
    ///
    /// The block is split at event timestamps so a bar-boundary switch lands
    /// on the first frame of the new bar rather than at the next block.
    pub fn render(&mut self, out: &mut [StereoSample]) {
        let sample_rate = self.host.sample_rate() as f64;
        let half_frame = 0.5 / sample_rate;

        // Events whose frame rounds to the current one fire before it renders
        if let Ok(now) = self.host.current_time() {
            self.poll(now + half_frame);
        }

        let mut offset = 0;
        while offset < out.len() {
            let remaining = out.len() - offset;
            let segment = match (self.host.current_time(), self.scheduler.next_event_time()) {
                (Ok(now), Some(next)) if self.playing => {
                    ((next - now) * sample_rate).round().clamp(1.0, remaining as f64) as usize
                }
                _ => remaining,
            };

            self.host.render(&mut out[offset..offset + segment]);
            offset += segment;

            if let Ok(now) = self.host.current_time() {
                self.poll(now + half_frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::engine::bar::Subdivisions;
    use crate::engine::track::TrackSource;
    use crate::error::ErrorKind;
    use crate::host::manual::ManualHost;
    use crate::host::SoftwareHost;
    use crate::types::StereoBuffer;

    fn sources(names: &[&str]) -> Vec<TrackSource> {
        names
            .iter()
            .map(|name| TrackSource::new(*name, StereoBuffer::silence(4)))
            .collect()
    }

    fn controller() -> PlaybackController<ManualHost> {
        let mut host = ManualHost::new();
        let mut mixer = Mixer::new(&mut host);
        mixer
            .add_channel(&mut host, "beat", sources(&["backseat", "yonkers", "so_fresh"]))
            .unwrap();
        mixer
            .add_channel(&mut host, "melody", sources(&["1994", "lullaby", "mercy_me"]))
            .unwrap();
        let config = BarConfig::new(160.0, Subdivisions::Four).unwrap();
        PlaybackController::new(host, mixer, config)
    }

    fn audible(controller: &PlaybackController<ManualHost>, channel: &str) -> Vec<usize> {
        let snapshot = controller.snapshot();
        snapshot
            .mixer
            .channel(channel)
            .unwrap()
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.gain > 0.0)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut controller = controller();
        assert_eq!(controller.toggle_play().unwrap_err().kind(), ErrorKind::NotStarted);
        assert_eq!(controller.stop().unwrap_err().kind(), ErrorKind::NotStarted);

        controller.start().unwrap();
        assert_eq!(controller.start().unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_start_unmutes_selected_and_sets_master() {
        let mut controller = controller();
        controller.select_track("melody", 2).unwrap();
        controller.start().unwrap();

        assert!(controller.is_started());
        assert!(controller.is_playing());
        assert_eq!(controller.snapshot().mixer.master_gain, DEFAULT_START_MASTER_GAIN);
        assert_eq!(audible(&controller, "beat"), vec![0]);
        assert_eq!(audible(&controller, "melody"), vec![2]);
        assert_eq!(controller.host().started.len(), 6);
    }

    #[test]
    fn test_unready_clock_refuses_start() {
        let mut controller = controller();
        controller.host_mut().ready = false;

        let err = controller.start().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClockUnavailable);
        assert!(!controller.is_started());
        assert_eq!(controller.scheduler().state(), SchedulerState::Idle);
        assert!(controller.host().started.is_empty());
        assert_eq!(controller.toggle_play().unwrap_err().kind(), ErrorKind::NotStarted);
    }

    #[test]
    fn test_switch_is_quantized_to_bar() {
        let mut controller = controller();
        controller.start().unwrap();
        controller.poll(0.0);
        controller.poll(0.375);

        // Between Tick(1) and Tick(2)
        controller.select_track("beat", 2).unwrap();
        assert_eq!(audible(&controller, "beat"), vec![0]);

        controller.poll(0.75);
        controller.poll(1.125);
        assert_eq!(audible(&controller, "beat"), vec![0]);

        controller.poll(1.5);
        assert_eq!(audible(&controller, "beat"), vec![2]);
        assert_eq!(audible(&controller, "melody"), vec![0]);
        assert_eq!(controller.snapshot().bar, 1);
    }

    #[test]
    fn test_reset_published_after_switch() {
        let mut controller = controller();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        controller.subscribe(move |event: &BeatEvent| -> anyhow::Result<()> {
            sink.lock().unwrap().push(*event);
            Ok(())
        });

        controller.start().unwrap();
        assert_eq!(controller.poll(1.5), 6);

        let events = events.lock().unwrap();
        let kinds: Vec<String> = events
            .iter()
            .map(|e| match e {
                BeatEvent::Tick(t) => format!("tick{}/{}", t.slice_index, t.total_slices),
                BeatEvent::Reset { bar, .. } => format!("reset{}", bar),
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["tick0/4", "tick1/4", "tick2/4", "tick3/4", "reset0", "tick0/4"]
        );
    }

    #[test]
    fn test_failing_listener_does_not_stop_timeline() {
        let mut controller = controller();
        let count = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&count);
        controller.subscribe(|_: &BeatEvent| -> anyhow::Result<()> { anyhow::bail!("broken") });
        controller.subscribe(move |_: &BeatEvent| -> anyhow::Result<()> {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        controller.start().unwrap();
        controller.poll(3.0);
        // Two bars of 4 ticks + reset, plus the first tick of bar 2
        assert_eq!(*count.lock().unwrap(), 11);
        assert_eq!(controller.scheduler().state(), SchedulerState::Running);
    }

    #[test]
    fn test_zero_track_gain_still_one_audible_per_channel() {
        let mut host = ManualHost::new();
        let mut mixer = Mixer::new(&mut host).with_track_gain(0.0);
        mixer
            .add_channel(&mut host, "beat", sources(&["backseat", "yonkers", "so_fresh"]))
            .unwrap();
        let config = BarConfig::new(160.0, Subdivisions::Four).unwrap();
        let mut controller = PlaybackController::new(host, mixer, config);

        controller.start().unwrap();
        controller.select_track("beat", 1).unwrap();
        controller.poll(10.0);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.mixer.channel("beat").unwrap().audible_count(), 1);
        assert_eq!(audible(&controller, "beat"), vec![1]);
    }

    #[test]
    fn test_toggle_play_suspends_host() {
        let mut controller = controller();
        controller.start().unwrap();

        assert!(!controller.toggle_play().unwrap());
        assert!(controller.host().suspended);
        assert!(controller.toggle_play().unwrap());
        assert!(!controller.host().suspended);
    }

    #[test]
    fn test_stop_then_start_is_fresh() {
        let mut controller = controller();
        controller.start().unwrap();
        controller.poll(0.5);
        controller.toggle_play().unwrap();

        controller.stop().unwrap();
        assert!(!controller.host().suspended);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.mixer.master_gain, 0.0);
        for channel in &snapshot.mixer.channels {
            assert_eq!(channel.audible_count(), 0);
        }
        assert_eq!(controller.next_event_time(), None);
        assert_eq!(controller.host().stopped.len(), 6);

        controller.host_mut().time = 20.0;
        controller.start().unwrap();
        assert_eq!(controller.next_event_time(), Some(20.0));
        assert_eq!(controller.poll(19.0), 0);
        assert_eq!(controller.snapshot().bar, 0);
    }

    #[test]
    fn test_unknown_channel() {
        let mut controller = controller();
        let err = controller.select_track("drums", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownChannel);
        let err = controller.set_channel_volume("drums", 0.3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownChannel);

        let err = controller.select_track("beat", 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);

        controller.set_channel_volume("melody", 0.3).unwrap();
        assert_eq!(controller.snapshot().mixer.channel("melody").unwrap().gain, 0.3);
    }

    #[test]
    fn test_render_switches_on_bar_frame() {
        // 8 Hz: 160 bpm over 4 slices gives 3 frames per slice, 12 per bar
        let mut host = SoftwareHost::new(8);
        host.open();
        let mut mixer = Mixer::new(&mut host);
        mixer
            .add_channel(
                &mut host,
                "beat",
                vec![
                    TrackSource::new("one", StereoBuffer::from_vec(vec![StereoSample::mono(1.0); 5])),
                    TrackSource::new("two", StereoBuffer::from_vec(vec![StereoSample::mono(2.0); 7])),
                ],
            )
            .unwrap();
        let config = BarConfig::new(160.0, Subdivisions::Four).unwrap();
        let mut controller = PlaybackController::new(host, mixer, config);
        controller.start().unwrap();

        let mut output = vec![StereoSample::silence(); 24];
        controller.render(&mut output[..5]);
        // Between Tick(1) and Tick(2)
        controller.select_track("beat", 1).unwrap();
        controller.render(&mut output[5..]);

        for (frame, sample) in output.iter().enumerate() {
            let expected = if frame < 12 { 0.25 } else { 0.5 };
            assert!(
                (sample.left - expected).abs() < 1e-6,
                "frame {}: {} != {}",
                frame,
                sample.left,
                expected
            );
        }
        // Frame 24 is the next bar boundary, so its Reset has fired too
        assert_eq!(controller.snapshot().bar, 2);
        assert_eq!(controller.host().frame(), 24);
    }
}
