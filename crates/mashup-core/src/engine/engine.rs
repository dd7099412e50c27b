//! AudioEngine - the engine as owned by the audio thread
//!
//! Wraps a [`PlaybackController`] over the [`SoftwareHost`]. Each block the
//! backend calls [`AudioEngine::process_commands`] then [`AudioEngine::process`]:
//!
//! ```text
//! rtrb commands ──► controller ──► render(block) ──► EngineAtomics
//!                                      │
//!                                      └─ TickBus ──► crossbeam beat queue ──► UI
//! ```

use std::sync::Arc;

use crossbeam::channel::{bounded, Receiver};

use crate::host::SoftwareHost;
use crate::types::StereoBuffer;

use super::atomics::EngineAtomics;
use super::command::EngineCommand;
use super::controller::PlaybackController;
use super::tick_bus::BeatEvent;

/// Default capacity of the beat event queue to the UI
pub const DEFAULT_TICK_QUEUE_CAPACITY: usize = 64;

pub struct AudioEngine {
    controller: PlaybackController<SoftwareHost>,
    atomics: Arc<EngineAtomics>,
    beat_rx: Receiver<BeatEvent>,
}

impl AudioEngine {
    /// Take ownership of a controller and attach the UI-facing listeners
    ///
    /// Beat events are forwarded to a bounded queue of `tick_queue_capacity`
    /// events; when the UI falls behind, new events are dropped rather than
    /// blocking the audio thread.
    pub fn new(mut controller: PlaybackController<SoftwareHost>, tick_queue_capacity: usize) -> Self {
        let atomics = Arc::new(EngineAtomics::new(controller.mixer().channels().len()));

        let tick_atomics = Arc::clone(&atomics);
        controller.subscribe(move |event: &BeatEvent| -> anyhow::Result<()> {
            if let BeatEvent::Tick(tick) = event {
                tick_atomics.store_tick(tick.slice_index, tick.bar);
            }
            Ok(())
        });

        let (beat_tx, beat_rx) = bounded(tick_queue_capacity.max(1));
        controller.subscribe(move |event: &BeatEvent| -> anyhow::Result<()> {
            // Full or disconnected: the UI misses this event
            let _ = beat_tx.try_send(*event);
            Ok(())
        });

        atomics.sync(&controller);
        Self {
            controller,
            atomics,
            beat_rx,
        }
    }

    /// Lock-free state for the UI
    pub fn atomics(&self) -> Arc<EngineAtomics> {
        Arc::clone(&self.atomics)
    }

    /// Receiver for beat events (clones share one queue)
    pub fn beat_events(&self) -> Receiver<BeatEvent> {
        self.beat_rx.clone()
    }

    /// Open the host output so the clock runs
    pub fn open_clock(&mut self) {
        self.controller.host_mut().open();
    }

    /// Apply every queued command
    pub fn process_commands(&mut self, commands: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(cmd) = commands.pop() {
            self.handle_command(cmd);
        }
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        let result = match cmd {
            EngineCommand::Start => self.controller.start(),
            EngineCommand::TogglePlay => self.controller.toggle_play().map(|_| ()),
            EngineCommand::Stop => self.controller.stop(),
            EngineCommand::SelectTrack { channel, track } => {
                self.controller.select_track_at(channel, track)
            }
            EngineCommand::SetMasterVolume { volume } => {
                self.controller.set_master_volume(volume);
                Ok(())
            }
            EngineCommand::SetChannelVolume { channel, volume } => {
                self.controller.set_channel_volume_at(channel, volume)
            }
        };
        if let Err(e) = result {
            log::warn!("AudioEngine: {:?} rejected: {}", cmd, e);
        }
    }

    /// Render one block and publish the resulting state
    pub fn process(&mut self, out: &mut StereoBuffer) {
        self.controller.render(out.as_mut_slice());
        self.atomics.sync(&self.controller);
    }

    pub fn controller(&self) -> &PlaybackController<SoftwareHost> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController<SoftwareHost> {
        &mut self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bar::{BarConfig, Subdivisions};
    use crate::engine::command::command_channel;
    use crate::engine::mixer::Mixer;
    use crate::engine::track::{ChannelId, TrackSource};
    use crate::types::StereoSample;

    fn engine(tick_queue_capacity: usize) -> AudioEngine {
        // 8 Hz: 3 frames per slice at 160 bpm over 4 slices
        let mut host = SoftwareHost::new(8);
        let mut mixer = Mixer::new(&mut host);
        let sources = ["backseat", "yonkers"]
            .into_iter()
            .map(|name| {
                TrackSource::new(name, StereoBuffer::from_vec(vec![StereoSample::mono(1.0); 4]))
            })
            .collect();
        mixer.add_channel(&mut host, "beat", sources).unwrap();
        let config = BarConfig::new(160.0, Subdivisions::Four).unwrap();
        let mut engine = AudioEngine::new(
            PlaybackController::new(host, mixer, config),
            tick_queue_capacity,
        );
        engine.open_clock();
        engine
    }

    #[test]
    fn test_commands_drive_controller() {
        let mut engine = engine(16);
        let atomics = engine.atomics();
        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::Start).unwrap();
        tx.push(EngineCommand::SelectTrack {
            channel: ChannelId(0),
            track: 1,
        })
        .unwrap();

        let mut block = StereoBuffer::silence(4);
        engine.process_commands(&mut rx);
        engine.process(&mut block);

        assert!(atomics.is_started());
        assert!(atomics.is_playing());
        assert_eq!(atomics.master_volume(), 0.5);
        assert_eq!(atomics.channel(0).unwrap().pending(), Some(1));
        assert_eq!(atomics.slice(), 1);
        assert!(block.iter().all(|s| (s.left - 0.25).abs() < 1e-6));

        // Through the bar boundary at frame 12
        let mut block = StereoBuffer::silence(10);
        engine.process(&mut block);
        assert_eq!(atomics.channel(0).unwrap().selected(), 1);
        assert_eq!(atomics.channel(0).unwrap().pending(), None);
        assert_eq!(atomics.bar(), 1);
    }

    #[test]
    fn test_rejected_commands_are_ignored() {
        let mut engine = engine(16);
        let atomics = engine.atomics();
        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::TogglePlay).unwrap();
        tx.push(EngineCommand::SelectTrack {
            channel: ChannelId(4),
            track: 0,
        })
        .unwrap();
        tx.push(EngineCommand::SetChannelVolume {
            channel: ChannelId(0),
            volume: 0.4,
        })
        .unwrap();

        engine.process_commands(&mut rx);
        engine.process(&mut StereoBuffer::silence(4));
        assert!(!atomics.is_started());
        assert_eq!(atomics.channel(0).unwrap().volume(), 0.4);
    }

    #[test]
    fn test_beat_queue_drops_when_full() {
        let mut engine = engine(2);
        let beats = engine.beat_events();
        engine.controller_mut().start().unwrap();

        // A full bar plus the next downbeat: 6 events, only 2 fit
        let mut block = StereoBuffer::silence(12);
        engine.process(&mut block);

        let received: Vec<BeatEvent> = beats.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert!(matches!(received[0], BeatEvent::Tick(t) if t.slice_index == 0));
        assert_eq!(engine.atomics().bar(), 1);
    }
}
