//! PlayerHandle - the UI's view of a running engine
//!
//! Commands are checked against the last published [`EngineAtomics`] and
//! the channel layout before they are queued, so the caller gets the same
//! errors the controller would report. The atomics lag the engine by up to
//! one block: a command racing a state change is still re-validated (and
//! logged if rejected) by the audio thread.

use std::sync::Arc;

use crate::engine::{ChannelId, EngineAtomics, EngineCommand, Mixer};
use crate::error::{MashupError, MashupResult};

use super::backend::CommandSender;

/// Name and track names of one channel, fixed for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    pub name: String,
    pub tracks: Vec<String>,
}

impl ChannelLayout {
    /// Layout of every channel of `mixer`, in display order
    pub fn from_mixer(mixer: &Mixer) -> Vec<ChannelLayout> {
        mixer
            .channels()
            .iter()
            .map(|channel| ChannelLayout {
                name: channel.name().to_string(),
                tracks: channel
                    .tracks()
                    .iter()
                    .map(|track| track.name().to_string())
                    .collect(),
            })
            .collect()
    }
}

pub struct PlayerHandle {
    sender: CommandSender,
    atomics: Arc<EngineAtomics>,
    layout: Vec<ChannelLayout>,
}

impl PlayerHandle {
    pub fn new(sender: CommandSender, atomics: Arc<EngineAtomics>, layout: Vec<ChannelLayout>) -> Self {
        Self {
            sender,
            atomics,
            layout,
        }
    }

    pub fn atomics(&self) -> Arc<EngineAtomics> {
        Arc::clone(&self.atomics)
    }

    pub fn layout(&self) -> &[ChannelLayout] {
        &self.layout
    }

    /// Index of the channel called `name`
    pub fn channel_index(&self, name: &str) -> Option<ChannelId> {
        self.layout
            .iter()
            .position(|channel| channel.name == name)
            .map(ChannelId)
    }

    pub fn start(&mut self) -> MashupResult<()> {
        if self.atomics.is_started() {
            return Err(MashupError::InvalidState(
                "playback already started".to_string(),
            ));
        }
        self.send(EngineCommand::Start)
    }

    pub fn toggle_play(&mut self) -> MashupResult<()> {
        if !self.atomics.is_started() {
            return Err(MashupError::NotStarted);
        }
        self.send(EngineCommand::TogglePlay)
    }

    pub fn stop(&mut self) -> MashupResult<()> {
        if !self.atomics.is_started() {
            return Err(MashupError::NotStarted);
        }
        self.send(EngineCommand::Stop)
    }

    /// Request `track` on `channel` at the next bar
    pub fn select_track(&mut self, channel: &str, track: usize) -> MashupResult<()> {
        let id = self.lookup(channel)?;
        let len = self.layout[id.0].tracks.len();
        if track >= len {
            return Err(MashupError::OutOfRange {
                channel: channel.to_string(),
                index: track,
                len,
            });
        }
        self.send(EngineCommand::SelectTrack { channel: id, track })
    }

    pub fn set_master_volume(&mut self, volume: f32) -> MashupResult<()> {
        self.send(EngineCommand::SetMasterVolume { volume })
    }

    pub fn set_channel_volume(&mut self, channel: &str, volume: f32) -> MashupResult<()> {
        let id = self.lookup(channel)?;
        self.send(EngineCommand::SetChannelVolume { channel: id, volume })
    }

    fn lookup(&self, channel: &str) -> MashupResult<ChannelId> {
        self.channel_index(channel)
            .ok_or_else(|| MashupError::UnknownChannel(channel.to_string()))
    }

    fn send(&mut self, cmd: EngineCommand) -> MashupResult<()> {
        self.sender.send(cmd).map_err(|cmd| {
            log::warn!("PlayerHandle: command queue full, dropping {:?}", cmd);
            MashupError::QueueFull
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{command_channel, COMMAND_QUEUE_CAPACITY};
    use crate::error::ErrorKind;

    fn handle() -> (PlayerHandle, rtrb::Consumer<EngineCommand>) {
        let (producer, consumer) = command_channel();
        let layout = vec![
            ChannelLayout {
                name: "beat".to_string(),
                tracks: vec!["backseat".into(), "yonkers".into(), "so_fresh".into()],
            },
            ChannelLayout {
                name: "melody".to_string(),
                tracks: vec!["1994".into(), "lullaby".into()],
            },
        ];
        let handle = PlayerHandle::new(
            CommandSender { producer },
            Arc::new(EngineAtomics::new(2)),
            layout,
        );
        (handle, consumer)
    }

    #[test]
    fn test_commands_before_start() {
        let (mut handle, mut rx) = handle();
        assert_eq!(handle.toggle_play().unwrap_err().kind(), ErrorKind::NotStarted);
        assert_eq!(handle.stop().unwrap_err().kind(), ErrorKind::NotStarted);

        // Selection and volume are allowed before start
        handle.select_track("melody", 1).unwrap();
        handle.set_channel_volume("beat", 0.3).unwrap();
        handle.start().unwrap();

        assert_eq!(
            rx.pop().unwrap(),
            EngineCommand::SelectTrack {
                channel: ChannelId(1),
                track: 1
            }
        );
        assert_eq!(
            rx.pop().unwrap(),
            EngineCommand::SetChannelVolume {
                channel: ChannelId(0),
                volume: 0.3
            }
        );
        assert_eq!(rx.pop().unwrap(), EngineCommand::Start);
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_selection_is_validated() {
        let (mut handle, mut rx) = handle();
        let err = handle.select_track("melody", 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        let err = handle.select_track("drums", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownChannel);
        let err = handle.set_channel_volume("drums", 0.5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownChannel);
        assert!(rx.pop().is_err());

        assert_eq!(handle.channel_index("melody"), Some(ChannelId(1)));
        assert_eq!(handle.layout()[0].tracks[2], "so_fresh");
    }

    #[test]
    fn test_full_queue_reports_error() {
        let (mut handle, _rx) = handle();
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            handle.set_master_volume(0.5).unwrap();
        }
        let err = handle.set_master_volume(0.5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueueFull);
    }
}
