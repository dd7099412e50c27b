//! Lock-free command queue for driving the engine from the UI thread
//!
//! The UI pushes commands into an `rtrb` SPSC ring buffer; the audio thread
//! drains it at the start of every block, before rendering. Neither side
//! ever blocks, and every control action is applied at a block boundary.

use super::track::ChannelId;

/// Commands sent from the UI thread to the audio thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    /// Start all tracks and arm the bar timeline
    Start,
    /// Pause/resume the clock
    TogglePlay,
    /// Stop playback and cancel the timeline
    Stop,
    /// Queue a track switch for the next bar boundary
    SelectTrack { channel: ChannelId, track: usize },
    SetMasterVolume { volume: f32 },
    SetChannelVolume { channel: ChannelId, volume: f32 },
}

/// Capacity of the command queue
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create a new command channel (producer/consumer pair)
///
/// The producer belongs to the UI thread, the consumer to the audio thread.
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_roundtrip() {
        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::SelectTrack {
            channel: ChannelId(1),
            track: 2,
        })
        .unwrap();

        let cmd = rx.pop().unwrap();
        assert_eq!(
            cmd,
            EngineCommand::SelectTrack {
                channel: ChannelId(1),
                track: 2
            }
        );
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_command_channel_bounded() {
        let (mut tx, _rx) = command_channel();
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            tx.push(EngineCommand::TogglePlay).unwrap();
        }
        assert!(tx.push(EngineCommand::TogglePlay).is_err());
    }

    #[test]
    fn test_command_size() {
        // Commands are plain data, small enough for one cache line
        assert!(std::mem::size_of::<EngineCommand>() <= 32);
    }
}
