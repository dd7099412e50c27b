//! Lock-free engine state for UI reads
//!
//! Written by the audio thread after every block, read by the UI with
//! relaxed loads. Values may lag one block behind the engine.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::host::AudioHost;

use super::controller::PlaybackController;

const NO_PENDING: usize = usize::MAX;

/// Per-channel selection state
pub struct ChannelAtomics {
    selected: AtomicUsize,
    /// Pending index, `usize::MAX` when none
    pending: AtomicUsize,
    /// Channel gain stored as f32 bits
    volume: AtomicU32,
}

impl ChannelAtomics {
    fn new() -> Self {
        Self {
            selected: AtomicUsize::new(0),
            pending: AtomicUsize::new(NO_PENDING),
            volume: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    #[inline]
    pub fn selected(&self) -> usize {
        self.selected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn pending(&self) -> Option<usize> {
        match self.pending.load(Ordering::Relaxed) {
            NO_PENDING => None,
            idx => Some(idx),
        }
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }
}

/// Engine-wide state mirrored for the UI
pub struct EngineAtomics {
    started: AtomicBool,
    playing: AtomicBool,
    /// Index of the last fired slice
    slice: AtomicU32,
    bar: AtomicU64,
    /// Scheduler epoch (changes on every start/stop)
    epoch: AtomicU64,
    master_volume: AtomicU32,
    channels: Vec<ChannelAtomics>,
}

impl EngineAtomics {
    pub fn new(channel_count: usize) -> Self {
        Self {
            started: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            slice: AtomicU32::new(0),
            bar: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            master_volume: AtomicU32::new(0.0f32.to_bits()),
            channels: (0..channel_count).map(|_| ChannelAtomics::new()).collect(),
        }
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn slice(&self) -> u32 {
        self.slice.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn bar(&self) -> u64 {
        self.bar.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume.load(Ordering::Relaxed))
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelAtomics> {
        self.channels.get(index)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Record the position of the last fired tick
    pub(crate) fn store_tick(&self, slice: u32, bar: u64) {
        self.slice.store(slice, Ordering::Relaxed);
        self.bar.store(bar, Ordering::Relaxed);
    }

    /// Mirror the controller state after a block (no allocation)
    pub(crate) fn sync<H: AudioHost>(&self, controller: &PlaybackController<H>) {
        self.started.store(controller.is_started(), Ordering::Relaxed);
        self.playing.store(controller.is_playing(), Ordering::Relaxed);
        self.epoch
            .store(controller.scheduler().epoch(), Ordering::Relaxed);
        self.master_volume
            .store(controller.mixer().master_gain().to_bits(), Ordering::Relaxed);

        for (atomics, channel) in self.channels.iter().zip(controller.mixer().channels()) {
            atomics.selected.store(channel.selected(), Ordering::Relaxed);
            atomics
                .pending
                .store(channel.pending().unwrap_or(NO_PENDING), Ordering::Relaxed);
            atomics.volume.store(channel.gain().to_bits(), Ordering::Relaxed);
        }
    }
}
