//! Mashup engine - tracks, channels, bar scheduling
//!
//! This module contains the beat-synchronized core:
//! - Track / Channel / Mixer: exclusive-track-per-channel gain switching
//! - BarScheduler: self-re-arming bar timeline on the audio clock
//! - TickBus: fan-out of tick and bar events
//! - PlaybackController: the single control surface tying them together
//! - AudioEngine: the controller as owned by the audio thread

mod atomics;
mod bar;
mod beat_ring;
mod channel;
mod command;
mod controller;
mod engine;
mod mixer;
mod scheduler;
mod tick_bus;
mod track;

pub use atomics::*;
pub use bar::*;
pub use beat_ring::*;
pub use channel::*;
pub use command::*;
pub use controller::*;
pub use engine::*;
pub use mixer::*;
pub use scheduler::*;
pub use tick_bus::*;
pub use track::*;
